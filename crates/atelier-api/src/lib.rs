pub mod auth;
pub mod messages;
pub mod middleware;
pub mod orders;
pub mod products;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use uuid::Uuid;

    use atelier_db::Database;
    use atelier_db::models::UserRow;
    use atelier_types::api::Claims;
    use atelier_types::models::Role;

    use crate::auth::{AppState, AppStateInner};

    pub fn app_state() -> AppState {
        Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            jwt_secret: "test-secret".into(),
        })
    }

    pub fn claims(role: Role) -> Claims {
        claims_for(Uuid::new_v4(), role)
    }

    pub fn claims_for(user_id: Uuid, role: Role) -> Claims {
        Claims {
            sub: user_id,
            email: "caller@example.com".into(),
            role,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        }
    }

    pub fn seed_user(state: &AppState, email: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        state
            .db
            .create_user(&UserRow {
                id: id.to_string(),
                email: email.to_string(),
                password: "argon2-hash".to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                role: role.as_str().to_string(),
                phone: None,
                measurements: None,
                is_active: true,
                last_login: None,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .unwrap();
        id
    }
}
