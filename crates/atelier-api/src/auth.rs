use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use atelier_db::Database;
use atelier_db::models::UserRow;
use atelier_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use atelier_types::models::{Role, User};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if !req.email.contains('@') || req.email.len() > 254 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.first_name.is_empty() || req.last_name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Check if the email is taken
    if state
        .db
        .get_user_by_email(&req.email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let user_id = Uuid::new_v4();
    let role = req.role.unwrap_or(Role::Consumer);

    let row = UserRow {
        id: user_id.to_string(),
        email: req.email,
        password: password_hash,
        first_name: req.first_name,
        last_name: req.last_name,
        role: role.as_str().to_string(),
        phone: None,
        measurements: None,
        is_active: true,
        last_login: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    state
        .db
        .create_user(&row)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user = row
        .into_user()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let access_token =
        create_token(&state.jwt_secret, &user).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { user, access_token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Unknown email and bad password must be indistinguishable.
    let row = state
        .db
        .get_user_by_email(&req.email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let parsed_hash =
        PasswordHash::new(&row.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let now = chrono::Utc::now();
    state
        .db
        .update_last_login(&row.id, &now.to_rfc3339())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut user = row
        .into_user()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    user.last_login = Some(now);

    let access_token =
        create_token(&state.jwt_secret, &user).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(AuthResponse { user, access_token }))
}

fn create_token(secret: &str, user: &User) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
