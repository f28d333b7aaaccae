use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use atelier_types::api::{Claims, UpdateMeasurementsRequest, UpdateUserRequest};
use atelier_types::models::{Role, User};

use crate::auth::AppState;
use crate::middleware::require_role;

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = load_user(&state, claims.sub)?;
    Ok(Json(user))
}

pub async fn update_measurements(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateMeasurementsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let json = serde_json::to_string(&req.measurements)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let updated = state
        .db
        .update_measurements(&claims.sub.to_string(), &json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    let user = load_user(&state, claims.sub)?;
    Ok(Json(user))
}

/// Admin-only directory of every registered user.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_role(&claims, &[Role::Admin])?;

    let rows = state
        .db
        .list_users()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let users = rows
        .into_iter()
        .map(|r| r.into_user())
        .collect::<Result<Vec<User>, _>>()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_role(&claims, &[Role::Admin])?;

    let user = load_user(&state, user_id)?;
    Ok(Json(user))
}

/// Profile update: users edit themselves, admins edit anyone. Role and
/// active-flag changes are accepted from admins only.
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let is_admin = claims.role == Role::Admin;
    if !is_admin && claims.sub != user_id {
        return Err(StatusCode::FORBIDDEN);
    }
    if !is_admin && (req.role.is_some() || req.is_active.is_some()) {
        return Err(StatusCode::FORBIDDEN);
    }

    let mut row = state
        .db
        .get_user_by_id(&user_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    if let Some(first_name) = req.first_name {
        if first_name.is_empty() {
            return Err(StatusCode::BAD_REQUEST);
        }
        row.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        if last_name.is_empty() {
            return Err(StatusCode::BAD_REQUEST);
        }
        row.last_name = last_name;
    }
    if let Some(phone) = req.phone {
        row.phone = Some(phone);
    }
    if let Some(role) = req.role {
        row.role = role.as_str().to_string();
    }
    if let Some(is_active) = req.is_active {
        row.is_active = is_active;
    }

    state
        .db
        .update_user(&row)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let user = row
        .into_user()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(user))
}

/// Admin-only removal. Deactivates rather than deletes — messages and
/// orders keep their sender/customer references.
pub async fn remove_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_role(&claims, &[Role::Admin])?;

    let removed = state
        .db
        .deactivate_user(&user_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if !removed {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(StatusCode::NO_CONTENT)
}

fn load_user(state: &AppState, user_id: Uuid) -> Result<User, StatusCode> {
    state
        .db
        .get_user_by_id(&user_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?
        .into_user()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
