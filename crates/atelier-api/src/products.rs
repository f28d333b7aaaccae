use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use uuid::Uuid;

use atelier_db::models::ProductRow;
use atelier_types::api::{Claims, CreateProductRequest, UpdateProductRequest};
use atelier_types::models::{Product, Role};

use crate::auth::AppState;
use crate::middleware::{claims_from_headers, require_role};

/// Public catalog listing. Staff (admin/store) callers also see products
/// taken off sale; everyone else only sees what is available.
pub async fn list_products(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let staff = claims_from_headers(&state.jwt_secret, &headers)
        .map(|c| matches!(c.role, Role::Admin | Role::Store))
        .unwrap_or(false);

    let rows = state
        .db
        .list_products(staff)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let products = rows
        .into_iter()
        .map(|r| r.into_product())
        .collect::<Result<Vec<Product>, _>>()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = state
        .db
        .get_product(&product_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let product = row
        .into_product()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_role(&claims, &[Role::Admin, Role::Store])?;

    if req.name.is_empty() || req.base_price < 0.0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = ProductRow {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        description: req.description,
        base_price: req.base_price,
        category: req.category,
        available: req.available,
        customizable: req.customizable,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    state
        .db
        .insert_product(&row)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let product = row
        .into_product()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_role(&claims, &[Role::Admin, Role::Store])?;

    let mut row = state
        .db
        .get_product(&product_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    if let Some(name) = req.name {
        row.name = name;
    }
    if let Some(description) = req.description {
        row.description = description;
    }
    if let Some(base_price) = req.base_price {
        if base_price < 0.0 {
            return Err(StatusCode::BAD_REQUEST);
        }
        row.base_price = base_price;
    }
    if let Some(category) = req.category {
        row.category = category;
    }
    if let Some(available) = req.available {
        row.available = available;
    }
    if let Some(customizable) = req.customizable {
        row.customizable = customizable;
    }

    state
        .db
        .update_product(&row)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let product = row
        .into_product()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(product))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn new_product() -> CreateProductRequest {
        CreateProductRequest {
            name: "field jacket".to_string(),
            description: "made to measure".to_string(),
            base_price: 249.0,
            category: "outerwear".to_string(),
            available: true,
            customizable: true,
        }
    }

    #[tokio::test]
    async fn consumers_cannot_create_products() {
        let state = app_state();

        let err = create_product(
            State(state.clone()),
            Extension(claims(Role::Consumer)),
            Json(new_product()),
        )
        .await
        .err();
        assert_eq!(err, Some(StatusCode::FORBIDDEN));

        // Nothing was written.
        assert!(state.db.list_products(true).unwrap().is_empty());
    }

    #[tokio::test]
    async fn staff_can_create_products() {
        let state = app_state();

        for role in [Role::Store, Role::Admin] {
            assert!(
                create_product(
                    State(state.clone()),
                    Extension(claims(role)),
                    Json(new_product()),
                )
                .await
                .is_ok()
            );
        }
        assert_eq!(state.db.list_products(true).unwrap().len(), 2);
    }
}
