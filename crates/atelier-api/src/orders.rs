use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use atelier_db::models::OrderRow;
use atelier_types::api::{Claims, CreateOrderRequest, UpdateOrderStatusRequest};
use atelier_types::models::{Order, OrderStatus, Role};

use crate::auth::AppState;
use crate::middleware::require_role;

pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.quantity == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let product = state
        .db
        .get_product(&req.product_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    if !product.available {
        return Err(StatusCode::CONFLICT);
    }

    let row = OrderRow {
        id: Uuid::new_v4().to_string(),
        customer_id: claims.sub.to_string(),
        product_id: req.product_id.to_string(),
        status: OrderStatus::Pending.as_str().to_string(),
        quantity: req.quantity,
        total_price: product.base_price * req.quantity as f64,
        customizations: req.customizations.as_ref().map(|v| v.to_string()),
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    state
        .db
        .insert_order(&row)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let order = row
        .into_order()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Customers see their own orders; staff see everything.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let rows = match claims.role {
        Role::Admin | Role::Store => state.db.list_orders(),
        Role::Consumer => state.db.list_orders_for_customer(&claims.sub.to_string()),
    }
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let orders = rows
        .into_iter()
        .map(|r| r.into_order())
        .collect::<Result<Vec<Order>, _>>()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = state
        .db
        .get_order(&order_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let staff = matches!(claims.role, Role::Admin | Role::Store);
    if !staff && row.customer_id != claims.sub.to_string() {
        return Err(StatusCode::FORBIDDEN);
    }

    let order = row
        .into_order()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(order))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_role(&claims, &[Role::Admin, Role::Store])?;

    let updated = state
        .db
        .update_order_status(&order_id.to_string(), req.status.as_str())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }

    let row = state
        .db
        .get_order(&order_id.to_string())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let order = row
        .into_order()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use atelier_db::models::ProductRow;

    fn seed_order(state: &AppState, customer: Uuid) -> Uuid {
        let product_id = Uuid::new_v4();
        state
            .db
            .insert_product(&ProductRow {
                id: product_id.to_string(),
                name: "shirt".to_string(),
                description: "custom".to_string(),
                base_price: 59.0,
                category: "shirts".to_string(),
                available: true,
                customizable: true,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .unwrap();

        let order_id = Uuid::new_v4();
        state
            .db
            .insert_order(&OrderRow {
                id: order_id.to_string(),
                customer_id: customer.to_string(),
                product_id: product_id.to_string(),
                status: OrderStatus::Pending.as_str().to_string(),
                quantity: 1,
                total_price: 59.0,
                customizations: None,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .unwrap();
        order_id
    }

    #[tokio::test]
    async fn consumers_cannot_change_order_status() {
        let state = app_state();
        let buyer = seed_user(&state, "buyer@example.com", Role::Consumer);
        let order_id = seed_order(&state, buyer);

        // Not even on their own order.
        let err = update_order_status(
            State(state.clone()),
            Path(order_id),
            Extension(claims_for(buyer, Role::Consumer)),
            Json(UpdateOrderStatusRequest {
                status: OrderStatus::Shipped,
            }),
        )
        .await
        .err();
        assert_eq!(err, Some(StatusCode::FORBIDDEN));

        let row = state.db.get_order(&order_id.to_string()).unwrap().unwrap();
        assert_eq!(row.status, "pending");
    }

    #[tokio::test]
    async fn staff_move_orders_through_statuses() {
        let state = app_state();
        let buyer = seed_user(&state, "buyer@example.com", Role::Consumer);
        let order_id = seed_order(&state, buyer);

        assert!(
            update_order_status(
                State(state.clone()),
                Path(order_id),
                Extension(claims(Role::Store)),
                Json(UpdateOrderStatusRequest {
                    status: OrderStatus::InProduction,
                }),
            )
            .await
            .is_ok()
        );

        let row = state.db.get_order(&order_id.to_string()).unwrap().unwrap();
        assert_eq!(row.status, "in_production");
    }

    #[tokio::test]
    async fn consumers_see_only_their_own_order() {
        let state = app_state();
        let buyer = seed_user(&state, "buyer@example.com", Role::Consumer);
        let snoop = seed_user(&state, "snoop@example.com", Role::Consumer);
        let order_id = seed_order(&state, buyer);

        let err = get_order(
            State(state.clone()),
            Path(order_id),
            Extension(claims_for(snoop, Role::Consumer)),
        )
        .await
        .err();
        assert_eq!(err, Some(StatusCode::FORBIDDEN));

        assert!(
            get_order(
                State(state),
                Path(order_id),
                Extension(claims_for(buyer, Role::Consumer)),
            )
            .await
            .is_ok()
        );
    }
}
