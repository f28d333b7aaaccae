use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use atelier_api::auth::{self, AppState, AppStateInner};
use atelier_api::middleware::require_auth;
use atelier_api::{messages, orders, products, users};
use atelier_gateway::registry::Registry;
use atelier_gateway::relay::Relay;
use atelier_gateway::{connection, identity};

#[derive(Clone)]
struct ServerState {
    relay: Relay,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("ATELIER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("ATELIER_DB_PATH").unwrap_or_else(|_| "atelier.db".into());
    let host = std::env::var("ATELIER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ATELIER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(atelier_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state: one registry for connection bindings, one relay on top.
    let registry = Registry::new();
    let relay = Relay::new(db.clone(), registry.clone());
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: jwt_secret.clone(),
    });

    let server_state = ServerState {
        relay,
        jwt_secret: jwt_secret.clone(),
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/products", get(products::list_products))
        .route("/products/{product_id}", get(products::get_product))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::me))
        .route("/users/me/measurements", put(users::update_measurements))
        .route(
            "/users/{user_id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::remove_user),
        )
        .route("/products", post(products::create_product))
        .route("/products/{product_id}", put(products::update_product))
        .route("/orders", post(orders::create_order))
        .route("/orders", get(orders::list_orders))
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/orders/{order_id}/status", put(orders::update_order_status))
        .route(
            "/messages/conversation/{user_id}",
            get(messages::get_conversation),
        )
        .route("/messages/unread/count", get(messages::unread_count))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(server_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(cors_layer()?)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Atelier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Explicit registry teardown so no stale bindings outlive the server.
    let live = registry.connection_count().await;
    if live > 0 {
        info!("Dropping {} live gateway connection(s) on shutdown", live);
    }
    registry.clear().await;

    Ok(())
}

fn cors_layer() -> anyhow::Result<CorsLayer> {
    match std::env::var("ATELIER_CORS_ORIGIN") {
        Ok(origin) => Ok(CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any)),
        Err(_) => Ok(CorsLayer::permissive()),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket handshake. The bearer credential rides on the upgrade request
/// (explicit `?token=` field or Authorization header); a failed check
/// rejects the upgrade outright, so an unauthenticated handle never exists.
async fn ws_upgrade(
    State(state): State<ServerState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match identity::authenticate(&state.jwt_secret, query.token.as_deref(), authorization) {
        Ok(claims) => ws
            .on_upgrade(move |socket| connection::handle_socket(socket, state.relay, claims))
            .into_response(),
        // Invalid and missing credentials are the same closed door.
        Err(_) => StatusCode::UNAUTHORIZED.into_response(),
    }
}
