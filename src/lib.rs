use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::{self, Method},
    middleware,
    response::IntoResponse,
    routing::{any, delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{
    metrics::{metrics_handler, metrics_middleware},
    state::AppState,
};

pub mod actors;
pub mod api;
pub mod auth;
pub mod chat;
pub mod error;
pub mod metrics;
pub mod presence;
pub mod state;

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // The connection starts unbound; it binds to a user once the client
    // sends declare-online.
    ws.on_upgrade(move |socket| async move {
        state.connection_manager.handle_connection(socket).await;
    })
}

pub fn hearthline_route(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            http::header::ACCEPT,
            http::header::CONTENT_TYPE,
            http::header::AUTHORIZATION,
            http::HeaderName::from_static(auth::USER_ID_HEADER),
        ])
        .allow_origin(AllowOrigin::any());

    // Route params share the `{id}` name because the router requires a
    // single param name per tree position ("conversations" and
    // "conversation" are static segments and take priority).
    Router::new()
        .route("/ws", any(ws_handler))
        .route("/messages", post(api::send_message))
        .route("/messages/conversations", get(api::list_conversations))
        .route("/messages/{id}", get(api::conversation_with))
        .route("/messages/{id}/read", put(api::mark_message_read))
        .route(
            "/messages/conversation/{id}/read",
            put(api::mark_conversation_read),
        )
        .route("/messages/message/{id}", delete(api::delete_message))
        .route(
            "/messages/conversation/{id}",
            delete(api::delete_conversation),
        )
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(cors)
        .with_state(state)
}
