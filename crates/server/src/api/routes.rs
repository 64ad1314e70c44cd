use axum::{
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{audit, boards, dashboard, handlers, public, standby_queue, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Manager routes
    let protected = Router::new()
        .route("/config", get(handlers::get_config))
        // Audit
        .route("/audit", get(audit::query_audit))
        .route("/dashboard/stats", get(dashboard::get_stats))
        // Tickets
        .route("/tickets/recent", get(tickets::recent_tickets))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route("/tickets/{id}/history", get(tickets::get_history))
        .route("/tickets/{id}/state", post(tickets::change_state))
        // Standby queue
        .route(
            "/standby-queue",
            get(standby_queue::list_queue).post(standby_queue::enqueue),
        )
        .route(
            "/standby-queue/{id}",
            get(standby_queue::get_item).delete(standby_queue::discard),
        )
        .route("/standby-queue/{id}/assign", post(standby_queue::assign))
        .route("/standby-queue/{id}/retry", post(standby_queue::retry))
        // Boards
        .route("/boards", get(boards::list_boards).post(boards::create_board))
        .route(
            "/boards/{id}",
            get(boards::get_board)
                .put(boards::update_board)
                .delete(boards::delete_board),
        )
        .route("/boards/{id}/archive", post(boards::archive_board))
        .route("/boards/{id}/tickets", get(tickets::list_board_tickets))
        .route(
            "/boards/{id}/keywords",
            get(boards::list_keywords).post(boards::add_keyword),
        )
        .route(
            "/boards/{id}/keywords/{keyword_id}",
            delete(boards::remove_keyword),
        )
        .route(
            "/boards/{id}/external-tickets",
            get(boards::list_external_tickets),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Reachable without credentials
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/boards/{id}/tickets", post(tickets::submit_form))
        .route("/public/tickets/{uuid}", get(public::ticket_status));

    let api_routes = protected.merge(public).with_state(state.clone());

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http());

    match cors_layer(&state.config().server.cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
