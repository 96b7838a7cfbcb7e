use axum::{
    Json, Router, middleware,
    routing::{get, post, put},
};
use serde_json::{Value, json};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{feed, moderation, posts, rsvps};

/// All API routes. Everything except `/health` requires a bearer token.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/posts", post(posts::create))
        .route("/posts/{id}", get(posts::show).patch(posts::edit))
        .route("/posts/{id}/transitions", post(posts::transition))
        .route("/events/{id}/rsvp", put(rsvps::put))
        .route("/feed", get(feed::list))
        .route("/moderation/queue", get(moderation::queue))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .merge(protected)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
