use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use super::{address, auth, meal, order};
use crate::types::Context;
use std::sync::Arc;

async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Welcome to Foodo API" })),
    )
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(health_check))
        .nest("/auth", auth::get_router())
        .merge(auth::get_verification_router())
        .nest("/addresses", address::get_router())
        .nest("/meals", meal::get_router())
        .nest("/orders", order::get_router())
}
