use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::repository;
use crate::modules::auth::middleware::Auth;
use crate::types::Context;
use crate::utils::validation;

async fn get_addresses(State(ctx): State<Arc<Context>>, auth: Auth) -> impl IntoResponse {
    match repository::find_many_by_user_id(&ctx.db_conn.pool, auth.user.id).await {
        Ok(addresses) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": addresses })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Failed to fetch addresses" })),
        ),
    }
}

#[derive(Deserialize, Validate)]
struct CreateAddressPayload {
    #[serde(default = "default_kind", rename = "type")]
    kind: String,
    #[serde(default = "default_label")]
    label: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1))]
    full_name: String,
    #[serde(alias = "streetAddress")]
    #[validate(length(min = 1))]
    street_address: String,
    #[validate(length(min = 1))]
    city: String,
    #[serde(alias = "zipCode")]
    #[validate(length(min = 1))]
    zip_code: String,
    phone: Option<String>,
    instructions: Option<String>,
    #[serde(default, alias = "isDefault")]
    is_default: bool,
}

fn default_kind() -> String {
    String::from("home")
}

fn default_label() -> String {
    String::from("Home")
}

async fn create_address(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<CreateAddressPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Failed to create address", errors);
    }

    let mut tx = match ctx.db_conn.pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::error!("Failed to start database transaction: {}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            );
        }
    };

    if payload.is_default
        && repository::clear_default_by_user_id(&mut *tx, auth.user.id.clone())
            .await
            .is_err()
    {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        );
    }

    let address = match repository::create(
        &mut *tx,
        repository::CreateAddressPayload {
            user_id: auth.user.id,
            kind: payload.kind,
            label: payload.label,
            full_name: payload.full_name,
            street_address: payload.street_address,
            city: payload.city,
            zip_code: payload.zip_code,
            phone: payload.phone,
            instructions: payload.instructions,
            is_default: payload.is_default,
        },
    )
    .await
    {
        Ok(address) => address,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    if let Err(err) = tx.commit().await {
        tracing::error!("Failed to commit database transaction: {}", err);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        );
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Address created successfully",
            "data": address,
        })),
    )
}

async fn find_owned_address(
    ctx: &Context,
    id: String,
    user_id: &str,
) -> Result<repository::Address, (StatusCode, Json<serde_json::Value>)> {
    match repository::find_by_id(&ctx.db_conn.pool, id).await {
        Ok(Some(address)) if address.user_id == user_id => Ok(address),
        Ok(_) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Address not found" })),
        )),
        Err(_) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        )),
    }
}

#[derive(Deserialize)]
struct UpdateAddressPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    label: Option<String>,
    #[serde(alias = "fullName")]
    full_name: Option<String>,
    #[serde(alias = "streetAddress")]
    street_address: Option<String>,
    city: Option<String>,
    #[serde(alias = "zipCode")]
    zip_code: Option<String>,
    phone: Option<String>,
    instructions: Option<String>,
}

async fn update_address(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateAddressPayload>,
) -> impl IntoResponse {
    let address = match find_owned_address(&ctx, id, &auth.user.id).await {
        Ok(address) => address,
        Err(response) => return response,
    };

    if repository::update_by_id(
        &ctx.db_conn.pool,
        address.id.clone(),
        repository::UpdateAddressPayload {
            kind: payload.kind,
            label: payload.label,
            full_name: payload.full_name,
            street_address: payload.street_address,
            city: payload.city,
            zip_code: payload.zip_code,
            phone: payload.phone,
            instructions: payload.instructions,
        },
    )
    .await
    .is_err()
    {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        );
    }

    match repository::find_by_id(&ctx.db_conn.pool, address.id).await {
        Ok(Some(address)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Address updated successfully",
                "data": address,
            })),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

async fn delete_address(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let address = match find_owned_address(&ctx, id, &auth.user.id).await {
        Ok(address) => address,
        Err(response) => return response,
    };

    match repository::delete_by_id(&ctx.db_conn.pool, address.id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Address deleted successfully" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

async fn set_default_address(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let address = match find_owned_address(&ctx, id, &auth.user.id).await {
        Ok(address) => address,
        Err(response) => return response,
    };

    // Clearing the old default and setting the new one must land together,
    // otherwise two concurrent requests can leave two defaults behind.
    let mut tx = match ctx.db_conn.pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::error!("Failed to start database transaction: {}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            );
        }
    };

    let updated = async {
        repository::clear_default_by_user_id(&mut *tx, auth.user.id.clone()).await?;
        repository::set_default_by_id(&mut *tx, address.id.clone()).await
    }
    .await;

    if updated.is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        );
    }

    if let Err(err) = tx.commit().await {
        tracing::error!("Failed to commit database transaction: {}", err);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Default address updated" })),
    )
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(get_addresses).post(create_address))
        .route(
            "/:id",
            put(update_address)
                .patch(update_address)
                .delete(delete_address),
        )
        .route("/:id/set-default", post(set_default_address))
}
