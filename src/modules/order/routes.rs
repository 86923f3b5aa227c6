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

use super::repository::{self, OrderStatus};
use super::service;
use crate::modules::auth::middleware::Auth;
use crate::types::Context;
use crate::utils::pagination::Pagination;

async fn get_orders(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    pagination: Pagination,
) -> impl IntoResponse {
    let orders = match auth.user.is_chef {
        true => {
            repository::find_many_by_chef_id(&ctx.db_conn.pool, pagination, auth.user.id).await
        }
        false => {
            repository::find_many_by_user_id(&ctx.db_conn.pool, pagination, auth.user.id).await
        }
    };

    match orders {
        Ok(paginated_orders) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": paginated_orders })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Failed to fetch orders" })),
        ),
    }
}

async fn find_visible_order(
    ctx: &Context,
    id: String,
    auth: &Auth,
) -> Result<repository::Order, (StatusCode, Json<serde_json::Value>)> {
    let not_found = (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Order not found" })),
    );

    let order = match repository::find_by_id(&ctx.db_conn.pool, id).await {
        Ok(Some(order)) => order,
        Ok(None) => return Err(not_found),
        Err(_) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Failed to fetch order" })),
            ))
        }
    };

    if order.user_id == auth.user.id {
        return Ok(order);
    }

    if auth.user.is_chef {
        match repository::chef_owns_item_in_order(
            &ctx.db_conn.pool,
            order.id.clone(),
            auth.user.id.clone(),
        )
        .await
        {
            Ok(true) => return Ok(order),
            Ok(false) => return Err(not_found),
            Err(_) => {
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": "Failed to fetch order" })),
                ))
            }
        }
    }

    Err(not_found)
}

async fn get_order_by_id(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let order = match find_visible_order(&ctx, id, &auth).await {
        Ok(order) => order,
        Err(response) => return response,
    };

    match repository::find_items_by_order_id(&ctx.db_conn.pool, order.id.clone()).await {
        Ok(items) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": order.with_items(items) })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Failed to fetch order" })),
        ),
    }
}

#[derive(Deserialize)]
struct OrderLinePayload {
    #[serde(alias = "mealId")]
    meal_id: String,
    #[serde(default = "default_quantity")]
    quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Deserialize)]
struct PlaceOrderPayload {
    items: Vec<OrderLinePayload>,
    #[serde(alias = "deliveryNotes")]
    delivery_notes: Option<String>,
    #[serde(default, alias = "isExpress", alias = "is_express")]
    express: bool,
}

async fn place_order(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<PlaceOrderPayload>,
) -> impl IntoResponse {
    if payload.items.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Failed to place order",
                "errors": { "items": ["An order needs at least one item"] },
            })),
        );
    }

    match service::place(
        ctx.clone(),
        service::PlaceOrderPayload {
            user: auth.user,
            items: payload
                .items
                .into_iter()
                .map(|line| (line.meal_id, line.quantity))
                .collect(),
            delivery_notes: payload.delivery_notes,
            is_express: payload.express,
        },
    )
    .await
    {
        Ok(order) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Order placed successfully",
                "data": order,
            })),
        ),
        Err(service::Error::MealUnavailable(meal_id)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
               "success": false,
               "message": format!("Meal with id {} not found or inactive", meal_id),
            })),
        ),
        Err(service::Error::InvalidQuantity(meal_id)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": format!("Invalid quantity for meal with id {}", meal_id),
            })),
        ),
        Err(service::Error::UnexpectedError) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

#[derive(Deserialize)]
struct UpdateOrderStatusPayload {
    status: OrderStatus,
}

async fn update_order_status(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderStatusPayload>,
) -> impl IntoResponse {
    let order = match find_visible_order(&ctx, id, &auth).await {
        Ok(order) => order,
        Err(response) => return response,
    };

    // Pipeline steps belong to the kitchen side; purchasers go through the
    // cancel endpoint instead.
    if !auth.user.is_chef {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "success": false, "message": "Only chefs can update order status" })),
        );
    }

    match repository::chef_owns_item_in_order(
        &ctx.db_conn.pool,
        order.id.clone(),
        auth.user.id.clone(),
    )
    .await
    {
        Ok(true) => (),
        Ok(false) => {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "success": false, "message": "No meal of yours is in this order" })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    }

    if payload.status == OrderStatus::Cancelled || !order.status.can_transition_to(payload.status)
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": format!(
                    "Cannot move order from {} to {}",
                    order.status.to_string(),
                    payload.status.to_string()
                ),
            })),
        );
    }

    match repository::update_status_by_id(&ctx.db_conn.pool, order.id, payload.status).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Order status updated successfully" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Failed to update order status" })),
        ),
    }
}

async fn cancel_order(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let order = match find_visible_order(&ctx, id, &auth).await {
        Ok(order) => order,
        Err(response) => return response,
    };

    if order.user_id != auth.user.id {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "success": false, "message": "Only the purchaser can cancel an order" })),
        );
    }

    if order.status.is_terminal() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": format!(
                    "Cannot cancel an order that is already {}",
                    order.status.to_string()
                ),
            })),
        );
    }

    match repository::update_status_by_id(&ctx.db_conn.pool, order.id, OrderStatus::Cancelled)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Order cancelled successfully" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Failed to cancel order" })),
        ),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(get_orders).post(place_order))
        .route("/:id", get(get_order_by_id))
        .route("/:id/status", put(update_order_status))
        .route("/:id/cancel", post(cancel_order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_payload_accepts_camel_case_aliases() {
        let payload: PlaceOrderPayload = serde_json::from_value(serde_json::json!({
            "items": [{ "mealId": "01J0MEAL", "quantity": 2 }],
            "deliveryNotes": "ring twice",
            "isExpress": true,
        }))
        .unwrap();

        assert_eq!(payload.items[0].meal_id, "01J0MEAL");
        assert_eq!(payload.items[0].quantity, 2);
        assert_eq!(payload.delivery_notes.as_deref(), Some("ring twice"));
        assert!(payload.express);
    }

    #[test]
    fn order_quantity_defaults_to_one() {
        let payload: PlaceOrderPayload = serde_json::from_value(serde_json::json!({
            "items": [{ "meal_id": "01J0MEAL" }],
        }))
        .unwrap();

        assert_eq!(payload.items[0].quantity, 1);
        assert!(!payload.express);
    }
}
