use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::repository::{self, Nutrition};
use crate::modules::auth::middleware::ChefAuth;
use crate::types::Context;
use crate::utils::pagination::Pagination;
use crate::utils::validation;

#[derive(Deserialize)]
struct Filters {
    #[serde(alias = "isVegetarian")]
    is_vegetarian: Option<bool>,
    #[serde(alias = "isVegan")]
    is_vegan: Option<bool>,
    #[serde(alias = "isGlutenFree")]
    is_gluten_free: Option<bool>,
    #[serde(alias = "search")]
    q: Option<String>,
    ordering: Option<String>,
}

async fn get_meals(
    State(ctx): State<Arc<Context>>,
    pagination: Pagination,
    Query(filters): Query<Filters>,
) -> impl IntoResponse {
    match repository::find_many(
        &ctx.db_conn.pool,
        pagination,
        repository::Filters {
            is_vegetarian: filters.is_vegetarian,
            is_vegan: filters.is_vegan,
            is_gluten_free: filters.is_gluten_free,
            search: filters.q,
            ordering: filters.ordering,
        },
    )
    .await
    {
        Ok(paginated_meals) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": paginated_meals })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Failed to fetch meals" })),
        ),
    }
}

async fn get_featured_meals(State(ctx): State<Arc<Context>>) -> impl IntoResponse {
    match repository::find_featured(&ctx.db_conn.pool).await {
        Ok(meals) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": meals })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Failed to fetch meals" })),
        ),
    }
}

async fn get_meal_by_id(
    State(ctx): State<Arc<Context>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match repository::find_active_by_id(&ctx.db_conn.pool, id).await {
        Ok(Some(meal)) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": meal })),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Meal not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Failed to fetch meal" })),
        ),
    }
}

#[derive(Deserialize, Validate)]
struct CreateMealPayload {
    #[validate(length(min = 1))]
    name: String,
    #[serde(default)]
    description: String,
    price: BigDecimal,
    #[serde(alias = "imageUrl")]
    image_url: Option<String>,
    #[serde(alias = "prepTime")]
    prep_time: Option<String>,
    #[serde(alias = "portionSize")]
    portion_size: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    ingredients: Vec<String>,
    #[serde(default)]
    allergens: Vec<String>,
    nutrition: Option<Nutrition>,
    #[serde(default, alias = "isVegetarian")]
    is_vegetarian: bool,
    #[serde(default, alias = "isVegan")]
    is_vegan: bool,
    #[serde(default, alias = "isGlutenFree")]
    is_gluten_free: bool,
}

async fn create_meal(
    State(ctx): State<Arc<Context>>,
    auth: ChefAuth,
    Json(payload): Json<CreateMealPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Failed to create meal", errors);
    }

    if payload.price < BigDecimal::from(0) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Failed to create meal",
                "errors": { "price": ["Price cannot be negative"] },
            })),
        );
    }

    match repository::create(
        &ctx.db_conn.pool,
        repository::CreateMealPayload {
            chef_id: auth.user.id,
            name: payload.name,
            description: payload.description,
            price: payload.price,
            image_url: payload.image_url,
            prep_time: payload.prep_time,
            portion_size: payload.portion_size,
            tags: payload.tags,
            ingredients: payload.ingredients,
            allergens: payload.allergens,
            nutrition: payload.nutrition,
            is_vegetarian: payload.is_vegetarian,
            is_vegan: payload.is_vegan,
            is_gluten_free: payload.is_gluten_free,
        },
    )
    .await
    {
        Ok(meal) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Meal created successfully",
                "data": meal,
            })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

async fn find_owned_meal(
    ctx: &Context,
    id: String,
    chef_id: &str,
) -> Result<repository::Meal, (StatusCode, Json<serde_json::Value>)> {
    match repository::find_by_id(&ctx.db_conn.pool, id).await {
        Ok(Some(meal)) if meal.chef_id == chef_id => Ok(meal),
        Ok(Some(_)) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "success": false, "message": "You do not own this meal" })),
        )),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Meal not found" })),
        )),
        Err(_) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        )),
    }
}

#[derive(Deserialize)]
struct UpdateMealPayload {
    name: Option<String>,
    description: Option<String>,
    price: Option<BigDecimal>,
    #[serde(alias = "imageUrl")]
    image_url: Option<String>,
    #[serde(alias = "prepTime")]
    prep_time: Option<String>,
    #[serde(alias = "portionSize")]
    portion_size: Option<String>,
    tags: Option<Vec<String>>,
    ingredients: Option<Vec<String>>,
    allergens: Option<Vec<String>>,
    nutrition: Option<Nutrition>,
    #[serde(alias = "isVegetarian")]
    is_vegetarian: Option<bool>,
    #[serde(alias = "isVegan")]
    is_vegan: Option<bool>,
    #[serde(alias = "isGlutenFree")]
    is_gluten_free: Option<bool>,
}

async fn update_meal(
    State(ctx): State<Arc<Context>>,
    auth: ChefAuth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateMealPayload>,
) -> impl IntoResponse {
    let meal = match find_owned_meal(&ctx, id, &auth.user.id).await {
        Ok(meal) => meal,
        Err(response) => return response,
    };

    if repository::update_by_id(
        &ctx.db_conn.pool,
        meal.id.clone(),
        repository::UpdateMealPayload {
            name: payload.name,
            description: payload.description,
            price: payload.price,
            image_url: payload.image_url,
            prep_time: payload.prep_time,
            portion_size: payload.portion_size,
            tags: payload.tags,
            ingredients: payload.ingredients,
            allergens: payload.allergens,
            nutrition: payload.nutrition,
            is_vegetarian: payload.is_vegetarian,
            is_vegan: payload.is_vegan,
            is_gluten_free: payload.is_gluten_free,
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

    match repository::find_by_id(&ctx.db_conn.pool, meal.id).await {
        Ok(Some(meal)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Meal updated successfully",
                "data": meal,
            })),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

async fn delete_meal(
    State(ctx): State<Arc<Context>>,
    auth: ChefAuth,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let meal = match find_owned_meal(&ctx, id, &auth.user.id).await {
        Ok(meal) => meal,
        Err(response) => return response,
    };

    match repository::deactivate_by_id(&ctx.db_conn.pool, meal.id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Meal deleted successfully" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/", get(get_meals).post(create_meal))
        .route("/featured", get(get_featured_meals))
        .route(
            "/:id",
            get(get_meal_by_id)
                .put(update_meal)
                .patch(update_meal)
                .delete(delete_meal),
        )
}
