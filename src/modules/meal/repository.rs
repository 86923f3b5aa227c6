use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgExecutor;
use ulid::Ulid;

use crate::utils::pagination::{Paginated, Pagination};

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Nutrition {
    pub calories: i32,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct Meal {
    pub id: String,
    pub chef_id: String,
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
    pub image_url: Option<String>,
    pub prep_time: Option<String>,
    pub portion_size: Option<String>,
    pub rating: BigDecimal,
    pub order_count: i32,
    pub tags: Json<Vec<String>>,
    pub ingredients: Json<Vec<String>>,
    pub allergens: Json<Vec<String>>,
    pub nutrition: Option<Json<Nutrition>>,
    pub is_vegetarian: bool,
    pub is_vegan: bool,
    pub is_gluten_free: bool,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

pub struct CreateMealPayload {
    pub chef_id: String,
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
    pub image_url: Option<String>,
    pub prep_time: Option<String>,
    pub portion_size: Option<String>,
    pub tags: Vec<String>,
    pub ingredients: Vec<String>,
    pub allergens: Vec<String>,
    pub nutrition: Option<Nutrition>,
    pub is_vegetarian: bool,
    pub is_vegan: bool,
    pub is_gluten_free: bool,
}

pub async fn create<'e, E>(e: E, payload: CreateMealPayload) -> Result<Meal>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Meal>(
        "
        INSERT INTO meals (
            id, chef_id, name, description, price, image_url, prep_time,
            portion_size, tags, ingredients, allergens, nutrition,
            is_vegetarian, is_vegan, is_gluten_free
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.chef_id)
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.image_url)
    .bind(payload.prep_time)
    .bind(payload.portion_size)
    .bind(Json(payload.tags))
    .bind(Json(payload.ingredients))
    .bind(Json(payload.allergens))
    .bind(payload.nutrition.map(Json))
    .bind(payload.is_vegetarian)
    .bind(payload.is_vegan)
    .bind(payload.is_gluten_free)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating a meal: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<Meal>> {
    sqlx::query_as::<_, Meal>("SELECT * FROM meals WHERE id = $1")
        .bind(id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching meal with id {}: {}", id, err);
            Error::UnexpectedError
        })
}

pub async fn find_active_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<Meal>> {
    sqlx::query_as::<_, Meal>("SELECT * FROM meals WHERE id = $1 AND is_active = TRUE")
        .bind(id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching meal with id {}: {}", id, err);
            Error::UnexpectedError
        })
}

#[derive(Deserialize, Clone, Default)]
pub struct Filters {
    pub is_vegetarian: Option<bool>,
    pub is_vegan: Option<bool>,
    pub is_gluten_free: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

pub const ORDERING_FIELDS: [&str; 4] = ["price", "rating", "order_count", "created_at"];

/// Maps a requested ordering onto a whitelisted ORDER BY clause. A leading
/// `-` flips the direction; anything off the whitelist falls back to newest
/// first, and only whitelisted column names ever reach the query text.
pub fn order_clause(ordering: Option<&str>) -> String {
    let requested = ordering.unwrap_or("-created_at");
    let (field, direction) = match requested.strip_prefix('-') {
        Some(field) => (field, "DESC"),
        None => (requested, "ASC"),
    };

    match ORDERING_FIELDS.contains(&field) {
        true => format!("{} {}", field, direction),
        false => String::from("created_at DESC"),
    }
}

pub async fn find_many<'e, E: PgExecutor<'e> + Clone>(
    e: E,
    pagination: Pagination,
    filters: Filters,
) -> Result<Paginated<Meal>> {
    let query = format!(
        "
        SELECT * FROM meals
        WHERE is_active = TRUE
            AND ($1::bool IS NULL OR is_vegetarian = $1)
            AND ($2::bool IS NULL OR is_vegan = $2)
            AND ($3::bool IS NULL OR is_gluten_free = $3)
            AND (
                $4::text IS NULL
                OR name ILIKE '%' || $4 || '%'
                OR description ILIKE '%' || $4 || '%'
                OR tags::text ILIKE '%' || $4 || '%'
            )
        ORDER BY {}
        LIMIT $5 OFFSET $6
        ",
        order_clause(filters.ordering.as_deref())
    );

    let meals = sqlx::query_as::<_, Meal>(&query)
    .bind(filters.is_vegetarian)
    .bind(filters.is_vegan)
    .bind(filters.is_gluten_free)
    .bind(filters.search.clone())
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(e.clone())
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching meals: {}", err);
        Error::UnexpectedError
    })?;

    let (total,): (i64,) = sqlx::query_as(
        "
        SELECT COUNT(*) FROM meals
        WHERE is_active = TRUE
            AND ($1::bool IS NULL OR is_vegetarian = $1)
            AND ($2::bool IS NULL OR is_vegan = $2)
            AND ($3::bool IS NULL OR is_gluten_free = $3)
            AND (
                $4::text IS NULL
                OR name ILIKE '%' || $4 || '%'
                OR description ILIKE '%' || $4 || '%'
                OR tags::text ILIKE '%' || $4 || '%'
            )
        ",
    )
    .bind(filters.is_vegetarian)
    .bind(filters.is_vegan)
    .bind(filters.is_gluten_free)
    .bind(filters.search)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while counting meals: {}", err);
        Error::UnexpectedError
    })?;

    Ok(Paginated::new(
        meals,
        total as u32,
        pagination.page,
        pagination.per_page,
    ))
}

pub const FEATURED_MEAL_COUNT: i64 = 10;

pub async fn find_featured<'e, E: PgExecutor<'e>>(e: E) -> Result<Vec<Meal>> {
    sqlx::query_as::<_, Meal>(
        "SELECT * FROM meals WHERE is_active = TRUE ORDER BY rating DESC LIMIT $1",
    )
    .bind(FEATURED_MEAL_COUNT)
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while fetching featured meals: {}", err);
        Error::UnexpectedError
    })
}

#[derive(Default)]
pub struct UpdateMealPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub image_url: Option<String>,
    pub prep_time: Option<String>,
    pub portion_size: Option<String>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<String>>,
    pub allergens: Option<Vec<String>>,
    pub nutrition: Option<Nutrition>,
    pub is_vegetarian: Option<bool>,
    pub is_vegan: Option<bool>,
    pub is_gluten_free: Option<bool>,
}

pub async fn update_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: String,
    payload: UpdateMealPayload,
) -> Result<()> {
    sqlx::query(
        "
            UPDATE meals SET
                name = COALESCE($1, name),
                description = COALESCE($2, description),
                price = COALESCE($3, price),
                image_url = COALESCE($4, image_url),
                prep_time = COALESCE($5, prep_time),
                portion_size = COALESCE($6, portion_size),
                tags = COALESCE($7, tags),
                ingredients = COALESCE($8, ingredients),
                allergens = COALESCE($9, allergens),
                nutrition = COALESCE($10, nutrition),
                is_vegetarian = COALESCE($11, is_vegetarian),
                is_vegan = COALESCE($12, is_vegan),
                is_gluten_free = COALESCE($13, is_gluten_free),
                updated_at = NOW()
            WHERE
                id = $14
        ",
    )
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.image_url)
    .bind(payload.prep_time)
    .bind(payload.portion_size)
    .bind(payload.tags.map(Json))
    .bind(payload.ingredients.map(Json))
    .bind(payload.allergens.map(Json))
    .bind(payload.nutrition.map(Json))
    .bind(payload.is_vegetarian)
    .bind(payload.is_vegan)
    .bind(payload.is_gluten_free)
    .bind(id.clone())
    .execute(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while trying to update meal with id {}: {}",
            id,
            err
        );
        Error::UnexpectedError
    })
    .map(|_| ())
}

/// Listings only ever show active meals, so retiring a meal takes it off the
/// catalog while order items keep a valid reference.
pub async fn deactivate_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<()> {
    sqlx::query("UPDATE meals SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id.clone())
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to deactivate meal with id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_maps_to_whitelisted_columns() {
        assert_eq!(order_clause(Some("price")), "price ASC");
        assert_eq!(order_clause(Some("-price")), "price DESC");
        assert_eq!(order_clause(Some("rating")), "rating ASC");
        assert_eq!(order_clause(Some("-order_count")), "order_count DESC");
        assert_eq!(order_clause(Some("created_at")), "created_at ASC");
    }

    #[test]
    fn ordering_defaults_to_newest_first() {
        assert_eq!(order_clause(None), "created_at DESC");
    }

    #[test]
    fn unknown_ordering_fields_fall_back_to_the_default() {
        assert_eq!(order_clause(Some("name")), "created_at DESC");
        assert_eq!(order_clause(Some("")), "created_at DESC");
        assert_eq!(
            order_clause(Some("created_at; DROP TABLE meals")),
            "created_at DESC"
        );
    }
}
