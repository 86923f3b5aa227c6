use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use ulid::Ulid;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct Address {
    #[serde(skip_serializing, default)]
    pub user_id: String,
    pub id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub full_name: String,
    pub street_address: String,
    pub city: String,
    pub zip_code: String,
    pub phone: Option<String>,
    pub instructions: Option<String>,
    pub is_default: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

pub struct CreateAddressPayload {
    pub user_id: String,
    pub kind: String,
    pub label: String,
    pub full_name: String,
    pub street_address: String,
    pub city: String,
    pub zip_code: String,
    pub phone: Option<String>,
    pub instructions: Option<String>,
    pub is_default: bool,
}

pub async fn create<'e, E>(e: E, payload: CreateAddressPayload) -> Result<Address>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Address>(
        "
        INSERT INTO addresses (
            id, user_id, type, label, full_name, street_address, city,
            zip_code, phone, instructions, is_default
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.user_id)
    .bind(payload.kind)
    .bind(payload.label)
    .bind(payload.full_name)
    .bind(payload.street_address)
    .bind(payload.city)
    .bind(payload.zip_code)
    .bind(payload.phone)
    .bind(payload.instructions)
    .bind(payload.is_default)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating an address: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<Address>> {
    sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1")
        .bind(id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while fetching address with id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
}

pub async fn find_many_by_user_id<'e, E: PgExecutor<'e>>(
    e: E,
    user_id: String,
) -> Result<Vec<Address>> {
    sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
    )
    .bind(user_id.clone())
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while fetching addresses for user with id {}: {}",
            user_id,
            err
        );
        Error::UnexpectedError
    })
}

#[derive(Default)]
pub struct UpdateAddressPayload {
    pub kind: Option<String>,
    pub label: Option<String>,
    pub full_name: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub instructions: Option<String>,
}

pub async fn update_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: String,
    payload: UpdateAddressPayload,
) -> Result<()> {
    sqlx::query(
        "
            UPDATE addresses SET
                type = COALESCE($1, type),
                label = COALESCE($2, label),
                full_name = COALESCE($3, full_name),
                street_address = COALESCE($4, street_address),
                city = COALESCE($5, city),
                zip_code = COALESCE($6, zip_code),
                phone = COALESCE($7, phone),
                instructions = COALESCE($8, instructions),
                updated_at = NOW()
            WHERE
                id = $9
        ",
    )
    .bind(payload.kind)
    .bind(payload.label)
    .bind(payload.full_name)
    .bind(payload.street_address)
    .bind(payload.city)
    .bind(payload.zip_code)
    .bind(payload.phone)
    .bind(payload.instructions)
    .bind(id.clone())
    .execute(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while trying to update address with id {}: {}",
            id,
            err
        );
        Error::UnexpectedError
    })
    .map(|_| ())
}

pub async fn delete_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<()> {
    sqlx::query("DELETE FROM addresses WHERE id = $1")
        .bind(id.clone())
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to delete address with id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
        .map(|_| ())
}

pub async fn clear_default_by_user_id<'e, E: PgExecutor<'e>>(e: E, user_id: String) -> Result<()> {
    sqlx::query("UPDATE addresses SET is_default = false WHERE user_id = $1 AND is_default = true")
        .bind(user_id.clone())
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while clearing default address for user with id {}: {}",
                user_id,
                err
            );
            Error::UnexpectedError
        })
        .map(|_| ())
}

pub async fn set_default_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<()> {
    sqlx::query("UPDATE addresses SET is_default = true, updated_at = NOW() WHERE id = $1")
        .bind(id.clone())
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while setting default address with id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
        .map(|_| ())
}
