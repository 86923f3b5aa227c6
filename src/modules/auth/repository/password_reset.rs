use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use ulid::Ulid;

type Result<T> = std::result::Result<T, Error>;

pub const TOKEN_VALIDITY_MINUTES: i64 = 60;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub is_used: bool,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

pub struct CreatePasswordResetTokenPayload {
    pub user_id: String,
    pub token: String,
}

pub async fn create<'e, E>(e: E, payload: CreatePasswordResetTokenPayload) -> Result<PasswordResetToken>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, PasswordResetToken>(
        "
        INSERT INTO password_reset_tokens (id, user_id, token, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.user_id.clone())
    .bind(payload.token)
    .bind(Utc::now().naive_utc() + chrono::Duration::minutes(TOKEN_VALIDITY_MINUTES))
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while creating a password reset token for user with id {}: {}",
            payload.user_id,
            err
        );
        Error::UnexpectedError
    })
}

pub async fn delete_unused_by_user_id<'e, E: PgExecutor<'e>>(e: E, user_id: String) -> Result<()> {
    sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1 AND is_used = false")
        .bind(user_id.clone())
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while deleting unused password reset tokens for user with id {}: {}",
                user_id,
                err
            );
            Error::UnexpectedError
        })
        .map(|_| ())
}
