use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use std::str::FromStr;
use ulid::Ulid;

type Result<T> = std::result::Result<T, Error>;

pub const OTP_VALIDITY_MINUTES: i64 = 10;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum OtpPurpose {
    #[serde(rename = "EMAIL_VERIFICATION")]
    EmailVerification,
    #[serde(rename = "PASSWORD_RESET")]
    PasswordReset,
}

impl ToString for OtpPurpose {
    fn to_string(&self) -> String {
        match self {
            OtpPurpose::EmailVerification => String::from("EMAIL_VERIFICATION"),
            OtpPurpose::PasswordReset => String::from("PASSWORD_RESET"),
        }
    }
}

impl FromStr for OtpPurpose {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "EMAIL_VERIFICATION" => Ok(OtpPurpose::EmailVerification),
            "PASSWORD_RESET" => Ok(OtpPurpose::PasswordReset),
            _ => Err(format!("'{}' is not a valid OtpPurpose", s)),
        }
    }
}

impl TryFrom<String> for OtpPurpose {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct Otp {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub code: String,
    #[sqlx(try_from = "String")]
    pub purpose: OtpPurpose,
    pub is_used: bool,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

pub struct CreateOtpPayload {
    pub user_id: String,
    pub email: String,
    pub code: String,
    pub purpose: OtpPurpose,
}

pub async fn create<'e, E>(e: E, payload: CreateOtpPayload) -> Result<Otp>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Otp>(
        "
        INSERT INTO otps (id, user_id, email, code, purpose, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.user_id.clone())
    .bind(payload.email)
    .bind(payload.code)
    .bind(payload.purpose.to_string())
    .bind(Utc::now().naive_utc() + chrono::Duration::minutes(OTP_VALIDITY_MINUTES))
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while creating an OTP for user with id {}: {}",
            payload.user_id,
            err
        );
        Error::UnexpectedError
    })
}

pub async fn find_unused_by_user_id_and_code<'e, E: PgExecutor<'e>>(
    e: E,
    user_id: String,
    code: String,
    purpose: OtpPurpose,
) -> Result<Option<Otp>> {
    sqlx::query_as::<_, Otp>(
        "
        SELECT * FROM otps
        WHERE user_id = $1 AND code = $2 AND purpose = $3 AND is_used = false
        ",
    )
    .bind(user_id.clone())
    .bind(code)
    .bind(purpose.to_string())
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while fetching OTP for user with id {}: {}",
            user_id,
            err
        );
        Error::UnexpectedError
    })
}

pub async fn delete_unused_by_user_id<'e, E: PgExecutor<'e>>(
    e: E,
    user_id: String,
    purpose: OtpPurpose,
) -> Result<()> {
    sqlx::query("DELETE FROM otps WHERE user_id = $1 AND purpose = $2 AND is_used = false")
        .bind(user_id.clone())
        .bind(purpose.to_string())
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while deleting unused OTPs for user with id {}: {}",
                user_id,
                err
            );
            Error::UnexpectedError
        })
        .map(|_| ())
}

pub async fn mark_as_used_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<()> {
    sqlx::query("UPDATE otps SET is_used = true WHERE id = $1")
        .bind(id.clone())
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while marking OTP with id {} as used: {}",
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
    fn purpose_round_trips_through_its_string_form() {
        for purpose in [OtpPurpose::EmailVerification, OtpPurpose::PasswordReset] {
            let parsed = purpose.to_string().parse::<OtpPurpose>().unwrap();
            assert_eq!(parsed, purpose);
        }
        assert!("SOMETHING_ELSE".parse::<OtpPurpose>().is_err());
    }
}
