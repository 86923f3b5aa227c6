use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use sqlx::{Postgres, Transaction};
use ulid::Ulid;

use super::super::repository;
use crate::modules::auth::repository::session::Session;
use crate::modules::user;
use crate::types::Context;
use std::sync::Arc;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
    InvalidSession,
    ExpiredToken,
}

type Result<T> = std::result::Result<T, Error>;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            tracing::error!("Error occurred while hashing a password: {}", err);
            Error::UnexpectedError
        })
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .and_then(|parsed_hash| {
            Argon2::default().verify_password(password.as_bytes(), &parsed_hash)
        })
        .is_ok()
}

pub async fn create_session(ctx: Arc<Context>, user_id: String) -> Result<Session> {
    let access_token = Ulid::new().to_string();
    let refresh_token = Ulid::new().to_string();
    repository::session::create(
        &ctx.db_conn.pool,
        repository::session::SessionCreationPayload {
            user_id,
            access_token,
            refresh_token,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)
}

pub async fn regenerate_tokens_for_session(
    ctx: Arc<Context>,
    refresh_token: String,
) -> Result<Session> {
    let session = verify_refresh_token(ctx.clone(), refresh_token).await?;

    let access_token = Ulid::new().to_string();
    let refresh_token = Ulid::new().to_string();

    repository::session::update_by_id(
        &ctx.db_conn.pool,
        session.id,
        repository::session::UpdateSessionPayload {
            access_token,
            refresh_token,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)
}

pub async fn verify_access_token(ctx: Arc<Context>, access_token: String) -> Result<Session> {
    let session = repository::session::find_by_access_token(&ctx.db_conn.pool, access_token)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .ok_or(Error::InvalidSession)?;

    if session.access_token_expires_at < Utc::now().naive_utc() {
        return Err(Error::ExpiredToken);
    };

    Ok(session)
}

pub async fn verify_refresh_token(ctx: Arc<Context>, refresh_token: String) -> Result<Session> {
    let session = repository::session::find_by_refresh_token(&ctx.db_conn.pool, refresh_token)
        .await
        .map_err(|_| Error::UnexpectedError)?
        .ok_or(Error::InvalidSession)?;

    if session.refresh_token_expires_at < Utc::now().naive_utc() {
        return Err(Error::ExpiredToken);
    };

    Ok(session)
}

pub async fn generate_unique_username(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    email: &str,
) -> Result<String> {
    let base = user::repository::username_base(name, email);
    let mut username = base.clone();
    let mut counter = 1u32;

    loop {
        match user::repository::find_by_username(&mut **tx, username.clone()).await {
            Ok(None) => return Ok(username),
            Ok(Some(_)) => {
                username = format!("{}{}", base, counter);
                counter += 1;
            }
            Err(_) => return Err(Error::UnexpectedError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_verification_accepts_only_the_original_password() {
        let hash = hash_password("hunter42").unwrap();
        assert!(verify_password("hunter42", &hash));
        assert!(!verify_password("hunter43", &hash));
    }

    #[test]
    fn hashes_are_salted_per_call() {
        let first = hash_password("hunter42").unwrap();
        let second = hash_password("hunter42").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn garbage_hashes_never_verify() {
        assert!(!verify_password("hunter42", "not-a-phc-string"));
    }
}
