use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use ulid::Ulid;

use crate::modules::address::repository::Address;

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Conflict,
    UnexpectedError,
}

/// Writes race against each other on the email and username unique indexes;
/// the losing insert or update surfaces as a `Conflict` the handlers can
/// report as a duplicate instead of a server fault.
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => Error::Conflict,
            _ => Error::UnexpectedError,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub profile_picture: Option<String>,
    pub is_chef: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub is_verified: bool,
    pub chef_bio: Option<String>,
    pub chef_rating: BigDecimal,
    pub total_orders: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl User {
    pub fn display_name(&self) -> String {
        if !self.first_name.is_empty() && !self.last_name.is_empty() {
            format!("{} {}", self.first_name, self.last_name)
        } else if !self.first_name.is_empty() {
            self.first_name.clone()
        } else {
            self.username.clone()
        }
    }

    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn into_profile(self, addresses: Vec<Address>) -> UserProfile {
        let name = self.display_name();
        UserProfile {
            user: self,
            name,
            addresses,
        }
    }
}

#[derive(Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub name: String,
    pub addresses: Vec<Address>,
}

/// Splits a display name on the first space into first and last name.
pub fn split_name(name: &str) -> (String, String) {
    match name.split_once(' ') {
        Some((first, last)) => (first.to_string(), last.to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// The username candidate before collision disambiguation: the raw name if
/// present, otherwise the local part of the email address.
pub fn username_base(name: &str, email: &str) -> String {
    if !name.is_empty() {
        name.to_string()
    } else {
        email.split('@').next().unwrap_or(email).to_string()
    }
}

pub struct CreateUserPayload {
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub profile_picture: Option<String>,
    pub is_chef: bool,
    pub is_verified: bool,
}

pub async fn create<'e, E>(e: E, payload: CreateUserPayload) -> Result<User>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(
        "
        INSERT INTO users (
            id, email, username, password_hash, first_name, last_name, phone,
            address, city, zip_code, profile_picture, is_chef, is_verified
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.email)
    .bind(payload.username)
    .bind(payload.password_hash)
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(payload.phone)
    .bind(payload.address)
    .bind(payload.city)
    .bind(payload.zip_code)
    .bind(payload.profile_picture)
    .bind(payload.is_chef)
    .bind(payload.is_verified)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating a user account: {}", err);
        Error::from(err)
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching user with id {}: {}", id, err);
            Error::UnexpectedError
        })
}

pub async fn find_by_email<'e, E: PgExecutor<'e>>(e: E, email: String) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred in find_by_email: {}", err);
            Error::UnexpectedError
        })
}

pub async fn find_by_username<'e, E: PgExecutor<'e>>(
    e: E,
    username: String,
) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred in find_by_username: {}", err);
            Error::UnexpectedError
        })
}

#[derive(Default)]
pub struct UpdateUserPayload {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub profile_picture: Option<String>,
    pub chef_bio: Option<String>,
}

pub async fn update_by_id<'e, E: PgExecutor<'e>>(
    e: E,
    id: String,
    payload: UpdateUserPayload,
) -> Result<()> {
    sqlx::query(
        "
            UPDATE users SET
                email = COALESCE($1, email),
                username = COALESCE($2, username),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                city = COALESCE($7, city),
                zip_code = COALESCE($8, zip_code),
                profile_picture = COALESCE($9, profile_picture),
                chef_bio = COALESCE($10, chef_bio),
                updated_at = NOW()
            WHERE
                id = $11
        ",
    )
    .bind(payload.email)
    .bind(payload.username)
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(payload.phone)
    .bind(payload.address)
    .bind(payload.city)
    .bind(payload.zip_code)
    .bind(payload.profile_picture)
    .bind(payload.chef_bio)
    .bind(id.clone())
    .execute(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while trying to update a user by id {}: {}",
            id,
            err
        );
        Error::from(err)
    })
    .map(|_| ())
}

pub async fn set_password_hash<'e, E: PgExecutor<'e>>(
    e: E,
    id: String,
    password_hash: String,
) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(password_hash)
        .bind(id.clone())
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to set password for user with id {}: {}",
                id,
                err
            );
            Error::UnexpectedError
        })
        .map(|_| ())
}

pub async fn verify_by_email<'e, E: PgExecutor<'e>>(e: E, email: String) -> Result<()> {
    sqlx::query("UPDATE users SET is_verified = true, updated_at = NOW() WHERE email = $1")
        .bind(email)
        .execute(e)
        .await
        .map_err(|err| {
            tracing::error!(
                "Error occurred while trying to verify user by email: {}",
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
    fn split_name_uses_first_space_only() {
        assert_eq!(
            split_name("Jane Doe"),
            ("Jane".to_string(), "Doe".to_string())
        );
        assert_eq!(
            split_name("Mary Jane Watson"),
            ("Mary".to_string(), "Jane Watson".to_string())
        );
        assert_eq!(split_name("Cher"), ("Cher".to_string(), String::new()));
    }

    #[test]
    fn username_base_prefers_name_over_email_local_part() {
        assert_eq!(username_base("Jane Doe", "jane@example.com"), "Jane Doe");
        assert_eq!(username_base("", "jane.doe@example.com"), "jane.doe");
    }

    fn sample_user() -> User {
        User {
            id: "01J00000000000000000000000".to_string(),
            email: "jane@example.com".to_string(),
            username: "jane".to_string(),
            password_hash: None,
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            address: None,
            city: None,
            zip_code: None,
            profile_picture: None,
            is_chef: false,
            is_staff: false,
            is_superuser: false,
            is_active: true,
            is_verified: false,
            chef_bio: None,
            chef_rating: BigDecimal::from(0),
            total_orders: 0,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: None,
        }
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = sample_user();
        assert_eq!(user.display_name(), "jane");

        user.first_name = "Jane".to_string();
        assert_eq!(user.display_name(), "Jane");

        user.last_name = "Doe".to_string();
        assert_eq!(user.display_name(), "Jane Doe");
    }

    #[derive(Debug)]
    struct StubDatabaseError {
        unique: bool,
    }

    impl std::fmt::Display for StubDatabaseError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for StubDatabaseError {}

    impl sqlx::error::DatabaseError for StubDatabaseError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            match self.unique {
                true => sqlx::error::ErrorKind::UniqueViolation,
                false => sqlx::error::ErrorKind::Other,
            }
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn unique_violations_surface_as_conflict() {
        let err = sqlx::Error::Database(Box::new(StubDatabaseError { unique: true }));
        assert_eq!(Error::from(err), Error::Conflict);
    }

    #[test]
    fn other_database_failures_stay_unexpected() {
        let err = sqlx::Error::Database(Box::new(StubDatabaseError { unique: false }));
        assert_eq!(Error::from(err), Error::UnexpectedError);

        assert_eq!(Error::from(sqlx::Error::RowNotFound), Error::UnexpectedError);
    }

    #[test]
    fn serialized_user_never_exposes_password_hash() {
        let mut user = sample_user();
        user.password_hash = Some("argon2-hash".to_string());
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["email"], "jane@example.com");
    }
}
