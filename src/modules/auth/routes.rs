use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use validator::{Validate, ValidationError};

use super::middleware::Auth;
use super::repository::{otp::OtpPurpose, password_reset, session::Session};
use super::service;
use crate::modules::{address, notification, user};
use crate::types::Context;
use crate::utils::validation;

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let regex = Regex::new(r"^\+?\d{7,15}$").expect("Invalid phone number regex");
    match regex.is_match(phone) {
        true => Ok(()),
        false => Err(ValidationError::new("Invalid phone number")),
    }
}

fn session_payload(user: &user::repository::User, session: &Session) -> serde_json::Value {
    json!({
        "user": user,
        "access": session.access_token,
        "refresh": session.refresh_token,
    })
}

#[derive(Deserialize, Validate)]
struct SignUpPayload {
    #[validate(email)]
    email: String,
    password: String,
    #[serde(default)]
    name: String,
    #[validate(custom(function = "validate_phone"))]
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    #[serde(alias = "zipCode")]
    zip_code: Option<String>,
    #[serde(default, alias = "isChef")]
    is_chef: bool,
    #[serde(alias = "profilePicture")]
    profile_picture: Option<String>,
}

async fn sign_up(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<SignUpPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Registration failed", errors);
    }

    match user::repository::find_by_email(&ctx.db_conn.pool, payload.email.clone()).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": "Registration failed",
                    "errors": { "email": ["A user with this email already exists"] },
                })),
            )
        }
        Ok(None) => (),
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    let password_hash = match service::auth::hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

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

    let username =
        match service::auth::generate_unique_username(&mut tx, &payload.name, &payload.email).await
        {
            Ok(username) => username,
            Err(_) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
                )
            }
        };

    let (first_name, last_name) = user::repository::split_name(&payload.name);

    let created_user = match user::repository::create(
        &mut *tx,
        user::repository::CreateUserPayload {
            email: payload.email.clone(),
            username,
            password_hash: Some(password_hash),
            first_name,
            last_name,
            phone: payload.phone,
            address: payload.address,
            city: payload.city,
            zip_code: payload.zip_code,
            profile_picture: payload.profile_picture,
            is_chef: payload.is_chef,
            is_verified: false,
        },
    )
    .await
    {
        Ok(user) => user,
        // A concurrent signup can win the unique index after the pre-check.
        Err(user::repository::Error::Conflict) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": "Registration failed",
                    "errors": { "email": ["A user with this email already exists"] },
                })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    let otp = match service::otp::issue(
        &mut tx,
        created_user.id.clone(),
        created_user.email.clone(),
        OtpPurpose::EmailVerification,
    )
    .await
    {
        Ok(otp) => otp,
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

    // Delivery is best-effort: a dead mail relay must not fail the signup.
    if notification::service::send(
        ctx.clone(),
        notification::service::Notification::verification_otp_requested(
            created_user.clone(),
            created_user.email.clone(),
            otp.code.clone(),
        ),
        notification::service::Backend::Email,
    )
    .await
    .is_err()
    {
        tracing::warn!(
            "Failed to deliver verification code to {}",
            created_user.email
        );
    }

    let session = match service::auth::create_session(ctx.clone(), created_user.id.clone()).await {
        Ok(session) => session,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "data": session_payload(&created_user, &session),
        })),
    )
}

#[derive(Deserialize, Validate)]
struct SignInPayload {
    #[validate(email)]
    email: String,
    password: String,
}

async fn sign_in(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<SignInPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Login failed", errors);
    }

    let user = match user::repository::find_by_email(&ctx.db_conn.pool, payload.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": "Login failed",
                    "errors": ["This email is not registered. Please sign up first."],
                })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    if !user.is_active {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Login failed",
                "errors": ["Your account has been disabled. Please contact support."],
            })),
        );
    }

    let password_matches = user
        .password_hash
        .as_deref()
        .map(|hash| service::auth::verify_password(&payload.password, hash))
        .unwrap_or(false);

    if !password_matches {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Login failed",
                "errors": ["Invalid password. Please check your credentials and try again."],
            })),
        );
    }

    let session = match service::auth::create_session(ctx.clone(), user.id.clone()).await {
        Ok(session) => session,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Login successful",
            "data": session_payload(&user, &session),
        })),
    )
}

#[derive(Deserialize)]
struct GoogleSignInPayload {
    #[serde(alias = "accessToken")]
    access_token: String,
}

async fn google_sign_in(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<GoogleSignInPayload>,
) -> impl IntoResponse {
    let info = match service::google::fetch_user_info(ctx.clone(), payload.access_token).await {
        Ok(info) => info,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": "Google sign-in failed",
                    "errors": ["Could not verify the Google access token"],
                })),
            )
        }
    };

    let existing = match user::repository::find_by_email(&ctx.db_conn.pool, info.email.clone())
        .await
    {
        Ok(existing) => existing,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    let user = match existing {
        Some(user) => {
            if !user.is_active {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "success": false,
                        "message": "Google sign-in failed",
                        "errors": ["Your account has been disabled. Please contact support."],
                    })),
                );
            }

            let (first_name, last_name) = match info.name.as_deref() {
                Some(name) => user::repository::split_name(name),
                None => (
                    info.given_name.clone().unwrap_or_default(),
                    info.family_name.clone().unwrap_or_default(),
                ),
            };

            // Backfill profile fields the account is missing, never overwrite.
            let update = user::repository::UpdateUserPayload {
                first_name: (user.first_name.is_empty() && !first_name.is_empty())
                    .then_some(first_name),
                last_name: (user.last_name.is_empty() && !last_name.is_empty())
                    .then_some(last_name),
                profile_picture: user
                    .profile_picture
                    .is_none()
                    .then_some(info.picture.clone())
                    .flatten(),
                ..Default::default()
            };

            if user::repository::update_by_id(&ctx.db_conn.pool, user.id.clone(), update)
                .await
                .is_err()
            {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
                );
            }

            match user::repository::find_by_id(&ctx.db_conn.pool, user.id.clone()).await {
                Ok(Some(user)) => user,
                _ => {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
                    )
                }
            }
        }
        None => {
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

            let name = info.name.clone().unwrap_or_default();
            let username =
                match service::auth::generate_unique_username(&mut tx, &name, &info.email).await {
                    Ok(username) => username,
                    Err(_) => {
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(
                                json!({ "success": false, "message": "Sorry, an error occurred" }),
                            ),
                        )
                    }
                };

            let (first_name, last_name) = user::repository::split_name(&name);

            let created = match user::repository::create(
                &mut *tx,
                user::repository::CreateUserPayload {
                    email: info.email.clone(),
                    username,
                    // Provider-backed accounts carry no usable password.
                    password_hash: None,
                    first_name,
                    last_name,
                    phone: None,
                    address: None,
                    city: None,
                    zip_code: None,
                    profile_picture: info.picture.clone(),
                    is_chef: false,
                    is_verified: true,
                },
            )
            .await
            {
                Ok(user) => user,
                Err(user::repository::Error::Conflict) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({
                            "success": false,
                            "message": "Google sign-in failed",
                            "errors": ["A user with this email already exists"],
                        })),
                    )
                }
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

            created
        }
    };

    let session = match service::auth::create_session(ctx.clone(), user.id.clone()).await {
        Ok(session) => session,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Login successful",
            "data": session_payload(&user, &session),
        })),
    )
}

#[derive(Deserialize)]
struct RefreshTokensPayload {
    #[serde(alias = "refreshToken")]
    refresh_token: String,
}

async fn refresh_tokens(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<RefreshTokensPayload>,
) -> impl IntoResponse {
    match service::auth::regenerate_tokens_for_session(ctx.clone(), payload.refresh_token).await {
        Ok(session) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Tokens refreshed",
                "data": {
                    "access": session.access_token,
                    "refresh": session.refresh_token,
                },
            })),
        ),
        Err(service::auth::Error::InvalidSession) | Err(service::auth::Error::ExpiredToken) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Invalid or expired refresh token" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

async fn current_user(State(ctx): State<Arc<Context>>, auth: Auth) -> impl IntoResponse {
    match address::repository::find_many_by_user_id(&ctx.db_conn.pool, auth.user.id.clone()).await
    {
        Ok(addresses) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": auth.user.into_profile(addresses),
            })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

#[derive(Deserialize, Validate)]
struct UpdateProfilePayload {
    #[validate(email)]
    email: Option<String>,
    username: Option<String>,
    #[serde(alias = "firstName")]
    first_name: Option<String>,
    #[serde(alias = "lastName")]
    last_name: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    #[serde(alias = "zipCode")]
    zip_code: Option<String>,
    #[serde(alias = "profilePicture")]
    profile_picture: Option<String>,
    #[serde(alias = "chefBio")]
    chef_bio: Option<String>,
}

async fn update_profile(
    State(ctx): State<Arc<Context>>,
    auth: Auth,
    Json(payload): Json<UpdateProfilePayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Profile update failed", errors);
    }

    if let Some(email) = payload.email.clone() {
        match user::repository::find_by_email(&ctx.db_conn.pool, email).await {
            Ok(Some(existing)) if existing.id != auth.user.id => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "success": false,
                        "message": "Profile update failed",
                        "errors": { "email": ["This email is already in use"] },
                    })),
                )
            }
            Ok(_) => (),
            Err(_) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
                )
            }
        }
    }

    if let Some(username) = payload.username.clone() {
        match user::repository::find_by_username(&ctx.db_conn.pool, username).await {
            Ok(Some(existing)) if existing.id != auth.user.id => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "success": false,
                        "message": "Profile update failed",
                        "errors": { "username": ["This username is already in use"] },
                    })),
                )
            }
            Ok(_) => (),
            Err(_) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
                )
            }
        }
    }

    match user::repository::update_by_id(
        &ctx.db_conn.pool,
        auth.user.id.clone(),
        user::repository::UpdateUserPayload {
            email: payload.email,
            username: payload.username,
            first_name: payload.first_name,
            last_name: payload.last_name,
            phone: payload.phone,
            address: payload.address,
            city: payload.city,
            zip_code: payload.zip_code,
            profile_picture: payload.profile_picture,
            chef_bio: payload.chef_bio,
        },
    )
    .await
    {
        Ok(()) => (),
        // A concurrent update can win the unique indexes after the pre-checks.
        Err(user::repository::Error::Conflict) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": "Profile update failed",
                    "errors": {
                        "non_field_errors": ["This email or username is already in use"],
                    },
                })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    }

    let user = match user::repository::find_by_id(&ctx.db_conn.pool, auth.user.id.clone()).await {
        Ok(Some(user)) => user,
        _ => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    match address::repository::find_many_by_user_id(&ctx.db_conn.pool, user.id.clone()).await {
        Ok(addresses) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Profile updated successfully",
                "data": user.into_profile(addresses),
            })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

#[derive(Deserialize, Validate)]
struct SendOtpPayload {
    #[validate(email)]
    email: String,
}

async fn issue_verification_otp(
    ctx: Arc<Context>,
    email: String,
    success_message: &'static str,
) -> (StatusCode, Json<serde_json::Value>) {
    let user = match user::repository::find_by_email(&ctx.db_conn.pool, email.clone()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "message": "User not found" })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

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

    let otp = match service::otp::issue(
        &mut tx,
        user.id.clone(),
        email.clone(),
        OtpPurpose::EmailVerification,
    )
    .await
    {
        Ok(otp) => otp,
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

    if notification::service::send(
        ctx.clone(),
        notification::service::Notification::verification_otp_requested(
            user.clone(),
            email.clone(),
            otp.code.clone(),
        ),
        notification::service::Backend::Email,
    )
    .await
    .is_err()
    {
        tracing::warn!("Failed to deliver verification code to {}", email);
    }

    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": success_message })),
    )
}

async fn send_otp(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<SendOtpPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Failed to send OTP", errors);
    }

    issue_verification_otp(ctx, payload.email, "OTP sent successfully").await
}

async fn resend_otp(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<SendOtpPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Failed to resend OTP", errors);
    }

    issue_verification_otp(ctx, payload.email, "OTP resent successfully").await
}

#[derive(Deserialize, Validate)]
struct VerifyEmailPayload {
    #[validate(email)]
    email: String,
    code: String,
}

fn verify_error_response(err: service::otp::VerifyError) -> (StatusCode, Json<serde_json::Value>) {
    match err {
        service::otp::VerifyError::NotFound => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "Invalid OTP code" })),
        ),
        service::otp::VerifyError::Expired => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "OTP code has expired" })),
        ),
        service::otp::VerifyError::UnexpectedError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
        ),
    }
}

async fn verify_email(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<VerifyEmailPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Verification failed", errors);
    }

    let user = match user::repository::find_by_email(&ctx.db_conn.pool, payload.email.clone()).await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "message": "User not found" })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

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

    if let Err(err) = service::otp::verify(
        &mut tx,
        user.id.clone(),
        payload.code,
        OtpPurpose::EmailVerification,
    )
    .await
    {
        return verify_error_response(err);
    }

    if user::repository::verify_by_email(&mut *tx, payload.email.clone())
        .await
        .is_err()
    {
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

    let user = match user::repository::find_by_id(&ctx.db_conn.pool, user.id).await {
        Ok(Some(user)) => user,
        _ => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Email verified successfully",
            "data": user,
        })),
    )
}

#[derive(Deserialize, Validate)]
struct ForgotPasswordPayload {
    #[validate(email)]
    email: String,
}

async fn forgot_password(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Failed to send reset instructions", errors);
    }

    let user = match user::repository::find_by_email(&ctx.db_conn.pool, payload.email.clone()).await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "message": "User not found" })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

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

    let otp = match service::otp::issue(
        &mut tx,
        user.id.clone(),
        payload.email.clone(),
        OtpPurpose::PasswordReset,
    )
    .await
    {
        Ok(otp) => otp,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    // The reset path is code-gated; the opaque token is kept alongside as an
    // alternate credential.
    let token_created = async {
        password_reset::delete_unused_by_user_id(&mut *tx, user.id.clone()).await?;
        password_reset::create(
            &mut *tx,
            password_reset::CreatePasswordResetTokenPayload {
                user_id: user.id.clone(),
                token: service::otp::generate_reset_token(),
            },
        )
        .await
        .map(|_| ())
    }
    .await;

    if token_created.is_err() {
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

    if notification::service::send(
        ctx.clone(),
        notification::service::Notification::password_reset_otp_requested(
            user.clone(),
            payload.email.clone(),
            otp.code.clone(),
        ),
        notification::service::Backend::Email,
    )
    .await
    .is_err()
    {
        tracing::warn!("Failed to deliver password reset code to {}", payload.email);
    }

    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Password reset instructions sent" })),
    )
}

#[derive(Deserialize, Validate)]
struct VerifyPasswordResetOtpPayload {
    #[validate(email)]
    email: String,
    #[serde(alias = "otpCode")]
    otp_code: String,
}

async fn verify_password_reset_otp(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<VerifyPasswordResetOtpPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Verification failed", errors);
    }

    let user = match user::repository::find_by_email(&ctx.db_conn.pool, payload.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": "Invalid OTP code" })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    match service::otp::peek(
        &ctx.db_conn.pool,
        user.id,
        payload.otp_code,
        OtpPurpose::PasswordReset,
    )
    .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "OTP verified" })),
        ),
        Err(err) => verify_error_response(err),
    }
}

#[derive(Deserialize, Validate)]
struct ResetPasswordPayload {
    #[validate(email)]
    email: String,
    #[serde(alias = "otpCode")]
    otp_code: String,
    #[serde(alias = "newPassword")]
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    new_password: String,
}

async fn reset_password(
    State(ctx): State<Arc<Context>>,
    Json(payload): Json<ResetPasswordPayload>,
) -> impl IntoResponse {
    if let Err(errors) = payload.validate() {
        return validation::into_response("Password reset failed", errors);
    }

    let user = match user::repository::find_by_email(&ctx.db_conn.pool, payload.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": "Invalid OTP code" })),
            )
        }
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

    let password_hash = match service::auth::hash_password(&payload.new_password) {
        Ok(hash) => hash,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Sorry, an error occurred" })),
            )
        }
    };

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

    if let Err(err) = service::otp::verify(
        &mut tx,
        user.id.clone(),
        payload.otp_code,
        OtpPurpose::PasswordReset,
    )
    .await
    {
        return verify_error_response(err);
    }

    if user::repository::set_password_hash(&mut *tx, user.id.clone(), password_hash)
        .await
        .is_err()
    {
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
        Json(json!({ "success": true, "message": "Password reset successful" })),
    )
}

pub fn get_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/signup", post(sign_up))
        .route("/login", post(sign_in))
        .route("/google-signin", post(google_sign_in))
        .route("/refresh", post(refresh_tokens))
        .route("/me", get(current_user))
        .route("/profile", put(update_profile).patch(update_profile))
}

pub fn get_verification_router() -> Router<Arc<Context>> {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/verify-email", post(verify_email))
        .route("/resend-otp", post(resend_otp))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-password-reset-otp", post(verify_password_reset_otp))
        .route("/reset-password", post(reset_password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_payload_accepts_camel_case_aliases() {
        let payload: UpdateProfilePayload = serde_json::from_value(serde_json::json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "zipCode": "90210",
            "chefBio": "I cook",
        }))
        .unwrap();

        assert_eq!(payload.first_name.as_deref(), Some("Jane"));
        assert_eq!(payload.last_name.as_deref(), Some("Doe"));
        assert_eq!(payload.zip_code.as_deref(), Some("90210"));
        assert_eq!(payload.chef_bio.as_deref(), Some("I cook"));
    }

    #[test]
    fn short_replacement_passwords_fail_validation() {
        let payload: ResetPasswordPayload = serde_json::from_value(serde_json::json!({
            "email": "jane@example.com",
            "otpCode": "123456",
            "newPassword": "12345",
        }))
        .unwrap();

        assert_eq!(payload.otp_code, "123456");
        assert!(payload.validate().is_err());

        let payload: ResetPasswordPayload = serde_json::from_value(serde_json::json!({
            "email": "jane@example.com",
            "otp_code": "123456",
            "new_password": "123456",
        }))
        .unwrap();

        assert!(payload.validate().is_ok());
    }

    #[test]
    fn phone_numbers_are_digits_with_optional_plus() {
        assert!(validate_phone("+15551234567").is_ok());
        assert!(validate_phone("5551234").is_ok());
        assert!(validate_phone("call me").is_err());
        assert!(validate_phone("+1 555 123").is_err());
    }
}
