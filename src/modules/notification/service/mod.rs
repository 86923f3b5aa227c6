pub mod email;

use crate::modules::user::repository::User;

pub enum Backend {
    Email,
}

pub mod types {
    use crate::modules::user::repository::User;

    #[derive(Clone)]
    pub struct VerificationOtpRequested {
        pub user: User,
        pub email: String,
        pub code: String,
    }

    #[derive(Clone)]
    pub struct PasswordResetOtpRequested {
        pub user: User,
        pub email: String,
        pub code: String,
    }
}

#[derive(Clone)]
pub enum Notification {
    VerificationOtpRequested(types::VerificationOtpRequested),
    PasswordResetOtpRequested(types::PasswordResetOtpRequested),
}

impl Notification {
    pub fn verification_otp_requested(user: User, email: String, code: String) -> Self {
        Notification::VerificationOtpRequested(types::VerificationOtpRequested {
            user,
            email,
            code,
        })
    }

    pub fn password_reset_otp_requested(user: User, email: String, code: String) -> Self {
        Notification::PasswordResetOtpRequested(types::PasswordResetOtpRequested {
            user,
            email,
            code,
        })
    }
}

#[derive(Debug)]
pub enum Error {
    NotSent,
}

pub type Result<T> = std::result::Result<T, Error>;

use crate::types::Context;
use std::sync::Arc;

pub async fn send(ctx: Arc<Context>, notification: Notification, backend: Backend) -> Result<()> {
    match backend {
        Backend::Email => email::send(ctx, notification).await,
    }
}
