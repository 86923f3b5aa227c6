use super::{Error, Notification, Result};
use crate::types::Context;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use std::time::Duration;

const SEND_TIMEOUT_SECS: u64 = 5;

struct Email {
    to_name: String,
    to_email: String,
    subject: String,
    body: String,
}

fn compose(notification: Notification) -> Email {
    match notification {
        Notification::VerificationOtpRequested(data) => Email {
            to_name: data.user.display_name(),
            to_email: data.email,
            subject: String::from("Your verification code"),
            body: format!(
                "Hello {}!\n\nYour verification code is: {}\n\nThis code expires in 10 minutes.\n\nIf you didn't request this code, please ignore this email.\n\nBest regards,\nThe Foodo Team",
                data.user.display_name(),
                data.code
            ),
        },
        Notification::PasswordResetOtpRequested(data) => Email {
            to_name: data.user.display_name(),
            to_email: data.email,
            subject: String::from("Reset your password"),
            body: format!(
                "Hello {}!\n\nYour password reset code is: {}\n\nThis code expires in 10 minutes.\n\nIf you didn't request a password reset, please ignore this email.\n\nBest regards,\nThe Foodo Team",
                data.user.display_name(),
                data.code
            ),
        },
    }
}

pub async fn send(ctx: Arc<Context>, notification: Notification) -> Result<()> {
    let email = compose(notification);

    let message = Message::builder()
        .from(
            format!("Foodo <{}>", ctx.mail.sender.clone())
                .parse()
                .map_err(|err| {
                    log::error!("Invalid mail sender address: {}", err);
                    Error::NotSent
                })?,
        )
        .to(format!("{} <{}>", email.to_name, email.to_email)
            .parse()
            .map_err(|err| {
                log::error!("Invalid mail recipient address: {}", err);
                Error::NotSent
            })?)
        .subject(email.subject)
        .header(ContentType::TEXT_PLAIN)
        .body(email.body)
        .map_err(|err| {
            tracing::error!("Failed to build email message: {}", err);
            Error::NotSent
        })?;

    let transport: AsyncSmtpTransport<Tokio1Executor> =
        AsyncSmtpTransport::<Tokio1Executor>::relay(ctx.mail.host.as_str())
            .map_err(|err| {
                tracing::error!("Failed to build mail transport: {}", err);
                Error::NotSent
            })?
            .credentials(Credentials::new(
                ctx.mail.user.clone(),
                ctx.mail.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(SEND_TIMEOUT_SECS)))
            .build();

    match transport.send(message).await {
        Ok(_) => Ok(()),
        Err(err) => {
            tracing::error!("Failed to send email: {:?}", err);
            Err(Error::NotSent)
        }
    }
}
