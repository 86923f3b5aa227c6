use chrono::{NaiveDateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::{PgExecutor, Postgres, Transaction};

use super::super::repository::otp::{self, Otp, OtpPurpose};

pub const CODE_LENGTH: usize = 6;
pub const RESET_TOKEN_LENGTH: usize = 64;

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VerifyError {
    NotFound,
    Expired,
    UnexpectedError,
}

type Result<T> = std::result::Result<T, Error>;

/// A uniformly random 6-digit decimal code. Leading zeros are allowed, so
/// the code is always exactly six characters wide.
pub fn generate_code() -> String {
    let number = rand::thread_rng().gen_range(0..1_000_000u32);
    format!("{:0width$}", number, width = CODE_LENGTH)
}

pub fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Issues a fresh code for the user, replacing any unconsumed code for the
/// same purpose. Runs against the caller's transaction so the delete and
/// insert land atomically.
pub async fn issue(
    tx: &mut Transaction<'_, Postgres>,
    user_id: String,
    email: String,
    purpose: OtpPurpose,
) -> Result<Otp> {
    otp::delete_unused_by_user_id(&mut **tx, user_id.clone(), purpose.clone())
        .await
        .map_err(|_| Error::UnexpectedError)?;

    otp::create(
        &mut **tx,
        otp::CreateOtpPayload {
            user_id,
            email,
            code: generate_code(),
            purpose,
        },
    )
    .await
    .map_err(|_| Error::UnexpectedError)
}

/// The verify decision over the fetched row. The lookup only ever returns
/// unconsumed codes, so a consumed or replaced code lands on `NotFound`
/// rather than `Expired`, no matter how old it is.
fn check_unused(row: Option<Otp>, now: NaiveDateTime) -> std::result::Result<Otp, VerifyError> {
    let otp = row.ok_or(VerifyError::NotFound)?;

    if now > otp.expires_at {
        return Err(VerifyError::Expired);
    }

    Ok(otp)
}

/// Validates a submitted code without consuming it. An unconsumed code that
/// doesn't exist and one that has lapsed are distinct failures.
pub async fn peek<'e, E: PgExecutor<'e>>(
    e: E,
    user_id: String,
    code: String,
    purpose: OtpPurpose,
) -> std::result::Result<Otp, VerifyError> {
    let row = otp::find_unused_by_user_id_and_code(e, user_id, code, purpose)
        .await
        .map_err(|_| VerifyError::UnexpectedError)?;

    check_unused(row, Utc::now().naive_utc())
}

/// Validates a submitted code and marks it consumed. A second verify with
/// the same code fails with `NotFound` since the code is no longer unused.
pub async fn verify(
    tx: &mut Transaction<'_, Postgres>,
    user_id: String,
    code: String,
    purpose: OtpPurpose,
) -> std::result::Result<Otp, VerifyError> {
    let otp = peek(&mut **tx, user_id, code, purpose).await?;

    otp::mark_as_used_by_id(&mut **tx, otp.id.clone())
        .await
        .map_err(|_| VerifyError::UnexpectedError)?;

    Ok(otp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_decimal_digits() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn generated_codes_keep_leading_zeros() {
        // with 1000 draws over a million values a short code would show up
        // as a length change, covered above; spot-check the formatter here
        assert_eq!(format!("{:06}", 7), "000007");
    }

    #[test]
    fn reset_tokens_are_64_alphanumeric_characters() {
        let token = generate_reset_token();
        assert_eq!(token.len(), RESET_TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn reset_tokens_do_not_repeat() {
        assert_ne!(generate_reset_token(), generate_reset_token());
    }

    fn unused_otp(expires_at: NaiveDateTime) -> Otp {
        Otp {
            id: "01J00000000000000000000000".to_string(),
            user_id: "01J00000000000000000000001".to_string(),
            email: "jane@example.com".to_string(),
            code: "004217".to_string(),
            purpose: OtpPurpose::EmailVerification,
            is_used: false,
            expires_at,
            created_at: expires_at - chrono::Duration::minutes(otp::OTP_VALIDITY_MINUTES),
        }
    }

    #[test]
    fn fresh_code_passes_the_checks() {
        let now = Utc::now().naive_utc();
        let otp = unused_otp(now + chrono::Duration::minutes(5));

        let checked = check_unused(Some(otp), now).unwrap();
        assert_eq!(checked.code, "004217");
    }

    #[test]
    fn lapsed_code_is_rejected_as_expired() {
        let now = Utc::now().naive_utc();
        let otp = unused_otp(now - chrono::Duration::seconds(1));

        assert_eq!(
            check_unused(Some(otp), now).unwrap_err(),
            VerifyError::Expired
        );
    }

    #[test]
    fn missing_code_is_rejected_as_not_found() {
        let now = Utc::now().naive_utc();

        assert_eq!(check_unused(None, now).unwrap_err(), VerifyError::NotFound);
    }

    #[test]
    fn consumed_code_is_not_found_rather_than_expired() {
        // Once a code is marked used (or replaced by a re-issue) the unused
        // lookup comes back empty, so a second verify reports NotFound even
        // long after the code's expiry would have lapsed.
        let far_future = Utc::now().naive_utc() + chrono::Duration::days(30);

        assert_eq!(
            check_unused(None, far_future).unwrap_err(),
            VerifyError::NotFound
        );
    }

    #[test]
    fn code_on_its_expiry_instant_still_passes() {
        let now = Utc::now().naive_utc();
        let otp = unused_otp(now);

        assert!(check_unused(Some(otp), now).is_ok());
    }
}
