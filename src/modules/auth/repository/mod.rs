pub mod otp;
pub mod password_reset;
pub mod session;
