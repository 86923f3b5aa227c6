pub mod auth;
pub mod google;
pub mod otp;
