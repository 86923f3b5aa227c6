pub mod middleware;
pub mod repository;
pub mod routes;
pub mod service;

pub use routes::{get_router, get_verification_router};
