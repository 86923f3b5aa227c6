pub mod address;
pub mod auth;
pub mod meal;
pub mod notification;
pub mod order;
pub mod user;

mod router;
pub use router::get_router;
