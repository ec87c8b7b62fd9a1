pub mod auth;
pub mod error;
pub(crate) mod handlers;
pub mod routes;

pub use routes::router;
