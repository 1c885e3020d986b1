//! HTTP control surface: start and stop questions, test injection and status.

pub mod routes;
pub mod server;
pub mod types;

pub use routes::create_router;
pub use server::run_server;
