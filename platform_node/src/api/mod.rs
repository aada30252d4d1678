//! HTTP/JSON surface of the engine.

pub mod errors;
pub mod handlers;
pub mod server;

pub use errors::{ApiError, ApiResult};
pub use server::{create_router, start_server, AppState};
