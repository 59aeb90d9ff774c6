//! REST API under `/api` and the embedded browser page

mod entities;
pub mod error;
mod handler;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{router, AppState, HttpServer};
