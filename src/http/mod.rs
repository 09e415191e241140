//! HTTP boundary for the quota check service.

mod handler;
mod server;

pub use handler::{CheckRequest, CheckResponse};
pub use server::{router, HttpServer};
