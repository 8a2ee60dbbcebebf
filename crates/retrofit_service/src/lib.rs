//! HTTP service for retrofit energy and emissions predictions
//!
//! Loads one artifact bundle at startup and serves it under `/retrofit`.

pub mod config;
pub mod logging;
pub mod report;
mod routes;
pub mod server;

pub use config::ServiceConfig;
pub use server::{build_router, start_server, AppState, SharedState};
