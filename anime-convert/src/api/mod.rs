//! HTTP API.
//!
//! Submission, status polling, result lookup and artifact download.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
