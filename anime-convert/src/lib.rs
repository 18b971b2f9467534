//! anime-convert library crate.
//!
//! Accepts uploaded videos, runs them through a fixed chain of external
//! stage executables and publishes the resulting anime-style video.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod utils;

pub use error::{Error, Result};
