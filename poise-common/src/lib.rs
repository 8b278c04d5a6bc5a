//! # Poise Common Library
//!
//! Shared code for the Poise scoring workspace:
//! - Common error type
//! - TOML bootstrap configuration with layered resolution
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
