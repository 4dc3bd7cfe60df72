//! Infrastructure layer module
//!
//! Ambient concerns around the tracking core:
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;
