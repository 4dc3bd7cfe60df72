//! Domain layer for ecommerce tracking
//!
//! This module contains the tracked data model and the ports the host
//! framework implements.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{TrackerError, TrackerResult};
