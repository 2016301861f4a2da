//! Infrastructure layer.
//!
//! Provides technical concerns that support the application without
//! containing connection logic: configuration loading, validation and
//! logging initialization.

pub mod config;
