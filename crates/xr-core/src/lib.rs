//! Core runtime support for xenon-rt
//!
//! This crate provides the foundational error types, configuration, and
//! logging infrastructure shared by the recompiled-code runtime crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{HleError, MemoryError, Result, RuntimeError};
