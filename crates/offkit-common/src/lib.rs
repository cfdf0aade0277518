//! # OffKit Common
//!
//! Shared utilities for the OffKit offline-support worker.
//!
//! Currently this is logging configuration only; error types live in the
//! crate that produces them.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
