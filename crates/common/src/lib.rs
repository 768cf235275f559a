//! Common utilities and types shared across Hostlink Rust components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
