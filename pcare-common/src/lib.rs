//! # pcare Common Library
//!
//! Shared code for the pcare services:
//! - Error type shared across crates
//! - Root folder resolution and TOML configuration loading

pub mod config;
pub mod error;

pub use error::{Error, Result};
