//! # TeamAtlas Common Library
//!
//! Shared code for the TeamAtlas workspace:
//! - Error type and `Result` alias
//! - TOML configuration model and root folder resolution
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
