//! Sitecheck Common Library
//!
//! Data model, configuration and small helpers shared by the sitecheck
//! pipeline crates.

pub mod config;
pub mod error;
pub mod types;
pub mod version;

// Re-export commonly used types
pub use config::{api_key_from_env, LlmConfig, PathsConfig, SitecheckConfig, API_KEY_VARS};
pub use error::{Error, Result};
pub use types::*;
pub use version::extract_version;

/// Sitecheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
