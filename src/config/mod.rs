//! Configuration management for the pairing-pool service
//!
//! This module handles configuration loading from environment variables or a
//! TOML file, validation, and default values for the matchmaking engine.

pub mod app;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, MatchmakingSettings, NotifierSettings, ServiceSettings};
