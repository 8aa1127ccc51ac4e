//! Application configuration and constants
//!
//! Branding and board-level constants shared by every crate. Playback tuning
//! knobs (chunk size, queue depth, timeouts) live in `playback::config`.

/// The application name
pub const APP_NAME: &str = "RadioVoice";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Root of the music library on the removable card.
pub const MUSIC_ROOT: &str = "/";
