//! Playback orchestrator: source arbitration, announcement priority,
//! byte-accurate resume and decoder feeding for the RadioVoice board.
//!
//! # Layers
//!
//! ```text
//! AudioHandle (producers) ─▶ command queue ─▶ AudioTask loop
//!                                              │ dispatch (one command)
//!                                              │ step     (one chunk)
//!                                              ▼
//!                                          AudioEngine ─▶ platform traits
//! ```
//!
//! # Features
//!
//! - `std`: host builds; enables the `platform` mocks.
//! - `defmt`: log through defmt (hardware).
//! - `tracing`: log through tracing (host).
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]

// Must come first: the log macros are textually scoped.
mod fmt;

pub mod command;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod format;
pub mod playlist;
pub mod snapshot;
pub mod stream;
pub mod task;
pub mod volume;

pub use command::{Command, TestSource};
pub use engine::{AudioEngine, Peripherals};
pub use error::{EnqueueError, PlaybackError, TextTooLong};
pub use format::AudioFormat;
pub use snapshot::{Mode, PlayState, PlaybackSnapshot, PlaybackType};
pub use task::{AudioHandle, AudioShared, AudioStatus, AudioTask};
