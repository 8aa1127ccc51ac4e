//! Hardware Abstraction Layer (HAL) for the RadioVoice audio board
//!
//! This crate provides trait-based abstractions for every peripheral the
//! playback orchestrator talks to, enabling development and testing without
//! physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Producer tasks (keypad/opto scanner, UI, serial console)
//!         ↓  commands
//! Playback orchestrator (playback crate)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Chip drivers (decoder IC over SPI, FM tuner over I2C, SD/flash, Wi-Fi)
//! ```
//!
//! # Collaborators
//!
//! - [`DecoderDevice`] - Compressed-audio decoder IC with a readiness gate
//! - [`Tuner`] - FM receiver
//! - [`Storage`] - Removable card and local flash volumes
//! - [`NetworkClient`] - TCP socket for HTTP audio streams
//! - [`SettingsStore`] - EEPROM-backed [`Settings`] record
//!
//! # Features
//!
//! - `std`: In-memory mocks of every trait ([`mocks`])
//! - `defmt`: Enable defmt derives

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // chip names and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors; callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod audio_types;
pub mod config;
pub mod decoder;
pub mod network;
pub mod settings;
pub mod storage;
pub mod tuner;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

// Re-export main high-level traits
pub use audio_types::{FmFrequency, NativeVolume, OutOfRangeError, ToneControl, VolumePercent};
pub use decoder::DecoderDevice;
pub use network::NetworkClient;
pub use settings::{RetriggerMode, SavedSource, Settings, SettingsError, SettingsStore};
pub use storage::{AudioFile, DirEntry, Storage, StorageVolume};
pub use tuner::Tuner;
