//! Compile-time tuning of the playback orchestrator.

use embassy_time::Duration;

/// Command queue depth shared by all producers.
pub const QUEUE_DEPTH: usize = 12;

/// Bytes pushed to the decoder per step.
pub const CHUNK_SIZE: usize = 64;

/// Header window sniffed by the format detector.
pub const HEADER_WINDOW: usize = 44;

/// Maximum payload text length (paths, URLs, frequencies).
pub const MAX_TEXT_LEN: usize = 63;

/// Playlist capacity.
pub const MAX_PLAYLIST_LEN: usize = 64;

/// Bound on the stream connect and on the header phase.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Processing loop yield between iterations.
pub const LOOP_CADENCE: Duration = Duration::from_millis(1);

/// IMA-ADPCM block size; WAV/IMA resume offsets are aligned down to it.
pub const IMA_BLOCK_SIZE: u32 = 512;

/// Bytes re-fed after a resume to cover what the decoder had buffered but
/// not yet rendered.
pub const RESUME_REWIND: u32 = 2048;

/// Directory scanned for the playlist.
pub const PLAYLIST_ROOT: &str = platform::config::MUSIC_ROOT;

/// Runtime-adjustable subset of the tuning above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on `connect` and on the HTTP header phase.
    pub stream_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream_timeout: STREAM_TIMEOUT,
        }
    }
}
