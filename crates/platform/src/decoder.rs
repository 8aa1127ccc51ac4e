//! Decoder IC abstraction
//!
//! The decoder is a hardware codec fed with raw (still compressed) file or
//! stream bytes in small chunks. It exposes a readiness gate (the DREQ pin on
//! VS10xx parts): when it reads `false` the internal FIFO is full and no more
//! data may be pushed until it drains.

use crate::audio_types::{NativeVolume, ToneControl};

/// Compressed-audio decoder device.
pub trait DecoderDevice {
    /// Error type
    type Error: core::fmt::Debug;

    /// Non-blocking readiness check: `true` when at least one chunk
    /// (32 bytes on VS10xx parts) can be accepted.
    fn ready_for_data(&mut self) -> bool;

    /// Push one chunk of bitstream data.
    ///
    /// Callers must check [`ready_for_data`] first; the chunk never exceeds
    /// the orchestrator's 64-byte feed size.
    ///
    /// [`ready_for_data`]: DecoderDevice::ready_for_data
    async fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Soft-reset the decoding core, discarding any buffered bitstream.
    async fn soft_reset(&mut self) -> Result<(), Self::Error>;

    /// Cancel the current stream immediately (hard stop).
    async fn stop(&mut self) -> Result<(), Self::Error>;

    /// Set output attenuation (0x00 loudest, 0xFF silent).
    async fn set_volume(&mut self, volume: NativeVolume) -> Result<(), Self::Error>;

    /// Program the bass/treble enhancer.
    async fn set_tone(&mut self, tone: ToneControl) -> Result<(), Self::Error>;

    /// Route the analog line input straight to the output (tuner audio).
    async fn set_analog_passthrough(&mut self, enabled: bool) -> Result<(), Self::Error>;
}
