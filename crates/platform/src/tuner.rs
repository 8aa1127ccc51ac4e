//! FM tuner abstraction

use crate::audio_types::FmFrequency;

/// FM receiver IC.
///
/// The orchestrator only ever tunes; RSSI, seek and stereo indication belong
/// to the UI screens that share the register bus.
pub trait Tuner {
    /// Error type
    type Error: core::fmt::Debug;

    /// Tune to `frequency` (hundredths of a MHz on the wire).
    async fn tune(&mut self, frequency: FmFrequency) -> Result<(), Self::Error>;
}
