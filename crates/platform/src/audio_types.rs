//! Audio domain newtypes for compile-time safety.
//!
//! These zero-cost abstractions prevent common errors:
//! - `VolumePercent`: clamps 0–100, the logical volume every caller speaks
//! - `NativeVolume`: decoder attenuation units, derived from VolumePercent only
//! - `FmFrequency`: validates the 87.50–108.00 MHz broadcast band

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("value {value} outside {min}..={max}")]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

// ── VolumePercent ────────────────────────────────────────────────────────────

/// Volume as a percentage, clamped to 0–100.
///
/// Wraps a `u8` with the invariant `0 <= value <= 100`.
/// Construct with [`VolumePercent::new`] (clamping) or
/// [`VolumePercent::try_new`] (fallible, strict).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct VolumePercent(u8);

impl VolumePercent {
    /// Full loudness.
    pub const MAX: Self = Self(100);

    /// Create a `VolumePercent`, clamping values above 100 to 100.
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    /// Create a `VolumePercent` from a 32-bit command payload, clamping to 100.
    #[must_use]
    pub fn saturating_from_u32(value: u32) -> Self {
        // min(100) first so the narrowing cast cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        Self(value.min(100) as u8)
    }

    /// Create a `VolumePercent`, returning an error if `value > 100`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `value > 100`.
    pub fn try_new(value: u8) -> Result<Self, OutOfRangeError> {
        if value > 100 {
            Err(OutOfRangeError {
                value: u32::from(value),
                min: 0,
                max: 100,
            })
        } else {
            Ok(Self(value))
        }
    }

    /// Return the inner volume value (0–100).
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

// ── NativeVolume ─────────────────────────────────────────────────────────────

/// Decoder attenuation value (0x00 = loudest, 0xFF = silent).
///
/// The decoder's native volume scale is inverted relative to loudness:
/// - 0x00 → no attenuation, full volume
/// - 0xFF → maximum attenuation (effectively muted)
///
/// This type can only be constructed from a [`VolumePercent`] or as
/// [`NativeVolume::SILENT`], ensuring the conversion formula is applied
/// consistently.
///
/// Formula: `native = round((100 - volume_percent) * 255 / 100)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct NativeVolume(u8);

impl NativeVolume {
    /// Maximum attenuation, used while muted.
    pub const SILENT: Self = Self(0xFF);

    /// Convert a `VolumePercent` to the decoder's native attenuation.
    ///
    /// - 100% volume → 0x00
    /// - 50% volume  → 0x80 (127.5 rounds up)
    /// - 0% volume   → 0xFF
    #[must_use]
    pub fn from_volume(vol: VolumePercent) -> Self {
        // Max numerator: 100 * 255 + 50 = 25550 < u16::MAX, and the quotient
        // is at most 255, so neither the arithmetic nor the cast can overflow.
        #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
        let native = (u16::from(100 - vol.get()) * 255 + 50) / 100;
        #[allow(clippy::cast_possible_truncation)]
        Self(native as u8)
    }

    /// Return the raw attenuation value.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

// ── FmFrequency ──────────────────────────────────────────────────────────────

/// FM broadcast frequency in hundredths of a MHz (e.g. `10110` = 101.10 MHz).
///
/// Valid range: 8750–10800 (87.50 MHz to 108.00 MHz), the band the tuner IC
/// and the persisted settings record accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct FmFrequency(u16);

impl FmFrequency {
    /// Bottom of the band: 87.50 MHz.
    pub const MIN_HUNDREDTHS: u16 = 8_750;

    /// Top of the band: 108.00 MHz.
    pub const MAX_HUNDREDTHS: u16 = 10_800;

    /// Factory default: 101.10 MHz.
    pub const DEFAULT: Self = Self(10_110);

    /// Create an `FmFrequency` from hundredths of a MHz.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] outside 8750–10800.
    pub fn from_hundredths(hundredths: u16) -> Result<Self, OutOfRangeError> {
        if (Self::MIN_HUNDREDTHS..=Self::MAX_HUNDREDTHS).contains(&hundredths) {
            Ok(Self(hundredths))
        } else {
            Err(OutOfRangeError {
                value: u32::from(hundredths),
                min: u32::from(Self::MIN_HUNDREDTHS),
                max: u32::from(Self::MAX_HUNDREDTHS),
            })
        }
    }

    /// Create an `FmFrequency` from a MHz value, rounding to the nearest
    /// hundredth.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] for non-finite input or a value outside
    /// the band.
    pub fn from_mhz(mhz: f32) -> Result<Self, OutOfRangeError> {
        let scaled = mhz * 100.0;
        let in_band = scaled.is_finite()
            && scaled >= f32::from(Self::MIN_HUNDREDTHS) - 0.5
            && scaled < f32::from(Self::MAX_HUNDREDTHS) + 0.5;
        if !in_band {
            // `as` saturates (NaN → 0), which is fine for the error report.
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let value = scaled as u32;
            return Err(OutOfRangeError {
                value,
                min: u32::from(Self::MIN_HUNDREDTHS),
                max: u32::from(Self::MAX_HUNDREDTHS),
            });
        }
        // In band: scaled + 0.5 lies in [8750, 10801), so the cast is exact
        // after truncation and positive.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let hundredths = (scaled + 0.5) as u16;
        Self::from_hundredths(hundredths)
    }

    /// Return the frequency in hundredths of a MHz.
    #[must_use]
    pub fn hundredths(self) -> u16 {
        self.0
    }

    /// Return the frequency in MHz.
    #[must_use]
    pub fn mhz(self) -> f32 {
        f32::from(self.0) / 100.0
    }
}

impl Default for FmFrequency {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── ToneControl ─────────────────────────────────────────────────────────────

/// Bass/treble enhancer setting in the decoder's own units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ToneControl {
    /// Treble boost or cut, -8..=7 in 1.5 dB steps.
    pub treble_amplitude: i8,
    /// Treble lower limit in kHz, 1..=15 (0 disables).
    pub treble_limit_khz: u8,
    /// Bass boost, 0..=15 dB.
    pub bass_amplitude_db: u8,
    /// Bass upper limit in 10 Hz steps, 2..=15 (0 disables).
    pub bass_limit_10hz: u8,
}

/// Equalizer presets indexed by the persisted `eq_preset`.
const EQ_PRESETS: [ToneControl; 5] = [
    // Flat
    ToneControl::new(0, 0, 0, 0),
    // Bass
    ToneControl::new(0, 0, 12, 10),
    // Treble
    ToneControl::new(6, 3, 0, 0),
    // Rock
    ToneControl::new(3, 4, 8, 8),
    // Voice
    ToneControl::new(2, 3, 0, 15),
];

impl ToneControl {
    /// Flat response; the enhancer is off.
    pub const FLAT: Self = Self::new(0, 0, 0, 0);

    /// Build a setting from its four raw fields.
    pub const fn new(
        treble_amplitude: i8,
        treble_limit_khz: u8,
        bass_amplitude_db: u8,
        bass_limit_10hz: u8,
    ) -> Self {
        Self {
            treble_amplitude,
            treble_limit_khz,
            bass_amplitude_db,
            bass_limit_10hz,
        }
    }

    /// The preset at `index`; unknown indices give [`ToneControl::FLAT`].
    pub fn preset(index: u8) -> Self {
        EQ_PRESETS
            .get(usize::from(index))
            .copied()
            .unwrap_or(Self::FLAT)
    }

    /// Register nibbles in decoder order: treble amplitude, treble limit,
    /// bass amplitude, bass limit.
    #[must_use]
    pub fn to_nibbles(self) -> [u8; 4] {
        let [treble] = self.treble_amplitude.to_ne_bytes();
        [
            treble & 0x0F,
            self.treble_limit_khz & 0x0F,
            self.bass_amplitude_db & 0x0F,
            self.bass_limit_10hz & 0x0F,
        ]
    }
}
