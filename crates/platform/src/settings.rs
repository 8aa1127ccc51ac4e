//! Persisted device settings.
//!
//! The settings record lives in a small EEPROM page owned by the
//! configuration collaborator. This module defines the typed record the
//! orchestrator works with, its validation rules, and the checksummed binary
//! image the EEPROM driver stores.
//!
//! Image layout (128 bytes, little-endian):
//! ```text
//! [0..4]     magic        0xDEADBEEF
//! [4]        version      u8 = 2
//! [5]        payload_len  u8
//! [6..8]     _pad
//! [8..124]   payload      postcard-encoded `SettingsRecord`
//! [124..128] crc32        over bytes [0..124]
//! ```

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::audio_types::{FmFrequency, VolumePercent};

/// Maximum length of the remembered card file path.
pub const LAST_FILE_LEN: usize = 31;

/// Maximum length of the remembered stream URL.
pub const LAST_URL_LEN: usize = 63;

/// Number of equalizer presets (Flat, Bass, Treble, Rock, Voice).
pub const EQ_PRESET_COUNT: u8 = 5;

/// Factory default for both volume channels.
pub const DEFAULT_VOLUME: u8 = 90;

// ---------------------------------------------------------------------------
// RetriggerMode
// ---------------------------------------------------------------------------

/// How a repeated external "play" stimulus during file playback is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetriggerMode {
    /// Continue the paused file from its saved offset.
    #[default]
    ResumeOnRelease,
    /// Skip to the next playlist entry.
    NextTrackOnRelease,
}

impl RetriggerMode {
    /// Decode the persisted byte; unknown values fall back to the default.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::NextTrackOnRelease,
            _ => Self::ResumeOnRelease,
        }
    }

    /// Persisted byte representation.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ResumeOnRelease => 0,
            Self::NextTrackOnRelease => 1,
        }
    }

    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResumeOnRelease => "resume",
            Self::NextTrackOnRelease => "next-track",
        }
    }
}

// ---------------------------------------------------------------------------
// SavedSource
// ---------------------------------------------------------------------------

/// Which music source was playing last, restored at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SavedSource {
    /// Nothing played yet; start silent.
    #[default]
    None,
    /// FM radio at `last_frequency`.
    Radio,
    /// Web stream at `last_stream_url`.
    Stream,
    /// Card file at `last_file`.
    File,
}

impl SavedSource {
    /// Decode the persisted byte; unknown values mean nothing saved.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Radio,
            2 => Self::Stream,
            3 => Self::File,
            _ => Self::None,
        }
    }

    /// Persisted byte representation.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Radio => 1,
            Self::Stream => 2,
            Self::File => 3,
        }
    }

    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Radio => "radio",
            Self::Stream => "stream",
            Self::File => "file",
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors decoding or encoding a settings image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// Bytes `[0..4]` are not the settings magic.
    #[error("bad settings magic")]
    BadMagic,
    /// The image was written by an unknown layout version.
    #[error("unsupported settings version")]
    UnsupportedVersion,
    /// The CRC32 trailer does not match the image.
    #[error("settings checksum mismatch")]
    Checksum,
    /// postcard could not decode the payload.
    #[error("settings payload corrupt")]
    Decode,
    /// postcard could not encode the payload into the image.
    #[error("settings payload does not fit the image")]
    Encode,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Validated device settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Last tuned FM frequency.
    pub last_frequency: FmFrequency,
    /// Last card file played, for restore after power-up.
    pub last_file: String<LAST_FILE_LEN>,
    /// Last web stream URL played.
    pub last_stream_url: String<LAST_URL_LEN>,
    /// Music channel volume.
    pub music_volume: VolumePercent,
    /// Announcement channel volume.
    pub announcement_volume: VolumePercent,
    /// Equalizer preset index, `< EQ_PRESET_COUNT`.
    pub eq_preset: u8,
    /// Retrigger policy.
    pub retrigger_mode: RetriggerMode,
    /// Source to reopen after power-up.
    pub last_source: SavedSource,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_frequency: FmFrequency::DEFAULT,
            last_file: String::new(),
            last_stream_url: String::new(),
            music_volume: VolumePercent::new(DEFAULT_VOLUME),
            announcement_volume: VolumePercent::new(DEFAULT_VOLUME),
            eq_preset: 0,
            retrigger_mode: RetriggerMode::default(),
            last_source: SavedSource::default(),
        }
    }
}

/// On-media representation. Raw primitives so that out-of-range values
/// written by older firmware still decode and can be repaired field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SettingsRecord {
    last_frequency: u16,
    last_file: String<LAST_FILE_LEN>,
    last_stream_url: String<LAST_URL_LEN>,
    music_volume: u8,
    announcement_volume: u8,
    eq_preset: u8,
    retrigger_mode: u8,
    last_source: u8,
}

impl Settings {
    /// Total image size in bytes.
    pub const IMAGE_SIZE: usize = 128;
    /// Image magic.
    pub const MAGIC: u32 = 0xDEAD_BEEF;
    /// Image layout version.
    pub const VERSION: u8 = 2;

    const PAYLOAD_START: usize = 8;
    const CRC_START: usize = Self::IMAGE_SIZE - 4;

    /// Build settings from a raw record, replacing each out-of-range field
    /// with its default.
    fn from_record(record: SettingsRecord) -> Self {
        let defaults = Self::default();
        Self {
            last_frequency: FmFrequency::from_hundredths(record.last_frequency)
                .unwrap_or(defaults.last_frequency),
            last_file: record.last_file,
            last_stream_url: record.last_stream_url,
            music_volume: VolumePercent::try_new(record.music_volume)
                .unwrap_or(defaults.music_volume),
            announcement_volume: VolumePercent::try_new(record.announcement_volume)
                .unwrap_or(defaults.announcement_volume),
            eq_preset: if record.eq_preset < EQ_PRESET_COUNT {
                record.eq_preset
            } else {
                defaults.eq_preset
            },
            retrigger_mode: RetriggerMode::from_u8(record.retrigger_mode),
            last_source: SavedSource::from_u8(record.last_source),
        }
    }

    fn to_record(&self) -> SettingsRecord {
        SettingsRecord {
            last_frequency: self.last_frequency.hundredths(),
            last_file: self.last_file.clone(),
            last_stream_url: self.last_stream_url.clone(),
            music_volume: self.music_volume.get(),
            announcement_volume: self.announcement_volume.get(),
            eq_preset: self.eq_preset,
            retrigger_mode: self.retrigger_mode.to_u8(),
            last_source: self.last_source.to_u8(),
        }
    }

    /// Return a copy with every out-of-range field reset to its default.
    ///
    /// Typed fields are already in range; this re-checks the raw fields
    /// (equalizer preset) that public assignment can still break.
    #[must_use]
    pub fn validated(&self) -> Self {
        Self::from_record(self.to_record())
    }

    /// Remember `path` as the last card file. Paths longer than the record
    /// slot are not remembered (the slot is cleared and nothing is restored).
    pub fn remember_file(&mut self, path: &str) {
        self.last_file = String::try_from(path).unwrap_or_default();
        self.last_source = if self.last_file.is_empty() {
            SavedSource::None
        } else {
            SavedSource::File
        };
    }

    /// Remember `url` as the last stream URL (cleared if it does not fit).
    pub fn remember_stream(&mut self, url: &str) {
        self.last_stream_url = String::try_from(url).unwrap_or_default();
        self.last_source = if self.last_stream_url.is_empty() {
            SavedSource::None
        } else {
            SavedSource::Stream
        };
    }

    /// Remember `frequency` as the last radio station.
    pub fn remember_frequency(&mut self, frequency: FmFrequency) {
        self.last_frequency = frequency;
        self.last_source = SavedSource::Radio;
    }

    /// Encode into the fixed EEPROM image.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Encode`] if the payload does not fit, which
    /// the bounded string capacities rule out in practice.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, IMAGE_SIZE)`.
    #[allow(clippy::indexing_slicing)]
    pub fn encode(&self) -> Result<[u8; Self::IMAGE_SIZE], SettingsError> {
        let mut buf = [0u8; Self::IMAGE_SIZE];
        buf[0..4].copy_from_slice(&Self::MAGIC.to_le_bytes());
        buf[4] = Self::VERSION;
        let payload_len = postcard::to_slice(
            &self.validated().to_record(),
            &mut buf[Self::PAYLOAD_START..Self::CRC_START],
        )
        .map_err(|_| SettingsError::Encode)?
        .len();
        buf[5] = u8::try_from(payload_len).map_err(|_| SettingsError::Encode)?;
        let crc = crc32fast::hash(&buf[..Self::CRC_START]);
        buf[Self::CRC_START..].copy_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decode and validate an EEPROM image.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::BadMagic`], [`SettingsError::UnsupportedVersion`],
    /// [`SettingsError::Checksum`] or [`SettingsError::Decode`] for images that
    /// cannot be trusted at all. Individual out-of-range fields are repaired,
    /// not reported.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, IMAGE_SIZE)`.
    #[allow(clippy::indexing_slicing)]
    pub fn decode(buf: &[u8; Self::IMAGE_SIZE]) -> Result<Self, SettingsError> {
        if buf[0..4] != Self::MAGIC.to_le_bytes() {
            return Err(SettingsError::BadMagic);
        }
        if buf[4] != Self::VERSION {
            return Err(SettingsError::UnsupportedVersion);
        }
        let stored_crc = u32::from_le_bytes(
            buf[Self::CRC_START..]
                .try_into()
                .map_err(|_| SettingsError::Checksum)?,
        );
        if crc32fast::hash(&buf[..Self::CRC_START]) != stored_crc {
            return Err(SettingsError::Checksum);
        }
        let payload_end = Self::PAYLOAD_START.saturating_add(usize::from(buf[5]));
        let payload = buf
            .get(Self::PAYLOAD_START..payload_end.min(Self::CRC_START))
            .ok_or(SettingsError::Decode)?;
        let record: SettingsRecord =
            postcard::from_bytes(payload).map_err(|_| SettingsError::Decode)?;
        Ok(Self::from_record(record))
    }

    /// Decode an image, falling back to factory defaults when it is blank
    /// or corrupt (first boot, interrupted write).
    pub fn load_or_default(buf: &[u8; Self::IMAGE_SIZE]) -> Self {
        Self::decode(buf).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// SettingsStore
// ---------------------------------------------------------------------------

/// Configuration collaborator: persists the settings record.
pub trait SettingsStore {
    /// Error type
    type Error: core::fmt::Debug;

    /// Load the stored record (validated; defaults on a blank store).
    async fn load(&mut self) -> Result<Settings, Self::Error>;

    /// Write the record back.
    async fn persist(&mut self, settings: &Settings) -> Result<(), Self::Error>;
}
