//! Status vocabulary shared with the UI and console tasks.

use crate::command::Text;

/// Which source is (or was last) selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackType {
    /// Nothing selected.
    #[default]
    None,
    /// File from the card or flash.
    File,
    /// HTTP audio stream.
    Stream,
    /// FM tuner through the analog passthrough.
    Radio,
    /// Voice announcement interrupting another source.
    Announcement,
    /// Diagnostic mode with no test source chosen yet.
    Test,
}

impl PlaybackType {
    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::File => "file",
            Self::Stream => "stream",
            Self::Radio => "radio",
            Self::Announcement => "announcement",
            Self::Test => "test",
        }
    }
}

/// Execution phase of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlayState {
    /// Nothing is fed to the decoder.
    #[default]
    Idle,
    /// A music source will be opened on the next step.
    PlaybackInit,
    /// A music source is being fed.
    PlaybackPlay,
    /// An announcement asset will be opened on the next step.
    AnnouncementInit,
    /// An announcement is being fed.
    AnnouncementPlay,
}

impl PlayState {
    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PlaybackInit => "playback-init",
            Self::PlaybackPlay => "playback-play",
            Self::AnnouncementInit => "announcement-init",
            Self::AnnouncementPlay => "announcement-play",
        }
    }
}

/// Command filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Every command is honored.
    #[default]
    Normal,
    /// Diagnostic session: only test, volume and mute commands.
    Test,
}

impl Mode {
    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Test => "test",
        }
    }
}

/// Enough state to restart a source later.
///
/// Each variant carries only its own fields, so a snapshot always agrees
/// with the source type that produced it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackSnapshot {
    /// Nothing to restore.
    #[default]
    Empty,
    /// A file and the byte offset reached.
    File {
        /// Board path.
        path: Text,
        /// Byte offset of the next unread byte.
        position: u32,
    },
    /// A stream URL.
    Stream {
        /// `http://` URL.
        url: Text,
    },
    /// A radio frequency.
    Radio {
        /// Frequency in MHz.
        frequency_mhz: f32,
    },
}

impl PlaybackSnapshot {
    /// `true` for [`PlaybackSnapshot::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Source type this snapshot restores.
    pub fn playback_type(&self) -> PlaybackType {
        match self {
            Self::Empty => PlaybackType::None,
            Self::File { .. } => PlaybackType::File,
            Self::Stream { .. } => PlaybackType::Stream,
            Self::Radio { .. } => PlaybackType::Radio,
        }
    }

    /// File path, or `""` for other sources.
    pub fn file_path(&self) -> &str {
        match self {
            Self::File { path, .. } => path.as_str(),
            _ => "",
        }
    }

    /// File offset, or 0 for other sources.
    pub fn file_position(&self) -> u32 {
        match self {
            Self::File { position, .. } => *position,
            _ => 0,
        }
    }

    /// Stream URL, or `""` for other sources.
    pub fn stream_url(&self) -> &str {
        match self {
            Self::Stream { url } => url.as_str(),
            _ => "",
        }
    }

    /// Radio frequency in MHz, or 0.0 for other sources.
    pub fn radio_frequency(&self) -> f32 {
        match self {
            Self::Radio { frequency_mhz } => *frequency_mhz,
            _ => 0.0,
        }
    }
}
