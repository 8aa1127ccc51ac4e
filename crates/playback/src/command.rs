//! Commands accepted by the audio task.
//!
//! Each variant carries exactly the payload its kind needs: bounded text for
//! paths, URLs and frequencies, a number for volumes, nothing otherwise.

use heapless::String;

use crate::config::MAX_TEXT_LEN;
use crate::error::TextTooLong;

/// Bounded command text (path, URL or decimal MHz).
pub type Text = String<MAX_TEXT_LEN>;

/// Copy `s` into a [`Text`], rejecting anything longer than the capacity.
///
/// # Errors
///
/// Returns [`TextTooLong`] instead of truncating.
pub fn text(s: &str) -> Result<Text, TextTooLong> {
    Text::try_from(s).map_err(|_| TextTooLong {
        len: s.len(),
        max: MAX_TEXT_LEN,
    })
}

/// A request for the audio task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Play a file (`/spiffs/...` selects the flash volume).
    PlayFile(Text),
    /// Play an `http://` stream.
    PlayStream(Text),
    /// Tune the radio to a decimal MHz frequency.
    PlayRadio(Text),
    /// Interrupt with a voice announcement, then restore.
    PlayAnnouncement(Text),
    /// Enter the diagnostic mode.
    StartTest,
    /// Play a diagnostic source, classified by content.
    PlayTestSource(Text),
    /// Leave the diagnostic mode and restore what was playing.
    StopTest,
    /// Next playlist entry.
    NextTrack,
    /// Previous playlist entry.
    PrevTrack,
    /// Pause file playback.
    Pause,
    /// Resume the paused file.
    Resume,
    /// Stop everything and forget the snapshot.
    Stop,
    /// Music volume, 0–100 (clamped).
    SetMusicVolume(u32),
    /// Announcement volume, 0–100 (clamped).
    SetAnnouncementVolume(u32),
    /// Toggle mute.
    MuteToggle,
}

impl Command {
    /// Whether the command is honored while the diagnostic mode is active.
    pub fn allowed_in_test(&self) -> bool {
        matches!(
            self,
            Self::StartTest
                | Self::StopTest
                | Self::PlayTestSource(_)
                | Self::SetMusicVolume(_)
                | Self::SetAnnouncementVolume(_)
                | Self::MuteToggle
        )
    }

    /// Short name for log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayFile(_) => "PlayFile",
            Self::PlayStream(_) => "PlayStream",
            Self::PlayRadio(_) => "PlayRadio",
            Self::PlayAnnouncement(_) => "PlayAnnouncement",
            Self::StartTest => "StartTest",
            Self::PlayTestSource(_) => "PlayTestSource",
            Self::StopTest => "StopTest",
            Self::NextTrack => "NextTrack",
            Self::PrevTrack => "PrevTrack",
            Self::Pause => "Pause",
            Self::Resume => "Resume",
            Self::Stop => "Stop",
            Self::SetMusicVolume(_) => "SetMusicVolume",
            Self::SetAnnouncementVolume(_) => "SetAnnouncementVolume",
            Self::MuteToggle => "MuteToggle",
        }
    }
}

/// What a diagnostic payload designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestSource {
    /// Starts with `http`.
    Stream,
    /// No `.` anywhere: decimal MHz.
    Radio,
    /// Everything else.
    File,
}

impl TestSource {
    /// Classify a `PlayTestSource` payload.
    ///
    /// The rules are order-sensitive: `"http://a.b"` is a stream even though
    /// it contains dots, and `"101"` is a radio frequency.
    pub fn classify(payload: &str) -> Self {
        if payload.starts_with("http") {
            Self::Stream
        } else if !payload.contains('.') {
            Self::Radio
        } else {
            Self::File
        }
    }
}
