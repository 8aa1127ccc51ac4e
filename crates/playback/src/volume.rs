//! Volume and mute bookkeeping for the decoder IC.
//!
//! The decoder uses an 8-bit attenuation value where:
//! - `0x00` = no attenuation (maximum loudness)
//! - `0xFF` = maximum attenuation (effectively muted)
//!
//! Two logical channels exist: music (files, streams, radio) and
//! announcements. Only one plays at a time, so the hardware only ever holds
//! the value of the active channel.

use platform::audio_types::{NativeVolume, VolumePercent};

/// Map a [`VolumePercent`] to the decoder's [`NativeVolume`].
///
/// # Encoding
///
/// ```text
/// native = round((100 - volume_percent) * 255 / 100)
/// ```
///
/// | `volume` | Native | Effect              |
/// |----------|--------|---------------------|
/// | 0%       | 255    | Max atten. (silent) |
/// | 50%      | 128    | ~half loudness      |
/// | 100%     | 0      | Full volume         |
pub fn to_native(volume: VolumePercent) -> NativeVolume {
    NativeVolume::from_volume(volume)
}

/// Logical volumes, mute flag and the backups taken when muting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeState {
    music: VolumePercent,
    announcement: VolumePercent,
    muted: bool,
    backup_music: VolumePercent,
    backup_announcement: VolumePercent,
}

impl VolumeState {
    /// Unmuted state with the given channel volumes.
    pub fn new(music: VolumePercent, announcement: VolumePercent) -> Self {
        Self {
            music,
            announcement,
            muted: false,
            backup_music: music,
            backup_announcement: announcement,
        }
    }

    /// Logical music volume.
    pub fn music(&self) -> VolumePercent {
        self.music
    }

    /// Logical announcement volume.
    pub fn announcement(&self) -> VolumePercent {
        self.announcement
    }

    /// Whether output is muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Native value for the music channel (silent while muted).
    pub fn music_native(&self) -> NativeVolume {
        if self.muted {
            NativeVolume::SILENT
        } else {
            to_native(self.music)
        }
    }

    /// Native value for the announcement channel (silent while muted).
    pub fn announcement_native(&self) -> NativeVolume {
        if self.muted {
            NativeVolume::SILENT
        } else {
            to_native(self.announcement)
        }
    }

    /// Set the music volume.
    ///
    /// While muted the backup follows, so the next unmute applies the new
    /// value rather than the one captured at mute time.
    pub fn set_music(&mut self, volume: VolumePercent) {
        self.music = volume;
        if self.muted {
            self.backup_music = volume;
        }
    }

    /// Set the announcement volume (same backup rule as [`set_music`](Self::set_music)).
    pub fn set_announcement(&mut self, volume: VolumePercent) {
        self.announcement = volume;
        if self.muted {
            self.backup_announcement = volume;
        }
    }

    /// Flip the mute flag and return the native value the hardware must
    /// take: silent when muting, the restored music volume when unmuting.
    pub fn toggle_mute(&mut self) -> NativeVolume {
        if self.muted {
            self.muted = false;
            self.music = self.backup_music;
            self.announcement = self.backup_announcement;
        } else {
            self.backup_music = self.music;
            self.backup_announcement = self.announcement;
            self.muted = true;
        }
        self.music_native()
    }
}
