//! Command dispatcher.
//!
//! Applies one [`Command`] to the engine. Nothing here fails outward: a
//! command that cannot take effect is logged and leaves the machine Idle
//! (or untouched, for commands that are merely not applicable).

use platform::settings::SettingsStore;
use platform::storage::Storage;
use platform::{DecoderDevice, NetworkClient, Tuner, VolumePercent};

use crate::command::{Command, TestSource, Text};
use crate::engine::{AudioEngine, Source};
use crate::error::PlaybackError;
use crate::snapshot::{Mode, PlayState, PlaybackSnapshot, PlaybackType};

/// Parse a radio payload.
///
/// Decimal MHz (`"101.1"`, `"98"`) is the normal form. Diagnostic payloads
/// cannot contain a dot, so a value of 1000 or more is read as hundredths of
/// a MHz (`"10110"` → 101.10 MHz).
pub fn parse_radio_payload(text: &str) -> Result<f32, PlaybackError> {
    let value: f32 = text
        .trim()
        .parse()
        .map_err(|_| PlaybackError::InvalidFrequency)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(PlaybackError::InvalidFrequency);
    }
    Ok(if value >= 1000.0 { value / 100.0 } else { value })
}

impl<D, T, S, N, C> AudioEngine<D, T, S, N, C>
where
    D: DecoderDevice,
    T: Tuner,
    S: Storage,
    N: NetworkClient,
    C: SettingsStore,
{
    /// Apply one command.
    pub async fn dispatch(&mut self, cmd: Command) {
        if self.mode == Mode::Test && !cmd.allowed_in_test() {
            debug!("test mode: ignoring {}", cmd.as_str());
            return;
        }
        debug!("dispatch {}", cmd.as_str());

        match cmd {
            Command::PlayFile(path) => self.begin_playback(Source::File { path, offset: 0 }),
            Command::PlayStream(url) => self.begin_playback(Source::Stream { url }),
            Command::PlayRadio(text) => self.play_radio(&text),
            Command::PlayAnnouncement(path) => self.play_announcement(path),
            Command::StartTest => self.start_test(),
            Command::PlayTestSource(text) => self.play_test_source(text),
            Command::StopTest => self.stop_test().await,
            Command::NextTrack => self.skip(true),
            Command::PrevTrack => self.skip(false),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Stop => self.stop().await,
            Command::SetMusicVolume(v) => {
                self.set_music_volume(VolumePercent::saturating_from_u32(v)).await;
            }
            Command::SetAnnouncementVolume(v) => {
                self.set_announcement_volume(VolumePercent::saturating_from_u32(v))
                    .await;
            }
            Command::MuteToggle => self.toggle_mute().await,
        }
    }

    fn play_radio(&mut self, text: &str) {
        match parse_radio_payload(text) {
            Ok(frequency_mhz) => self.begin_playback(Source::Radio { frequency_mhz }),
            Err(e) => {
                warn!("radio payload {}: {}", text, e.as_str());
                self.state = PlayState::Idle;
            }
        }
    }

    fn play_announcement(&mut self, path: Text) {
        // An announcement replacing another keeps the original restore point.
        // A source queued but not yet opened is what resumes afterwards.
        match (&self.state, &self.next) {
            (PlayState::AnnouncementInit | PlayState::AnnouncementPlay, _) => {}
            (PlayState::PlaybackInit, Some(pending)) => {
                self.pre_announcement = pending.to_snapshot();
            }
            _ => self.pre_announcement = self.snapshot.clone(),
        }
        self.announcement = path;
        self.next = None;
        self.state = PlayState::AnnouncementInit;
    }

    /// Remember what was playing and switch the filter. The current source
    /// keeps running until a test source replaces it.
    fn start_test(&mut self) {
        if self.mode == Mode::Test {
            debug!("already in test mode");
            return;
        }
        info!("entering test mode");
        self.pre_test = self.snapshot.clone();
        self.mode = Mode::Test;
    }

    fn play_test_source(&mut self, text: Text) {
        match TestSource::classify(text.as_str()) {
            TestSource::Stream => self.begin_playback(Source::Stream { url: text }),
            TestSource::Radio => self.play_radio(&text),
            TestSource::File => self.begin_playback(Source::File {
                path: text,
                offset: 0,
            }),
        }
    }

    async fn stop_test(&mut self) {
        if self.mode != Mode::Test {
            debug!("not in test mode");
            return;
        }
        info!("leaving test mode");
        self.halt().await;
        self.mode = Mode::Normal;
        let previous = core::mem::take(&mut self.pre_test);
        self.restore(previous);
    }

    fn skip(&mut self, forward: bool) {
        if self.playback_type != PlaybackType::File {
            debug!("skip ignored for {}", self.playback_type.as_str());
            return;
        }
        let current = self.snapshot.file_path();
        let target = if forward {
            self.playlist.successor_of(current)
        } else {
            self.playlist.predecessor_of(current)
        };
        match target {
            Some(path) => self.begin_playback(Source::File { path, offset: 0 }),
            None => warn!("skip: {}", PlaybackError::EmptyPlaylist.as_str()),
        }
    }

    fn pause(&mut self) {
        if self.state == PlayState::PlaybackPlay && self.playback_type == PlaybackType::File {
            info!("paused at {}", self.snapshot.file_position());
            self.state = PlayState::Idle;
        }
    }

    fn resume(&mut self) {
        if let PlaybackSnapshot::File { path, position } = &self.snapshot {
            let source = Source::File {
                path: path.clone(),
                offset: *position,
            };
            self.begin_playback(source);
        } else {
            debug!("nothing to resume");
        }
    }

    async fn stop(&mut self) {
        info!("stop");
        self.halt().await;
        self.snapshot = PlaybackSnapshot::Empty;
        self.pre_announcement = PlaybackSnapshot::Empty;
        self.playback_type = PlaybackType::None;
    }

    async fn set_music_volume(&mut self, volume: VolumePercent) {
        self.volume.set_music(volume);
        self.persist_volumes();
        let announcing = matches!(
            self.state,
            PlayState::AnnouncementInit | PlayState::AnnouncementPlay
        );
        if !self.volume.is_muted() && !announcing {
            self.apply_volume(self.volume.music_native()).await;
        }
    }

    async fn set_announcement_volume(&mut self, volume: VolumePercent) {
        self.volume.set_announcement(volume);
        self.persist_volumes();
        if !self.volume.is_muted() && self.state == PlayState::AnnouncementPlay {
            self.apply_volume(self.volume.announcement_native()).await;
        }
    }

    async fn toggle_mute(&mut self) {
        let mut native = self.volume.toggle_mute();
        if !self.volume.is_muted() && self.state == PlayState::AnnouncementPlay {
            native = self.volume.announcement_native();
        }
        info!("mute {}", if self.volume.is_muted() { "on" } else { "off" });
        self.apply_volume(native).await;
    }

    async fn apply_volume(&mut self, native: platform::NativeVolume) {
        if self.io.decoder.set_volume(native).await.is_err() {
            warn!("decoder volume write failed");
        }
    }
}
