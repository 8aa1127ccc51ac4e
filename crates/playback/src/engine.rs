//! Playback state machine.
//!
//! `AudioEngine` owns every collaborator, the single active source handle and
//! the snapshots needed to come back to an interrupted source. It is driven
//! from one task: [`dispatch`](AudioEngine::dispatch) applies a command,
//! [`step`](AudioEngine::step) performs one bounded unit of work. Neither
//! ever waits on the decoder; the only bounded wait is a stream connect.
//!
//! ```text
//!            play/resume/next/prev              announcement
//!   Idle ───────────────────────▶ PlaybackInit      Idle ─────▶ AnnouncementInit
//!    ▲                               │ open ok                       │ open ok
//!    │ open failed / end (non-file)  ▼                               ▼
//!    └──────────────────────── PlaybackPlay              AnnouncementPlay
//!                                    │ end of file (Normal)          │ end
//!                                    └──▶ PlaybackInit (successor)   └──▶ Idle + restore
//! ```

use embedded_io_async::{Read, Seek, SeekFrom};
use platform::settings::{RetriggerMode, SavedSource, Settings, SettingsStore, EQ_PRESET_COUNT};
use platform::storage::{Storage, StorageVolume};
use platform::{DecoderDevice, FmFrequency, NetworkClient, ToneControl, Tuner, VolumePercent};

use crate::command::Text;
use crate::config::{EngineConfig, CHUNK_SIZE, PLAYLIST_ROOT};
use crate::error::PlaybackError;
use crate::format::{self, AudioFormat, Strictness};
use crate::playlist::Playlist;
use crate::snapshot::{Mode, PlayState, PlaybackSnapshot, PlaybackType};
use crate::stream::StreamSession;
use crate::volume::VolumeState;

/// Result of one step of the active source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The source has more to give (or is waiting on the decoder/network).
    Active,
    /// The source is exhausted or broke; it has been closed.
    Finished,
}

/// The collaborators the engine drives.
#[derive(Debug)]
pub struct Peripherals<D, T, S, N, C> {
    /// Decoder IC.
    pub decoder: D,
    /// FM tuner.
    pub tuner: T,
    /// Card and flash volumes.
    pub storage: S,
    /// Stream socket.
    pub network: N,
    /// EEPROM settings page.
    pub settings: C,
}

/// What the next `PlaybackInit` step opens.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Source {
    File { path: Text, offset: u32 },
    Stream { url: Text },
    Radio { frequency_mhz: f32 },
}

impl Source {
    fn playback_type(&self) -> PlaybackType {
        match self {
            Self::File { .. } => PlaybackType::File,
            Self::Stream { .. } => PlaybackType::Stream,
            Self::Radio { .. } => PlaybackType::Radio,
        }
    }

    /// The snapshot that reopens this source where it would start.
    pub(crate) fn to_snapshot(&self) -> PlaybackSnapshot {
        match self {
            Self::File { path, offset } => PlaybackSnapshot::File {
                path: path.clone(),
                position: *offset,
            },
            Self::Stream { url } => PlaybackSnapshot::Stream { url: url.clone() },
            Self::Radio { frequency_mhz } => PlaybackSnapshot::Radio {
                frequency_mhz: *frequency_mhz,
            },
        }
    }

    fn from_snapshot(snapshot: &PlaybackSnapshot) -> Option<Self> {
        match snapshot {
            PlaybackSnapshot::Empty => None,
            PlaybackSnapshot::File { path, position } => Some(Self::File {
                path: path.clone(),
                offset: *position,
            }),
            PlaybackSnapshot::Stream { url } => Some(Self::Stream { url: url.clone() }),
            PlaybackSnapshot::Radio { frequency_mhz } => Some(Self::Radio {
                frequency_mhz: *frequency_mhz,
            }),
        }
    }
}

/// The open source. At most one exists at any time.
enum ActiveSource<F> {
    None,
    File { file: F, format: AudioFormat },
    Stream(StreamSession),
    Radio,
}

/// Outcome of feeding one file chunk.
enum Feed {
    /// Decoder FIFO full; nothing read.
    Waiting,
    /// `n` bytes pushed.
    Fed(usize),
    /// End of file.
    Eof,
}

/// The playback orchestrator.
pub struct AudioEngine<D, T, S: Storage, N, C> {
    pub(crate) io: Peripherals<D, T, S, N, C>,
    pub(crate) config: EngineConfig,
    pub(crate) mode: Mode,
    pub(crate) playback_type: PlaybackType,
    pub(crate) state: PlayState,
    pub(crate) snapshot: PlaybackSnapshot,
    pub(crate) pre_announcement: PlaybackSnapshot,
    pub(crate) pre_test: PlaybackSnapshot,
    pub(crate) next: Option<Source>,
    pub(crate) announcement: Text,
    pub(crate) playlist: Playlist,
    pub(crate) volume: VolumeState,
    pub(crate) settings: Settings,
    pub(crate) settings_dirty: bool,
    active: ActiveSource<S::File>,
}

impl<D, T, S, N, C> AudioEngine<D, T, S, N, C>
where
    D: DecoderDevice,
    T: Tuner,
    S: Storage,
    N: NetworkClient,
    C: SettingsStore,
{
    /// Build an engine, loading volumes and the retrigger mode from the
    /// settings store (defaults if it cannot be read).
    pub async fn new(mut io: Peripherals<D, T, S, N, C>, config: EngineConfig) -> Self {
        let settings = match io.settings.load().await {
            Ok(s) => s.validated(),
            Err(_) => {
                warn!("settings load failed, using defaults");
                Settings::default()
            }
        };
        info!(
            "audio engine: music {} announcement {} retrigger {}",
            settings.music_volume.get(),
            settings.announcement_volume.get(),
            settings.retrigger_mode.as_str()
        );
        Self {
            io,
            config,
            mode: Mode::Normal,
            playback_type: PlaybackType::None,
            state: PlayState::Idle,
            snapshot: PlaybackSnapshot::Empty,
            pre_announcement: PlaybackSnapshot::Empty,
            pre_test: PlaybackSnapshot::Empty,
            next: None,
            announcement: Text::new(),
            playlist: Playlist::new(),
            volume: VolumeState::new(settings.music_volume, settings.announcement_volume),
            settings,
            settings_dirty: false,
            active: ActiveSource::None,
        }
    }

    /// Startup: apply the music volume and equalizer preset, scan the card
    /// for the playlist and queue the source that was playing at power-down.
    pub async fn begin(&mut self) {
        if self.io.decoder.set_volume(self.volume.music_native()).await.is_err() {
            warn!("begin: decoder volume write failed");
        }
        self.apply_tone().await;
        self.rescan().await;
        self.restore_saved_source();
    }

    /// Select an equalizer preset; unknown indices select Flat (0).
    pub async fn set_eq_preset(&mut self, preset: u8) {
        let preset = if preset < EQ_PRESET_COUNT { preset } else { 0 };
        if self.settings.eq_preset != preset {
            self.settings.eq_preset = preset;
            self.settings_dirty = true;
        }
        self.apply_tone().await;
    }

    async fn apply_tone(&mut self) {
        let preset = self.settings.eq_preset;
        if self.io.decoder.set_tone(ToneControl::preset(preset)).await.is_err() {
            warn!("eq preset {}: decoder tone write failed", preset);
        } else {
            debug!("eq preset {}", preset);
        }
    }

    fn restore_saved_source(&mut self) {
        if self.state != PlayState::Idle {
            return;
        }
        let saved = self.settings.last_source;
        let source = match saved {
            SavedSource::None => None,
            SavedSource::Radio => Some(Source::Radio {
                frequency_mhz: self.settings.last_frequency.mhz(),
            }),
            SavedSource::Stream => Text::try_from(self.settings.last_stream_url.as_str())
                .ok()
                .filter(|url| !url.is_empty())
                .map(|url| Source::Stream { url }),
            SavedSource::File => Text::try_from(self.settings.last_file.as_str())
                .ok()
                .filter(|path| !path.is_empty())
                .map(|path| Source::File { path, offset: 0 }),
        };
        match source {
            Some(source) => {
                info!("restoring saved {}", saved.as_str());
                self.begin_playback(source);
            }
            None => debug!("no saved source"),
        }
    }

    /// Rebuild the playlist from the card root.
    pub async fn rescan(&mut self) {
        if self.playlist.scan(&mut self.io.storage, PLAYLIST_ROOT).await.is_err() {
            warn!("playlist scan failed");
        }
    }

    // ── status ───────────────────────────────────────────────────────────

    /// Command filtering mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Selected source type.
    pub fn playback_type(&self) -> PlaybackType {
        self.playback_type
    }

    /// Execution phase.
    pub fn play_state(&self) -> PlayState {
        self.state
    }

    /// Snapshot of the current music source.
    pub fn current_state(&self) -> &PlaybackSnapshot {
        &self.snapshot
    }

    /// Whether output is muted.
    pub fn is_muted(&self) -> bool {
        self.volume.is_muted()
    }

    /// Logical music volume.
    pub fn music_volume(&self) -> VolumePercent {
        self.volume.music()
    }

    /// Logical announcement volume.
    pub fn announcement_volume(&self) -> VolumePercent {
        self.volume.announcement()
    }

    /// Retrigger policy.
    pub fn retrigger_mode(&self) -> RetriggerMode {
        self.settings.retrigger_mode
    }

    /// Change the retrigger policy; persisted on the next settings flush.
    pub fn set_retrigger_mode(&mut self, mode: RetriggerMode) {
        if self.settings.retrigger_mode != mode {
            info!("retrigger mode: {}", mode.as_str());
            self.settings.retrigger_mode = mode;
            self.settings_dirty = true;
        }
    }

    /// Engine copy of the persisted settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The playlist.
    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Replace the playlist (bypassing the card scan).
    pub fn set_playlist(&mut self, playlist: Playlist) {
        self.playlist = playlist;
    }

    /// The collaborators.
    pub fn peripherals(&self) -> &Peripherals<D, T, S, N, C> {
        &self.io
    }

    /// Mutable access to the collaborators (tests, shared-bus users).
    pub fn peripherals_mut(&mut self) -> &mut Peripherals<D, T, S, N, C> {
        &mut self.io
    }

    /// Whether a source handle (file, socket or tuner route) is open.
    pub fn has_open_source(&self) -> bool {
        !matches!(self.active, ActiveSource::None)
    }

    /// Format of the open file, if any.
    pub fn active_format(&self) -> Option<AudioFormat> {
        match &self.active {
            ActiveSource::File { format, .. } => Some(*format),
            _ => None,
        }
    }

    // ── settings ─────────────────────────────────────────────────────────

    /// Store the logical volumes in the settings copy.
    pub(crate) fn persist_volumes(&mut self) {
        self.settings.music_volume = self.volume.music();
        self.settings.announcement_volume = self.volume.announcement();
        self.settings_dirty = true;
    }

    /// Write the settings record if anything changed since the last flush.
    ///
    /// A failed write is logged and not retried until the next change.
    pub async fn flush_settings(&mut self) {
        if !self.settings_dirty {
            return;
        }
        self.settings_dirty = false;
        match self.io.settings.persist(&self.settings).await {
            Ok(()) => debug!("settings persisted"),
            Err(_) => warn!("settings persist failed"),
        }
    }

    fn remember_source(&mut self) {
        if self.mode == Mode::Test {
            return;
        }
        match &self.snapshot {
            PlaybackSnapshot::File { path, .. } => self.settings.remember_file(path.as_str()),
            PlaybackSnapshot::Stream { url } => self.settings.remember_stream(url.as_str()),
            PlaybackSnapshot::Radio { frequency_mhz } => {
                if let Ok(f) = FmFrequency::from_mhz(*frequency_mhz) {
                    self.settings.remember_frequency(f);
                }
            }
            PlaybackSnapshot::Empty => return,
        }
        self.settings_dirty = true;
    }

    // ── transitions ──────────────────────────────────────────────────────

    /// Queue `source` for the next `PlaybackInit` step.
    pub(crate) fn begin_playback(&mut self, source: Source) {
        if matches!(
            self.state,
            PlayState::AnnouncementInit | PlayState::AnnouncementPlay
        ) {
            debug!("announcement superseded, dropping its restore point");
            self.pre_announcement = PlaybackSnapshot::Empty;
        }
        self.playback_type = source.playback_type();
        self.next = Some(source);
        self.state = PlayState::PlaybackInit;
    }

    /// Re-enter `PlaybackInit` from a saved snapshot, or go Idle if it is
    /// empty.
    pub(crate) fn restore(&mut self, snapshot: PlaybackSnapshot) {
        match Source::from_snapshot(&snapshot) {
            Some(source) => {
                info!("restoring {}", snapshot.playback_type().as_str());
                self.snapshot = snapshot;
                self.begin_playback(source);
            }
            None => {
                self.snapshot = PlaybackSnapshot::Empty;
                self.playback_type = PlaybackType::None;
                self.state = PlayState::Idle;
            }
        }
    }

    /// Hard-stop the decoder and close the active source.
    pub(crate) async fn halt(&mut self) {
        if self.io.decoder.stop().await.is_err() {
            warn!("decoder stop failed");
        }
        self.close_active().await;
        self.next = None;
        self.state = PlayState::Idle;
    }

    async fn close_active(&mut self) {
        match core::mem::replace(&mut self.active, ActiveSource::None) {
            ActiveSource::None | ActiveSource::File { .. } => {}
            ActiveSource::Stream(_) => self.io.network.close(),
            ActiveSource::Radio => {
                if self.io.decoder.set_analog_passthrough(false).await.is_err() {
                    warn!("decoder passthrough off failed");
                }
            }
        }
    }

    // ── step ─────────────────────────────────────────────────────────────

    /// Perform one bounded unit of work for the current state.
    pub async fn step(&mut self) {
        match self.state {
            PlayState::Idle => {}
            PlayState::PlaybackInit => self.init_playback().await,
            PlayState::PlaybackPlay => {
                if self.step_source().await == StepOutcome::Finished {
                    self.on_playback_finished();
                }
            }
            PlayState::AnnouncementInit => self.init_announcement().await,
            PlayState::AnnouncementPlay => {
                if self.step_source().await == StepOutcome::Finished {
                    self.on_announcement_finished();
                }
            }
        }
    }

    async fn init_playback(&mut self) {
        let Some(source) = self.next.take() else {
            self.state = PlayState::Idle;
            return;
        };
        let kind = source.playback_type();
        match self.open_source(source).await {
            Ok(()) => {
                info!(
                    "playing {} ({})",
                    kind.as_str(),
                    self.active_format().map_or("-", AudioFormat::as_str)
                );
                self.playback_type = kind;
                self.state = PlayState::PlaybackPlay;
                self.remember_source();
            }
            Err(e) => {
                warn!("cannot start {}: {}", kind.as_str(), e.as_str());
                self.playback_type = if self.mode == Mode::Test && self.snapshot.is_empty() {
                    PlaybackType::Test
                } else {
                    self.snapshot.playback_type()
                };
                self.state = PlayState::Idle;
            }
        }
    }

    /// Close the previous handle, reset the decoder and open `source`.
    async fn open_source(&mut self, source: Source) -> Result<(), PlaybackError> {
        self.close_active().await;
        self.io.decoder.soft_reset().await.map_err(|_| PlaybackError::Decoder)?;
        self.io
            .decoder
            .set_analog_passthrough(false)
            .await
            .map_err(|_| PlaybackError::Decoder)?;
        self.io
            .decoder
            .set_volume(self.volume.music_native())
            .await
            .map_err(|_| PlaybackError::Decoder)?;

        match source {
            Source::File { path, offset } => {
                let (mut file, format) = self.open_file(path.as_str()).await?;
                let start = format::resume_offset(format, offset);
                if start != 0 {
                    file.seek(SeekFrom::Start(u64::from(start)))
                        .await
                        .map_err(|_| PlaybackError::FileIo)?;
                    debug!("resume {} at {} (saved {})", path.as_str(), start, offset);
                }
                self.snapshot = PlaybackSnapshot::File {
                    path,
                    position: start,
                };
                self.active = ActiveSource::File { file, format };
            }
            Source::Stream { url } => {
                let session = StreamSession::new(url.as_str(), self.config.stream_timeout)?;
                self.snapshot = PlaybackSnapshot::Stream { url };
                self.active = ActiveSource::Stream(session);
            }
            Source::Radio { frequency_mhz } => {
                let frequency = FmFrequency::from_mhz(frequency_mhz)
                    .map_err(|_| PlaybackError::InvalidFrequency)?;
                self.io
                    .tuner
                    .tune(frequency)
                    .await
                    .map_err(|_| PlaybackError::Tuner)?;
                self.io
                    .decoder
                    .set_analog_passthrough(true)
                    .await
                    .map_err(|_| PlaybackError::Decoder)?;
                self.snapshot = PlaybackSnapshot::Radio {
                    frequency_mhz: frequency.mhz(),
                };
                self.active = ActiveSource::Radio;
            }
        }
        Ok(())
    }

    /// Open a board path on the volume it names and sniff its format.
    async fn open_file(&mut self, path: &str) -> Result<(S::File, AudioFormat), PlaybackError> {
        let (volume, inner) = StorageVolume::resolve(path);
        let mut file = self
            .io
            .storage
            .open(volume, inner)
            .await
            .map_err(|_| PlaybackError::OpenFailed)?;
        let format = format::sniff(&mut file, Strictness::Strict)
            .await
            .map_err(|_| PlaybackError::FileIo)?;
        trace!("opened {} on {}", inner, volume.as_str());
        Ok((file, format))
    }

    async fn init_announcement(&mut self) {
        self.close_active().await;
        let path = self.announcement.clone();
        match self.open_announcement(path.as_str()).await {
            Ok(()) => {
                info!("announcement {}", path.as_str());
                self.playback_type = PlaybackType::Announcement;
                self.state = PlayState::AnnouncementPlay;
            }
            Err(e) => {
                warn!(
                    "announcement {} abandoned ({}); previous source needs a manual resume",
                    path.as_str(),
                    e.as_str()
                );
                self.pre_announcement = PlaybackSnapshot::Empty;
                self.playback_type = self.snapshot.playback_type();
                self.state = PlayState::Idle;
            }
        }
    }

    async fn open_announcement(&mut self, path: &str) -> Result<(), PlaybackError> {
        self.io.decoder.soft_reset().await.map_err(|_| PlaybackError::Decoder)?;
        self.io
            .decoder
            .set_analog_passthrough(false)
            .await
            .map_err(|_| PlaybackError::Decoder)?;
        self.io
            .decoder
            .set_volume(self.volume.announcement_native())
            .await
            .map_err(|_| PlaybackError::Decoder)?;
        let (file, format) = self.open_file(path).await?;
        self.active = ActiveSource::File { file, format };
        Ok(())
    }

    async fn step_source(&mut self) -> StepOutcome {
        let outcome = match &mut self.active {
            ActiveSource::None => StepOutcome::Finished,
            ActiveSource::Radio => StepOutcome::Active,
            ActiveSource::Stream(session) => {
                session.step(&mut self.io.network, &mut self.io.decoder).await
            }
            ActiveSource::File { file, .. } => match feed_file(file, &mut self.io.decoder).await {
                Ok(Feed::Waiting) => StepOutcome::Active,
                Ok(Feed::Fed(n)) => {
                    if self.state == PlayState::PlaybackPlay {
                        if let PlaybackSnapshot::File { position, .. } = &mut self.snapshot {
                            *position = position.saturating_add(u32::try_from(n).unwrap_or(0));
                        }
                    }
                    StepOutcome::Active
                }
                Ok(Feed::Eof) => StepOutcome::Finished,
                Err(e) => {
                    warn!("file feed: {}", e.as_str());
                    StepOutcome::Finished
                }
            },
        };
        if outcome == StepOutcome::Finished {
            // Drops the file handle. A finished session already closed its socket.
            self.active = ActiveSource::None;
        }
        outcome
    }

    fn on_playback_finished(&mut self) {
        self.state = PlayState::Idle;
        if self.mode == Mode::Normal && self.playback_type == PlaybackType::File {
            let finished = self.snapshot.file_path();
            match self.playlist.successor_of(finished) {
                Some(path) => {
                    info!("auto-advance to {}", path.as_str());
                    self.begin_playback(Source::File { path, offset: 0 });
                }
                None => debug!("end of file, playlist empty"),
            }
        } else {
            info!("{} finished", self.playback_type.as_str());
        }
    }

    fn on_announcement_finished(&mut self) {
        info!("announcement finished");
        self.state = PlayState::Idle;
        self.playback_type = PlaybackType::None;
        let previous = core::mem::take(&mut self.pre_announcement);
        self.restore(previous);
    }
}

/// Push one chunk from `file` if the decoder can take it.
async fn feed_file<F, D>(file: &mut F, decoder: &mut D) -> Result<Feed, PlaybackError>
where
    F: Read,
    D: DecoderDevice,
{
    if !decoder.ready_for_data() {
        return Ok(Feed::Waiting);
    }
    let mut chunk = [0u8; CHUNK_SIZE];
    let n = file.read(&mut chunk).await.map_err(|_| PlaybackError::FileIo)?;
    let Some(data) = chunk.get(..n).filter(|d| !d.is_empty()) else {
        return Ok(Feed::Eof);
    };
    decoder.write_chunk(data).await.map_err(|_| PlaybackError::Decoder)?;
    trace!("fed {} bytes", n);
    Ok(Feed::Fed(n))
}
