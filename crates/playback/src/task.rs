//! The audio task and its handle.
//!
//! Producers (keypad scanner, UI, serial console) hold an [`AudioHandle`]
//! and only ever enqueue commands. The processing task owns the
//! [`AudioEngine`] and runs [`AudioTask::run`]: each iteration dequeues at
//! most one command, dispatches it, performs one bounded step, flushes
//! settings and publishes a status copy for the handles to read.
//!
//! ```no_run
//! # use playback::task::AudioShared;
//! static AUDIO: AudioShared = AudioShared::new();
//!
//! fn on_play_pressed() {
//!     let _ = AUDIO.handle().retrigger();
//! }
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use platform::settings::{RetriggerMode, SettingsStore};
use platform::storage::Storage;
use platform::{DecoderDevice, NetworkClient, Tuner, VolumePercent};

use crate::command::{self, Command};
use crate::config::{LOOP_CADENCE, QUEUE_DEPTH};
use crate::engine::AudioEngine;
use crate::error::EnqueueError;
use crate::snapshot::{Mode, PlayState, PlaybackSnapshot, PlaybackType};

/// Status copy published once per loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStatus {
    /// Command filtering mode.
    pub mode: Mode,
    /// Selected source type.
    pub playback_type: PlaybackType,
    /// Execution phase.
    pub play_state: PlayState,
    /// Snapshot of the current music source.
    pub snapshot: PlaybackSnapshot,
    /// Mute flag.
    pub muted: bool,
    /// Logical music volume.
    pub music_volume: VolumePercent,
    /// Logical announcement volume.
    pub announcement_volume: VolumePercent,
    /// Retrigger policy.
    pub retrigger_mode: RetriggerMode,
}

impl AudioStatus {
    /// Status before the task has run.
    pub const fn initial() -> Self {
        Self {
            mode: Mode::Normal,
            playback_type: PlaybackType::None,
            play_state: PlayState::Idle,
            snapshot: PlaybackSnapshot::Empty,
            muted: false,
            music_volume: VolumePercent::MAX,
            announcement_volume: VolumePercent::MAX,
            retrigger_mode: RetriggerMode::ResumeOnRelease,
        }
    }
}

impl Default for AudioStatus {
    fn default() -> Self {
        Self::initial()
    }
}

/// State shared between the audio task and its handles.
///
/// Meant to live in a `static`.
pub struct AudioShared {
    commands: Channel<CriticalSectionRawMutex, Command, QUEUE_DEPTH>,
    status: Mutex<CriticalSectionRawMutex, RefCell<AudioStatus>>,
    retrigger_request: Signal<CriticalSectionRawMutex, RetriggerMode>,
}

impl AudioShared {
    /// Empty queue, initial status.
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            status: Mutex::new(RefCell::new(AudioStatus::initial())),
            retrigger_request: Signal::new(),
        }
    }

    /// A producer/status handle.
    pub fn handle(&self) -> AudioHandle<'_> {
        AudioHandle { shared: self }
    }

    /// Copy of the last published status.
    pub fn status(&self) -> AudioStatus {
        self.status.lock(|s| s.borrow().clone())
    }

    fn publish(&self, status: AudioStatus) {
        self.status.lock(|s| *s.borrow_mut() = status);
    }
}

impl Default for AudioShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking command producer and status reader.
#[derive(Clone, Copy)]
pub struct AudioHandle<'a> {
    shared: &'a AudioShared,
}

impl AudioHandle<'_> {
    /// Queue a command without waiting.
    ///
    /// # Errors
    ///
    /// [`EnqueueError::QueueFull`] when the queue is full; the command is
    /// dropped.
    pub fn enqueue(&self, cmd: Command) -> Result<(), EnqueueError> {
        self.shared.commands.try_send(cmd).map_err(|_| {
            warn!("audio queue full, command dropped");
            EnqueueError::QueueFull
        })
    }

    /// Play a file.
    pub fn play_file(&self, path: &str) -> Result<(), EnqueueError> {
        self.enqueue(Command::PlayFile(command::text(path)?))
    }

    /// Play an HTTP stream.
    pub fn play_stream(&self, url: &str) -> Result<(), EnqueueError> {
        self.enqueue(Command::PlayStream(command::text(url)?))
    }

    /// Tune the radio (decimal MHz text).
    pub fn play_radio(&self, mhz: &str) -> Result<(), EnqueueError> {
        self.enqueue(Command::PlayRadio(command::text(mhz)?))
    }

    /// Interrupt with an announcement.
    pub fn play_announcement(&self, path: &str) -> Result<(), EnqueueError> {
        self.enqueue(Command::PlayAnnouncement(command::text(path)?))
    }

    /// Enter the diagnostic mode.
    pub fn start_test(&self) -> Result<(), EnqueueError> {
        self.enqueue(Command::StartTest)
    }

    /// Play a diagnostic source.
    pub fn play_test_source(&self, payload: &str) -> Result<(), EnqueueError> {
        self.enqueue(Command::PlayTestSource(command::text(payload)?))
    }

    /// Leave the diagnostic mode.
    pub fn stop_test(&self) -> Result<(), EnqueueError> {
        self.enqueue(Command::StopTest)
    }

    /// Next playlist entry.
    pub fn next_track(&self) -> Result<(), EnqueueError> {
        self.enqueue(Command::NextTrack)
    }

    /// Previous playlist entry.
    pub fn prev_track(&self) -> Result<(), EnqueueError> {
        self.enqueue(Command::PrevTrack)
    }

    /// Pause file playback.
    pub fn pause(&self) -> Result<(), EnqueueError> {
        self.enqueue(Command::Pause)
    }

    /// Resume the paused file.
    pub fn resume(&self) -> Result<(), EnqueueError> {
        self.enqueue(Command::Resume)
    }

    /// Stop everything.
    pub fn stop(&self) -> Result<(), EnqueueError> {
        self.enqueue(Command::Stop)
    }

    /// Music volume, 0–100.
    pub fn set_music_volume(&self, volume: u8) -> Result<(), EnqueueError> {
        self.enqueue(Command::SetMusicVolume(u32::from(volume)))
    }

    /// Announcement volume, 0–100.
    pub fn set_announcement_volume(&self, volume: u8) -> Result<(), EnqueueError> {
        self.enqueue(Command::SetAnnouncementVolume(u32::from(volume)))
    }

    /// Toggle mute.
    pub fn toggle_mute(&self) -> Result<(), EnqueueError> {
        self.enqueue(Command::MuteToggle)
    }

    /// Handle an external "play" stimulus during file playback.
    ///
    /// Queues Resume or NextTrack according to the retrigger mode and returns
    /// `Ok(true)`; returns `Ok(false)` without queueing when no file is
    /// selected.
    pub fn retrigger(&self) -> Result<bool, EnqueueError> {
        let status = self.shared.status();
        if !matches!(status.snapshot, PlaybackSnapshot::File { .. }) {
            return Ok(false);
        }
        let cmd = match status.retrigger_mode {
            RetriggerMode::ResumeOnRelease => Command::Resume,
            RetriggerMode::NextTrackOnRelease => Command::NextTrack,
        };
        self.enqueue(cmd).map(|()| true)
    }

    /// Change the retrigger policy. Visible immediately; persisted by the
    /// audio task on its next iteration.
    pub fn set_retrigger_mode(&self, mode: RetriggerMode) {
        self.shared
            .status
            .lock(|s| s.borrow_mut().retrigger_mode = mode);
        self.shared.retrigger_request.signal(mode);
    }

    /// Retrigger policy.
    pub fn retrigger_mode(&self) -> RetriggerMode {
        self.shared.status.lock(|s| s.borrow().retrigger_mode)
    }

    /// Command filtering mode.
    pub fn mode(&self) -> Mode {
        self.shared.status.lock(|s| s.borrow().mode)
    }

    /// Selected source type.
    pub fn playback_type(&self) -> PlaybackType {
        self.shared.status.lock(|s| s.borrow().playback_type)
    }

    /// Execution phase.
    pub fn play_state(&self) -> PlayState {
        self.shared.status.lock(|s| s.borrow().play_state)
    }

    /// Snapshot of the current music source.
    pub fn current_state(&self) -> PlaybackSnapshot {
        self.shared.status.lock(|s| s.borrow().snapshot.clone())
    }

    /// Whether output is muted.
    pub fn is_muted(&self) -> bool {
        self.shared.status.lock(|s| s.borrow().muted)
    }
}

/// The processing loop around an [`AudioEngine`].
pub struct AudioTask<'a, D, T, S: Storage, N, C> {
    engine: AudioEngine<D, T, S, N, C>,
    shared: &'a AudioShared,
}

impl<'a, D, T, S, N, C> AudioTask<'a, D, T, S, N, C>
where
    D: DecoderDevice,
    T: Tuner,
    S: Storage,
    N: NetworkClient,
    C: SettingsStore,
{
    /// Bind an engine to the shared queue/status. Publishes the engine's
    /// initial status so handles see loaded settings right away.
    pub fn new(engine: AudioEngine<D, T, S, N, C>, shared: &'a AudioShared) -> Self {
        let task = Self { engine, shared };
        task.publish();
        task
    }

    /// The engine.
    pub fn engine(&self) -> &AudioEngine<D, T, S, N, C> {
        &self.engine
    }

    /// Mutable access to the engine.
    pub fn engine_mut(&mut self) -> &mut AudioEngine<D, T, S, N, C> {
        &mut self.engine
    }

    /// One loop iteration: at most one command, exactly one step.
    pub async fn run_once(&mut self) {
        if let Some(mode) = self.shared.retrigger_request.try_take() {
            self.engine.set_retrigger_mode(mode);
        }
        if let Ok(cmd) = self.shared.commands.try_receive() {
            self.engine.dispatch(cmd).await;
        }
        self.engine.step().await;
        self.engine.flush_settings().await;
        self.publish();
    }

    /// Start the engine and loop forever at the configured cadence.
    pub async fn run(&mut self) -> ! {
        info!(
            "{} {} audio task started",
            platform::config::APP_NAME,
            platform::config::APP_VERSION
        );
        self.engine.begin().await;
        self.publish();
        loop {
            self.run_once().await;
            Timer::after(LOOP_CADENCE).await;
        }
    }

    fn publish(&self) {
        let e = &self.engine;
        self.shared.publish(AudioStatus {
            mode: e.mode(),
            playback_type: e.playback_type(),
            play_state: e.play_state(),
            snapshot: e.current_state().clone(),
            muted: e.is_muted(),
            music_volume: e.music_volume(),
            announcement_volume: e.announcement_volume(),
            retrigger_mode: e.retrigger_mode(),
        });
    }
}
