//! Mock implementations for testing
//!
//! This module provides in-memory implementations of all platform traits
//! for use in unit and integration tests. Every mock records what was done
//! to it so tests can assert on the observable hardware effects.

#![cfg(any(test, feature = "std"))]

use std::string::{String, ToString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::vec::Vec;

use embedded_io::{ErrorKind, ErrorType, SeekFrom};

use crate::*;

/// Error reported by mocks that were told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockFault;

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Mock decoder IC.
#[derive(Debug)]
pub struct MockDecoder {
    ready: bool,
    written: Vec<u8>,
    chunk_sizes: Vec<usize>,
    volume_writes: Vec<NativeVolume>,
    tone: Option<ToneControl>,
    soft_resets: usize,
    stops: usize,
    passthrough: bool,
    fail_writes: bool,
}

impl MockDecoder {
    /// Create a decoder that is always ready for data.
    pub fn new() -> Self {
        Self {
            ready: true,
            written: Vec::new(),
            chunk_sizes: Vec::new(),
            volume_writes: Vec::new(),
            tone: None,
            soft_resets: 0,
            stops: 0,
            passthrough: false,
            fail_writes: false,
        }
    }

    /// Drive the readiness gate (`false` = FIFO full).
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Make every subsequent `write_chunk` fail.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// All bitstream bytes written since the last [`clear_written`](Self::clear_written).
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Sizes of the individual chunks written.
    pub fn chunk_sizes(&self) -> &[usize] {
        &self.chunk_sizes
    }

    /// Forget recorded bitstream bytes.
    pub fn clear_written(&mut self) {
        self.written.clear();
        self.chunk_sizes.clear();
    }

    /// Last attenuation written, if any.
    pub fn volume(&self) -> Option<NativeVolume> {
        self.volume_writes.last().copied()
    }

    /// Every attenuation written, oldest first.
    pub fn volume_writes(&self) -> &[NativeVolume] {
        &self.volume_writes
    }

    /// Last tone setting written, if any.
    pub fn tone(&self) -> Option<ToneControl> {
        self.tone
    }

    /// Number of soft resets issued.
    pub fn soft_resets(&self) -> usize {
        self.soft_resets
    }

    /// Number of hard stops issued.
    pub fn stops(&self) -> usize {
        self.stops
    }

    /// Whether analog line passthrough is enabled.
    pub fn passthrough(&self) -> bool {
        self.passthrough
    }
}

impl Default for MockDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderDevice for MockDecoder {
    type Error = MockFault;

    fn ready_for_data(&mut self) -> bool {
        self.ready
    }

    async fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(MockFault);
        }
        self.written.extend_from_slice(bytes);
        self.chunk_sizes.push(bytes.len());
        Ok(())
    }

    async fn soft_reset(&mut self) -> Result<(), Self::Error> {
        self.soft_resets = self.soft_resets.saturating_add(1);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Self::Error> {
        self.stops = self.stops.saturating_add(1);
        Ok(())
    }

    async fn set_volume(&mut self, volume: NativeVolume) -> Result<(), Self::Error> {
        self.volume_writes.push(volume);
        Ok(())
    }

    async fn set_tone(&mut self, tone: ToneControl) -> Result<(), Self::Error> {
        self.tone = Some(tone);
        Ok(())
    }

    async fn set_analog_passthrough(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.passthrough = enabled;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tuner
// ---------------------------------------------------------------------------

/// Mock FM tuner.
#[derive(Debug, Default)]
pub struct MockTuner {
    tuned: Vec<FmFrequency>,
    fail: bool,
}

impl MockTuner {
    /// Create a working tuner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `tune` fail.
    pub fn fail(&mut self, fail: bool) {
        self.fail = fail;
    }

    /// Every frequency tuned, oldest first.
    pub fn tuned(&self) -> &[FmFrequency] {
        &self.tuned
    }
}

impl Tuner for MockTuner {
    type Error = MockFault;

    async fn tune(&mut self, frequency: FmFrequency) -> Result<(), Self::Error> {
        if self.fail {
            return Err(MockFault);
        }
        self.tuned.push(frequency);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// An in-memory file handle. Dropping it closes the file.
#[derive(Debug)]
pub struct MockFile {
    data: Arc<[u8]>,
    pos: usize,
    open_handles: Arc<AtomicUsize>,
}

impl Drop for MockFile {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ErrorType for MockFile {
    type Error = ErrorKind;
}

impl embedded_io_async::Read for MockFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let rest = self.data.get(self.pos..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), rest.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = self.pos.saturating_add(n);
        Ok(n)
    }
}

impl embedded_io_async::Seek for MockFile {
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        let len = i64::try_from(self.data.len()).map_err(|_| ErrorKind::InvalidInput)?;
        let cur = i64::try_from(self.pos).map_err(|_| ErrorKind::InvalidInput)?;
        let target = match pos {
            SeekFrom::Start(n) => i64::try_from(n).map_err(|_| ErrorKind::InvalidInput)?,
            SeekFrom::End(off) => len.saturating_add(off),
            SeekFrom::Current(off) => cur.saturating_add(off),
        };
        if target < 0 {
            return Err(ErrorKind::InvalidInput);
        }
        self.pos = usize::try_from(target).map_err(|_| ErrorKind::InvalidInput)?;
        u64::try_from(target).map_err(|_| ErrorKind::InvalidInput)
    }
}

/// Mock storage with two in-memory volumes.
///
/// Directory listings are derived from the stored paths in insertion order,
/// the way a FAT directory enumerates.
#[derive(Debug, Default)]
pub struct MockStorage {
    files: Vec<(StorageVolume, String, Arc<[u8]>)>,
    open_handles: Arc<AtomicUsize>,
    opens: Vec<(StorageVolume, String)>,
    card_missing: bool,
}

impl MockStorage {
    /// Create empty volumes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. `path` is a board path: the `/spiffs/` prefix selects
    /// the flash volume.
    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        let (volume, inner) = StorageVolume::resolve(path);
        self.files.push((volume, inner.to_string(), Arc::from(data)));
    }

    /// Builder form of [`add_file`](Self::add_file).
    #[must_use]
    pub fn with_file(mut self, path: &str, data: &[u8]) -> Self {
        self.add_file(path, data);
        self
    }

    /// Simulate a removed card: every card access fails.
    pub fn remove_card(&mut self) {
        self.card_missing = true;
    }

    /// Number of file handles currently open.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Every successful open, oldest first.
    pub fn opens(&self) -> &[(StorageVolume, String)] {
        &self.opens
    }

    fn check_volume(&self, volume: StorageVolume) -> Result<(), ErrorKind> {
        if self.card_missing && volume == StorageVolume::Removable {
            Err(ErrorKind::NotConnected)
        } else {
            Ok(())
        }
    }
}

impl Storage for MockStorage {
    type Error = ErrorKind;
    type File = MockFile;

    async fn open(&mut self, volume: StorageVolume, path: &str) -> Result<Self::File, Self::Error> {
        self.check_volume(volume)?;
        let data = self
            .files
            .iter()
            .find(|(v, p, _)| *v == volume && p == path)
            .map(|(_, _, d)| Arc::clone(d))
            .ok_or(ErrorKind::NotFound)?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        self.opens.push((volume, path.to_string()));
        Ok(MockFile {
            data,
            pos: 0,
            open_handles: Arc::clone(&self.open_handles),
        })
    }

    async fn dir_entry(
        &mut self,
        volume: StorageVolume,
        dir: &str,
        index: usize,
    ) -> Result<Option<DirEntry>, Self::Error> {
        self.check_volume(volume)?;
        let prefix = if dir.ends_with('/') {
            dir.to_string()
        } else {
            let mut p = dir.to_string();
            p.push('/');
            p
        };
        let mut seen: Vec<(&str, bool)> = Vec::new();
        for (_, rest) in self
            .files
            .iter()
            .filter(|(v, _, _)| *v == volume)
            .filter_map(|(_, p, _)| p.strip_prefix(prefix.as_str()).map(|r| (p, r)))
        {
            let (name, is_dir) = match rest.split_once('/') {
                Some((first, _)) => (first, true),
                None => (rest, false),
            };
            if !name.is_empty() && !seen.iter().any(|(n, _)| *n == name) {
                seen.push((name, is_dir));
            }
        }
        let Some((name, is_dir)) = seen.get(index).copied() else {
            return Ok(None);
        };
        let name = heapless::String::try_from(name).map_err(|_| ErrorKind::OutOfMemory)?;
        Ok(Some(DirEntry { name, is_dir }))
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Scripted TCP socket.
///
/// After `connect` the socket serves the scripted response bytes. Once they
/// are exhausted the peer either hangs up or keeps the connection idle.
#[derive(Debug, Default)]
pub struct MockNetwork {
    response: Vec<u8>,
    pos: usize,
    max_read: Option<usize>,
    connected: bool,
    refuse: bool,
    hang_connect: bool,
    hang_up_at_end: bool,
    sent: Vec<u8>,
    connects: Vec<(String, u16)>,
    closes: usize,
}

impl MockNetwork {
    /// Create a socket with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` after each successful connect.
    #[must_use]
    pub fn with_response(mut self, bytes: &[u8]) -> Self {
        self.response = bytes.to_vec();
        self
    }

    /// Close the connection from the peer side once the script is consumed.
    #[must_use]
    pub fn hang_up_at_end(mut self) -> Self {
        self.hang_up_at_end = true;
        self
    }

    /// Serve at most `n` bytes per read call.
    #[must_use]
    pub fn max_read(mut self, n: usize) -> Self {
        self.max_read = Some(n);
        self
    }

    /// Refuse every connection attempt.
    pub fn refuse_connections(&mut self, refuse: bool) {
        self.refuse = refuse;
    }

    /// Make `connect` never complete.
    pub fn hang_on_connect(&mut self, hang: bool) {
        self.hang_connect = hang;
    }

    /// Bytes the client has written (the HTTP request).
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    /// Every connection attempt that succeeded, oldest first.
    pub fn connects(&self) -> &[(String, u16)] {
        &self.connects
    }

    /// Number of `close` calls.
    pub fn closes(&self) -> usize {
        self.closes
    }

    fn remaining(&self) -> &[u8] {
        self.response.get(self.pos..).unwrap_or(&[])
    }
}

impl ErrorType for MockNetwork {
    type Error = ErrorKind;
}

impl embedded_io_async::Read for MockNetwork {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if !self.connected {
            return Err(ErrorKind::NotConnected);
        }
        let rest = self.remaining();
        let n = rest
            .len()
            .min(buf.len())
            .min(self.max_read.unwrap_or(usize::MAX));
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), rest.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = self.pos.saturating_add(n);
        Ok(n)
    }
}

impl embedded_io_async::Write for MockNetwork {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.connected {
            return Err(ErrorKind::NotConnected);
        }
        self.sent.extend_from_slice(buf);
        Ok(buf.len())
    }
}

impl embedded_io::ReadReady for MockNetwork {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.connected && !self.remaining().is_empty())
    }
}

impl NetworkClient for MockNetwork {
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        if self.hang_connect {
            core::future::pending::<()>().await;
        }
        if self.refuse {
            return Err(ErrorKind::ConnectionRefused);
        }
        self.connected = true;
        self.pos = 0;
        self.sent.clear();
        self.connects.push((host.to_string(), port));
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected && !(self.hang_up_at_end && self.remaining().is_empty())
    }

    fn close(&mut self) {
        self.connected = false;
        self.closes = self.closes.saturating_add(1);
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// EEPROM page held in memory. Goes through the real image encoding so
/// tests exercise the checksum path.
#[derive(Debug)]
pub struct MemorySettings {
    image: [u8; Settings::IMAGE_SIZE],
    writes: usize,
}

impl MemorySettings {
    /// A blank (erased) page; loads as factory defaults.
    pub fn blank() -> Self {
        Self {
            image: [0xFF; Settings::IMAGE_SIZE],
            writes: 0,
        }
    }

    /// A page holding `settings`.
    pub fn with(settings: &Settings) -> Self {
        Self {
            image: settings.encode().unwrap_or([0xFF; Settings::IMAGE_SIZE]),
            writes: 0,
        }
    }

    /// Decode the current page contents.
    pub fn stored(&self) -> Settings {
        Settings::load_or_default(&self.image)
    }

    /// Number of page writes.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl SettingsStore for MemorySettings {
    type Error = SettingsError;

    async fn load(&mut self) -> Result<Settings, Self::Error> {
        Ok(Settings::load_or_default(&self.image))
    }

    async fn persist(&mut self, settings: &Settings) -> Result<(), Self::Error> {
        self.image = settings.encode()?;
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }
}
