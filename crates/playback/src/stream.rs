//! HTTP audio streams.
//!
//! Opening a stream is split across loop iterations so a slow server never
//! stalls command handling for more than one bounded connect:
//!
//! ```text
//! Connecting ──connect + GET──▶ HeaderParsing ──"\r\n\r\n"──▶ Ready
//!      │ timeout/refused             │ deadline/hang-up        │ hang-up
//!      ▼                             ▼                         ▼
//!   Finished                      Finished                  Finished
//! ```

use core::fmt::Write as _;

use embassy_time::{with_timeout, Duration, Instant};
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use heapless::String;
use platform::{DecoderDevice, NetworkClient};

use crate::command::Text;
use crate::config::CHUNK_SIZE;
use crate::engine::StepOutcome;
use crate::error::PlaybackError;

const DEFAULT_HTTP_PORT: u16 = 80;
const HEADER_END: &[u8; 4] = b"\r\n\r\n";

/// The parts of an `http://host[:port]/path` URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamUrl<'a> {
    /// Host name or address.
    pub host: &'a str,
    /// TCP port, 80 unless given.
    pub port: u16,
    /// Request path, `/` when absent.
    pub path: &'a str,
}

impl<'a> StreamUrl<'a> {
    /// Parse a plain-HTTP URL.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidUrl`] for other schemes, an empty host or a
    /// bad port.
    pub fn parse(url: &'a str) -> Result<Self, PlaybackError> {
        let rest = url.strip_prefix("http://").ok_or(PlaybackError::InvalidUrl)?;
        let (authority, path) = match rest.find('/') {
            Some(i) => (rest.get(..i).unwrap_or(""), rest.get(i..).unwrap_or("/")),
            None => (rest, "/"),
        };
        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>().map_err(|_| PlaybackError::InvalidUrl)?,
            ),
            None => (authority, DEFAULT_HTTP_PORT),
        };
        if host.is_empty() || port == 0 {
            return Err(PlaybackError::InvalidUrl);
        }
        Ok(Self { host, port, path })
    }
}

/// Where the session is in the open sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamPhase {
    /// Next step connects and sends the request.
    Connecting,
    /// Consuming response headers.
    HeaderParsing,
    /// Body bytes are audio.
    Ready,
}

impl StreamPhase {
    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::HeaderParsing => "headers",
            Self::Ready => "ready",
        }
    }
}

/// An HTTP stream being opened or played.
#[derive(Debug, Clone)]
pub struct StreamSession {
    url: Text,
    phase: StreamPhase,
    timeout: Duration,
    deadline: Option<Instant>,
    matched: usize,
}

impl StreamSession {
    /// Validate `url` and prepare a session; nothing touches the network yet.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidUrl`] if the URL does not parse.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PlaybackError> {
        StreamUrl::parse(url)?;
        Ok(Self {
            url: Text::try_from(url).map_err(|_| PlaybackError::InvalidUrl)?,
            phase: StreamPhase::Connecting,
            timeout,
            deadline: None,
            matched: 0,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// One bounded unit of work.
    pub async fn step<N, D>(&mut self, net: &mut N, decoder: &mut D) -> StepOutcome
    where
        N: NetworkClient,
        D: DecoderDevice,
    {
        let result = match self.phase {
            StreamPhase::Connecting => self.connect(net).await,
            StreamPhase::HeaderParsing => self.parse_headers(net).await,
            StreamPhase::Ready => Self::feed(net, decoder).await,
        };
        let outcome = result.unwrap_or_else(|e| {
            warn!("stream {}: {}", self.phase.as_str(), e.as_str());
            StepOutcome::Finished
        });
        // Every way out of a session releases the socket.
        if outcome == StepOutcome::Finished {
            net.close();
        }
        outcome
    }

    async fn connect<N: NetworkClient>(&mut self, net: &mut N) -> Result<StepOutcome, PlaybackError> {
        let url = StreamUrl::parse(self.url.as_str())?;
        info!("stream: connecting to {}:{}", url.host, url.port);

        match with_timeout(self.timeout, net.connect(url.host, url.port)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(PlaybackError::ConnectFailed),
            Err(_) => return Err(PlaybackError::ConnectTimeout),
        }

        let mut request: String<192> = String::new();
        write!(
            request,
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            url.path, url.host
        )
        .map_err(|_| PlaybackError::InvalidUrl)?;
        net.write_all(request.as_bytes())
            .await
            .map_err(|_| PlaybackError::RequestFailed)?;

        self.phase = StreamPhase::HeaderParsing;
        self.deadline = Instant::now().checked_add(self.timeout);
        self.matched = 0;
        Ok(StepOutcome::Active)
    }

    /// Consume at most one chunk worth of header bytes, one byte at a time so
    /// the first body byte stays in the socket.
    async fn parse_headers<N: NetworkClient>(&mut self, net: &mut N) -> Result<StepOutcome, PlaybackError> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("stream: header timeout");
            return Ok(StepOutcome::Finished);
        }

        for _ in 0..CHUNK_SIZE {
            if !net.read_ready().unwrap_or(false) {
                return Ok(if net.is_connected() {
                    StepOutcome::Active
                } else {
                    StepOutcome::Finished
                });
            }
            let mut byte = [0u8; 1];
            if net.read(&mut byte).await.map_err(|_| PlaybackError::StreamRead)? == 0 {
                info!("stream: peer closed during headers");
                return Ok(StepOutcome::Finished);
            }
            let [b] = byte;
            self.matched = advance_terminator(self.matched, b);
            if self.matched == HEADER_END.len() {
                debug!("stream: headers done");
                self.phase = StreamPhase::Ready;
                return Ok(StepOutcome::Active);
            }
        }
        Ok(StepOutcome::Active)
    }

    async fn feed<N, D>(net: &mut N, decoder: &mut D) -> Result<StepOutcome, PlaybackError>
    where
        N: NetworkClient,
        D: DecoderDevice,
    {
        if !net.read_ready().unwrap_or(false) {
            return Ok(if net.is_connected() {
                StepOutcome::Active
            } else {
                info!("stream: peer closed");
                StepOutcome::Finished
            });
        }
        if !decoder.ready_for_data() {
            return Ok(StepOutcome::Active);
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = net.read(&mut chunk).await.map_err(|_| PlaybackError::StreamRead)?;
        let Some(data) = chunk.get(..n).filter(|d| !d.is_empty()) else {
            return Ok(StepOutcome::Finished);
        };
        decoder.write_chunk(data).await.map_err(|_| PlaybackError::Decoder)?;
        trace!("stream: fed {} bytes", n);
        Ok(StepOutcome::Active)
    }
}

/// Advance the `\r\n\r\n` matcher by one byte.
fn advance_terminator(matched: usize, byte: u8) -> usize {
    if HEADER_END.get(matched) == Some(&byte) {
        matched.saturating_add(1)
    } else if byte == b'\r' {
        1
    } else {
        0
    }
}
