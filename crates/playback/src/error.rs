//! Error types of the playback orchestrator.

/// Why a source transition was abandoned.
///
/// Never surfaces to command producers: the dispatcher logs it and leaves
/// the machine Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackError {
    /// The storage collaborator could not open the path.
    #[error("file open failed")]
    OpenFailed,
    /// Reading or seeking the open file failed.
    #[error("file I/O failed")]
    FileIo,
    /// The stream URL is not `http://host[:port]/path`.
    #[error("malformed stream url")]
    InvalidUrl,
    /// The radio payload is not a number inside the FM band.
    #[error("invalid radio frequency")]
    InvalidFrequency,
    /// The TCP connection was refused or failed.
    #[error("stream connect failed")]
    ConnectFailed,
    /// The TCP connection did not complete in time.
    #[error("stream connect timed out")]
    ConnectTimeout,
    /// Writing the HTTP request failed.
    #[error("stream request failed")]
    RequestFailed,
    /// Reading from the stream socket failed.
    #[error("stream read failed")]
    StreamRead,
    /// The decoder IC rejected a command.
    #[error("decoder error")]
    Decoder,
    /// The tuner IC rejected a command.
    #[error("tuner error")]
    Tuner,
    /// There is no playlist entry to move to.
    #[error("playlist empty")]
    EmptyPlaylist,
}

impl PlaybackError {
    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenFailed => "open failed",
            Self::FileIo => "file io",
            Self::InvalidUrl => "invalid url",
            Self::InvalidFrequency => "invalid frequency",
            Self::ConnectFailed => "connect failed",
            Self::ConnectTimeout => "connect timeout",
            Self::RequestFailed => "request failed",
            Self::StreamRead => "stream read",
            Self::Decoder => "decoder",
            Self::Tuner => "tuner",
            Self::EmptyPlaylist => "playlist empty",
        }
    }
}

/// Why a command could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnqueueError {
    /// The queue is full; the command was dropped.
    #[error("command queue full")]
    QueueFull,
    /// The text payload exceeds 63 bytes.
    #[error("payload longer than 63 bytes")]
    PayloadTooLong,
}

/// Text payload exceeds the command text capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("text of {len} bytes exceeds the {max}-byte payload")]
pub struct TextTooLong {
    /// Length of the rejected text.
    pub len: usize,
    /// Capacity.
    pub max: usize,
}

impl From<TextTooLong> for EnqueueError {
    fn from(_: TextTooLong) -> Self {
        Self::PayloadTooLong
    }
}
