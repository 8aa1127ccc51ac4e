//! Container/codec sniffing and the resume-offset policy.
//!
//! The decoder IC handles every format itself; the orchestrator only needs
//! to know the format to decide whether a file belongs in the playlist and
//! how to align a resume offset.

use embedded_io_async::{Read, Seek, SeekFrom};

use crate::config::{HEADER_WINDOW, IMA_BLOCK_SIZE, RESUME_REWIND};

/// Detected container/codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioFormat {
    /// Not recognized.
    Unknown,
    /// RIFF/WAVE, PCM (format tag 1).
    WavPcm,
    /// RIFF/WAVE, IMA ADPCM (format tag 0x0011).
    WavImaAdpcm,
    /// Ogg container.
    Ogg,
    /// MPEG audio (ID3 tag or frame sync).
    Mp3,
}

impl AudioFormat {
    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::WavPcm => "wav-pcm",
            Self::WavImaAdpcm => "wav-ima",
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
        }
    }
}

/// How to treat a RIFF/WAVE header too short to carry the format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Unknown. Used before manual playback and resume.
    Strict,
    /// Assume PCM. Used by the playlist scan.
    Permissive,
}

const WAVE_TAG_PCM: u16 = 0x0001;
const WAVE_TAG_IMA_ADPCM: u16 = 0x0011;

/// Classify a header window.
#[allow(clippy::indexing_slicing)] // every access is behind a length check
pub fn detect(header: &[u8], strictness: Strictness) -> AudioFormat {
    if header.len() < 4 {
        return AudioFormat::Unknown;
    }

    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE" {
        if header.len() >= 22 {
            return match u16::from_le_bytes([header[20], header[21]]) {
                WAVE_TAG_PCM => AudioFormat::WavPcm,
                WAVE_TAG_IMA_ADPCM => AudioFormat::WavImaAdpcm,
                _ => AudioFormat::Unknown,
            };
        }
        return match strictness {
            Strictness::Strict => AudioFormat::Unknown,
            Strictness::Permissive => AudioFormat::WavPcm,
        };
    }

    if &header[0..4] == b"OggS" {
        return AudioFormat::Ogg;
    }
    if &header[0..3] == b"ID3" {
        return AudioFormat::Mp3;
    }

    // Frame sync anywhere in the window; some encoders leave leading junk.
    if header.windows(2).any(|pair| is_mpeg_frame_header(pair[0], pair[1])) {
        return AudioFormat::Mp3;
    }

    AudioFormat::Unknown
}

/// `0xFF` + 3 sync bits, with a non-reserved version (bits 4:3 ≠ 1) and
/// layer (bits 2:1 ≠ 0).
fn is_mpeg_frame_header(b0: u8, b1: u8) -> bool {
    if b0 != 0xFF || b1 & 0xE0 != 0xE0 {
        return false;
    }
    let version = (b1 >> 3) & 0b11;
    let layer = (b1 >> 1) & 0b11;
    version != 1 && layer != 0
}

/// Read the first [`HEADER_WINDOW`] bytes of `file` and classify them,
/// leaving the read position where it was.
///
/// # Errors
///
/// Propagates read/seek errors of the file.
pub async fn sniff<F>(file: &mut F, strictness: Strictness) -> Result<AudioFormat, F::Error>
where
    F: Read + Seek,
{
    let saved = file.stream_position().await?;
    file.seek(SeekFrom::Start(0)).await?;

    let mut header = [0u8; HEADER_WINDOW];
    let mut filled = 0usize;
    while let Some(rest) = header.get_mut(filled..) {
        if rest.is_empty() {
            break;
        }
        let n = file.read(rest).await?;
        if n == 0 {
            break;
        }
        filled = filled.saturating_add(n);
    }

    file.seek(SeekFrom::Start(saved)).await?;
    Ok(detect(header.get(..filled).unwrap_or(&[]), strictness))
}

/// Where to seek when resuming `format` at a saved `offset`.
///
/// IMA ADPCM resumes on a block boundary; everything else rewinds by
/// [`RESUME_REWIND`] bytes so the samples the decoder had buffered but not
/// yet played are heard again instead of skipped.
pub fn resume_offset(format: AudioFormat, offset: u32) -> u32 {
    match format {
        AudioFormat::WavImaAdpcm => {
            offset.saturating_sub(offset.checked_rem(IMA_BLOCK_SIZE).unwrap_or(0))
        }
        _ => offset.saturating_sub(RESUME_REWIND),
    }
}
