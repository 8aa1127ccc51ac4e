//! Storage abstraction for file systems
//!
//! Two logical volumes exist on the board: the removable card holding the
//! music library and the on-chip flash holding announcement assets. Paths
//! under [`FLASH_PREFIX`] address the flash volume.

use heapless::String;

/// Path prefix that selects the local flash volume.
pub const FLASH_PREFIX: &str = "/spiffs/";

/// Maximum length of a directory entry name.
pub const MAX_NAME_LEN: usize = 63;

/// Logical storage volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageVolume {
    /// Removable SD/MMC card.
    Removable,
    /// Local SPI flash file system.
    Flash,
}

impl StorageVolume {
    /// Split a board path into the volume it lives on and the path within
    /// that volume.
    ///
    /// `"/spiffs/chime.mp3"` → (`Flash`, `"/chime.mp3"`);
    /// anything else is on the removable card, unchanged.
    pub fn resolve(path: &str) -> (Self, &str) {
        if path.starts_with(FLASH_PREFIX) {
            // Keep the leading slash of the volume-relative path.
            let rest = path.get(FLASH_PREFIX.len().saturating_sub(1)..).unwrap_or("/");
            (Self::Flash, rest)
        } else {
            (Self::Removable, path)
        }
    }

    /// Short name for log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Removable => "card",
            Self::Flash => "flash",
        }
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name without the directory part.
    pub name: String<MAX_NAME_LEN>,
    /// `true` for sub-directories.
    pub is_dir: bool,
}

/// Storage trait for file system access
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// File type. Dropping it closes the file.
    type File: AudioFile;

    /// Open file for reading
    async fn open(&mut self, volume: StorageVolume, path: &str) -> Result<Self::File, Self::Error>;

    /// Return the `index`-th entry of directory `dir`, or `None` past the end.
    async fn dir_entry(
        &mut self,
        volume: StorageVolume,
        dir: &str,
        index: usize,
    ) -> Result<Option<DirEntry>, Self::Error>;
}

/// An open, readable and seekable file.
///
/// A read returning `Ok(0)` means end of file.
pub trait AudioFile: embedded_io_async::Read + embedded_io_async::Seek {}

impl<T> AudioFile for T where T: embedded_io_async::Read + embedded_io_async::Seek {}
