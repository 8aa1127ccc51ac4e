//! Flat playlist of the card's root directory.

use heapless::Vec;
use platform::storage::{Storage, StorageVolume};

use crate::command::Text;
use crate::config::MAX_PLAYLIST_LEN;
use crate::format::{self, AudioFormat, Strictness};

/// Ordered list of playable files with a wrapping cursor.
///
/// Rebuilt wholesale by [`scan`](Playlist::scan); never edited in place.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    entries: Vec<Text, MAX_PLAYLIST_LEN>,
    current: usize,
}

impl Playlist {
    /// Empty playlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a playlist from explicit paths (tests, pre-baked lists).
    /// Paths beyond the capacity are ignored.
    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut list = Self::new();
        for path in paths {
            let Ok(entry) = Text::try_from(path) else {
                continue;
            };
            if list.entries.push(entry).is_err() {
                break;
            }
        }
        list
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing playable was found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(Text::as_str)
    }

    /// Cursor position.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Rebuild from the files directly inside `dir` on the card.
    ///
    /// Directories and files the format detector does not recognize are
    /// skipped, as are files that fail to open. Returns the entry count.
    ///
    /// # Errors
    ///
    /// Propagates directory enumeration failures; the playlist is left empty.
    pub async fn scan<S: Storage>(&mut self, storage: &mut S, dir: &str) -> Result<usize, S::Error> {
        self.entries.clear();
        self.current = 0;

        let mut index = 0usize;
        while let Some(entry) = storage.dir_entry(StorageVolume::Removable, dir, index).await? {
            index = index.saturating_add(1);
            if entry.is_dir {
                continue;
            }
            let Some(path) = join(dir, entry.name.as_str()) else {
                warn!("playlist: skipping overlong name {}", entry.name.as_str());
                continue;
            };
            let Ok(mut file) = storage.open(StorageVolume::Removable, path.as_str()).await else {
                warn!("playlist: cannot open {}", path.as_str());
                continue;
            };
            let detected = format::sniff(&mut file, Strictness::Permissive).await;
            drop(file);
            match detected {
                Ok(AudioFormat::Unknown) => {
                    trace!("playlist: {} not audio", path.as_str());
                }
                Ok(fmt) => {
                    debug!("playlist: {} ({})", path.as_str(), fmt.as_str());
                    if self.entries.push(path).is_err() {
                        warn!("playlist full at {} entries", MAX_PLAYLIST_LEN);
                        break;
                    }
                }
                Err(_) => warn!("playlist: cannot read {}", path.as_str()),
            }
        }

        info!("playlist: {} entries", self.entries.len());
        Ok(self.entries.len())
    }

    /// Move the cursor to the entry after `path` (wrapping) and return it.
    ///
    /// When `path` is not in the list, steps from the cursor instead.
    pub fn successor_of(&mut self, path: &str) -> Option<Text> {
        let len = self.entries.len();
        let from = self.position_of(path).unwrap_or(self.current);
        let next = from.checked_add(1)?.checked_rem(len)?;
        self.select(next)
    }

    /// Move the cursor to the entry before `path` (wrapping) and return it.
    pub fn predecessor_of(&mut self, path: &str) -> Option<Text> {
        let len = self.entries.len();
        let from = self.position_of(path).unwrap_or(self.current);
        let prev = from.checked_add(len)?.checked_sub(1)?.checked_rem(len)?;
        self.select(prev)
    }

    fn position_of(&self, path: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.as_str() == path)
    }

    fn select(&mut self, index: usize) -> Option<Text> {
        let entry = self.entries.get(index)?.clone();
        self.current = index;
        Some(entry)
    }
}

/// `dir` + `/` + `name`, without doubling the separator.
fn join(dir: &str, name: &str) -> Option<Text> {
    let mut path = Text::new();
    path.push_str(dir).ok()?;
    if !dir.ends_with('/') {
        path.push('/').ok()?;
    }
    path.push_str(name).ok()?;
    Some(path)
}
