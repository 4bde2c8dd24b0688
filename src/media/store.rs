//! Durable music storage.
//!
//! [`MediaStore`] is the seam the scheduler and the music library depend on.
//! [`FsMediaStore`] keeps one blob file per track next to a JSON metadata
//! index; [`MemoryMediaStore`] keeps everything in a map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Lightweight listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicTrackMetadata {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dance_id: Option<String>,
}

/// Metadata plus the encoded audio file (mp3, wav, ogg, …).
#[derive(Debug, Clone)]
pub struct MusicTrack {
    pub metadata: MusicTrackMetadata,
    pub blob: Vec<u8>,
}

// ---------------------------------------------------------------------------
// MediaError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid track id '{0}'")]
    InvalidId(String),

    #[error("media storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("media index is corrupt: {0}")]
    Index(#[from] serde_json::Error),

    #[error("media store lock poisoned")]
    Poisoned,
}

// ---------------------------------------------------------------------------
// MediaStore trait
// ---------------------------------------------------------------------------

/// Keyed blob storage for music tracks.
///
/// `get` returns `Ok(None)` for an unknown id; callers treat that as
/// "nothing to play".
pub trait MediaStore: Send + Sync {
    /// Store `track`, replacing any record with the same id.  Returns the id.
    fn put(&self, track: MusicTrack) -> Result<String, MediaError>;

    fn get(&self, id: &str) -> Result<Option<MusicTrack>, MediaError>;

    /// Remove a record.  Unknown ids are not an error.
    fn delete(&self, id: &str) -> Result<(), MediaError>;

    /// Metadata of every stored track, in insertion order.
    fn list_metadata(&self) -> Result<Vec<MusicTrackMetadata>, MediaError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn MediaStore>) {}
};

/// Ids double as file names, so only a conservative alphabet is accepted.
fn validate_id(id: &str) -> Result<(), MediaError> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(MediaError::InvalidId(id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// FsMediaStore
// ---------------------------------------------------------------------------

/// Directory-backed store:
///
/// ```text
/// <root>/index.json      [MusicTrackMetadata, …]
/// <root>/blobs/<id>.bin  raw file bytes
/// ```
pub struct FsMediaStore {
    root: PathBuf,
    /// Serializes index read-modify-write cycles.
    index_lock: Mutex<()>,
}

impl FsMediaStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, MediaError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("blobs"))?;
        Ok(Self {
            root,
            index_lock: Mutex::new(()),
        })
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.root.join("blobs").join(format!("{id}.bin"))
    }

    fn read_index(&self) -> Result<Vec<MusicTrackMetadata>, MediaError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn write_index(&self, index: &[MusicTrackMetadata]) -> Result<(), MediaError> {
        let data = serde_json::to_string_pretty(index)?;
        write_atomic(&self.index_path(), data.as_bytes())?;
        Ok(())
    }
}

/// Write to a sibling `.tmp` file, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(tmp, path)
}

impl MediaStore for FsMediaStore {
    fn put(&self, track: MusicTrack) -> Result<String, MediaError> {
        let id = track.metadata.id.clone();
        validate_id(&id)?;
        let _guard = self.index_lock.lock().map_err(|_| MediaError::Poisoned)?;

        std::fs::write(self.blob_path(&id), &track.blob)?;

        let mut index = self.read_index()?;
        match index.iter_mut().find(|m| m.id == id) {
            Some(existing) => *existing = track.metadata,
            None => index.push(track.metadata),
        }
        self.write_index(&index)?;

        log::debug!("media: stored {id} ({} bytes)", track.blob.len());
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<MusicTrack>, MediaError> {
        if validate_id(id).is_err() {
            return Ok(None);
        }
        let _guard = self.index_lock.lock().map_err(|_| MediaError::Poisoned)?;

        let Some(metadata) = self.read_index()?.into_iter().find(|m| m.id == id) else {
            return Ok(None);
        };
        match std::fs::read(self.blob_path(id)) {
            Ok(blob) => Ok(Some(MusicTrack { metadata, blob })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("media: index lists {id} but its blob is missing");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, id: &str) -> Result<(), MediaError> {
        validate_id(id)?;
        let _guard = self.index_lock.lock().map_err(|_| MediaError::Poisoned)?;

        let mut index = self.read_index()?;
        let before = index.len();
        index.retain(|m| m.id != id);
        if index.len() != before {
            self.write_index(&index)?;
        }

        match std::fs::remove_file(self.blob_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_metadata(&self) -> Result<Vec<MusicTrackMetadata>, MediaError> {
        let _guard = self.index_lock.lock().map_err(|_| MediaError::Poisoned)?;
        self.read_index()
    }
}

// ---------------------------------------------------------------------------
// MemoryMediaStore
// ---------------------------------------------------------------------------

/// Non-durable store.
#[derive(Default)]
pub struct MemoryMediaStore {
    tracks: Mutex<BTreeMap<u64, MusicTrack>>,
    next_seq: std::sync::atomic::AtomicU64,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaStore for MemoryMediaStore {
    fn put(&self, track: MusicTrack) -> Result<String, MediaError> {
        let id = track.metadata.id.clone();
        validate_id(&id)?;
        let mut tracks = self.tracks.lock().map_err(|_| MediaError::Poisoned)?;

        let existing = tracks
            .iter()
            .find(|(_, t)| t.metadata.id == id)
            .map(|(seq, _)| *seq);
        let seq = existing.unwrap_or_else(|| {
            self.next_seq
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        });
        tracks.insert(seq, track);
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<MusicTrack>, MediaError> {
        let tracks = self.tracks.lock().map_err(|_| MediaError::Poisoned)?;
        Ok(tracks.values().find(|t| t.metadata.id == id).cloned())
    }

    fn delete(&self, id: &str) -> Result<(), MediaError> {
        let mut tracks = self.tracks.lock().map_err(|_| MediaError::Poisoned)?;
        tracks.retain(|_, t| t.metadata.id != id);
        Ok(())
    }

    fn list_metadata(&self) -> Result<Vec<MusicTrackMetadata>, MediaError> {
        let tracks = self.tracks.lock().map_err(|_| MediaError::Poisoned)?;
        Ok(tracks.values().map(|t| t.metadata.clone()).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn track(id: &str, name: &str, dance: Option<&str>) -> MusicTrack {
        MusicTrack {
            metadata: MusicTrackMetadata {
                id: id.into(),
                name: name.into(),
                dance_id: dance.map(str::to_string),
            },
            blob: name.as_bytes().to_vec(),
        }
    }

    fn exercise(store: &dyn MediaStore) {
        assert!(store.list_metadata().unwrap().is_empty());
        assert!(store.get("music-1").unwrap().is_none());

        store.put(track("music-1", "one.mp3", Some("salsa"))).unwrap();
        store.put(track("music-2", "two.mp3", None)).unwrap();

        let listed = store.list_metadata().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "music-1");
        assert_eq!(listed[0].dance_id.as_deref(), Some("salsa"));

        let fetched = store.get("music-2").unwrap().unwrap();
        assert_eq!(fetched.blob, b"two.mp3");

        store.put(track("music-1", "renamed.mp3", None)).unwrap();
        let listed = store.list_metadata().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "renamed.mp3");

        store.delete("music-1").unwrap();
        store.delete("music-1").unwrap();
        assert!(store.get("music-1").unwrap().is_none());
        assert_eq!(store.list_metadata().unwrap().len(), 1);
    }

    #[test]
    fn memory_store_behaviour() {
        exercise(&MemoryMediaStore::new());
    }

    #[test]
    fn fs_store_behaviour() {
        let dir = tempdir().expect("temp dir");
        exercise(&FsMediaStore::open(dir.path().join("music")).unwrap());
    }

    #[test]
    fn fs_store_survives_reopen() {
        let dir = tempdir().expect("temp dir");
        {
            let store = FsMediaStore::open(dir.path()).unwrap();
            store.put(track("music-a", "a.ogg", Some("bachata"))).unwrap();
        }
        let store = FsMediaStore::open(dir.path()).unwrap();
        let fetched = store.get("music-a").unwrap().unwrap();
        assert_eq!(fetched.metadata.name, "a.ogg");
        assert_eq!(fetched.blob, b"a.ogg");
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let dir = tempdir().expect("temp dir");
        let store = FsMediaStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.put(track("../escape", "x", None)),
            Err(MediaError::InvalidId(_))
        ));
        assert!(store.get("../escape").unwrap().is_none());
    }

    #[test]
    fn missing_blob_reads_as_absent() {
        let dir = tempdir().expect("temp dir");
        let store = FsMediaStore::open(dir.path()).unwrap();
        store.put(track("music-x", "x.mp3", None)).unwrap();
        std::fs::remove_file(dir.path().join("blobs").join("music-x.bin")).unwrap();
        assert!(store.get("music-x").unwrap().is_none());
    }
}
