//! The dance catalog: in-memory collection kept in sync with `catalog.json`.
//!
//! Every mutation rewrites the whole file.  A failed write is logged and the
//! in-memory state stays authoritative for the rest of the process.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use uuid::Uuid;

use crate::media::store::write_atomic;

use super::model::{Dance, DanceElement, Difficulty};
use super::seed::initial_dances;
use super::video::{VideoClip, VideoHandle, VideoRegistry};

// ---------------------------------------------------------------------------
// PersistenceError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("catalog I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// ElementDraft
// ---------------------------------------------------------------------------

/// User input for creating or editing an element.
#[derive(Debug, Clone, Default)]
pub struct ElementDraft {
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    /// New demo clip.  `None` on edit keeps the current one.
    pub video: Option<VideoClip>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Thread-safe handle shared between the front-end and the scheduler.
///
/// Never hold the lock across an `.await`.
pub type SharedCatalog = Arc<RwLock<Catalog>>;

pub struct Catalog {
    dances: Vec<Dance>,
    videos: VideoRegistry,
    /// `None` for purely in-memory catalogs.
    path: Option<PathBuf>,
}

impl Catalog {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Load from `path`, falling back to the starter library when the file is
    /// missing or unreadable.  Video handles found on disk are cleared.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dances = match Self::read_dances(&path) {
            Ok(Some(dances)) => dances,
            Ok(None) => {
                log::info!("catalog: {} not found, using starter library", path.display());
                initial_dances()
            }
            Err(e) => {
                log::error!("catalog: could not read {}: {e}", path.display());
                initial_dances()
            }
        };

        let mut catalog = Self {
            dances,
            videos: VideoRegistry::new(),
            path: Some(path),
        };
        catalog.clear_stale_videos();
        catalog
    }

    /// A catalog that is never written to disk.
    pub fn in_memory(dances: Vec<Dance>) -> Self {
        Self {
            dances,
            videos: VideoRegistry::new(),
            path: None,
        }
    }

    pub fn into_shared(self) -> SharedCatalog {
        Arc::new(RwLock::new(self))
    }

    fn read_dances(path: &Path) -> Result<Option<Vec<Dance>>, PersistenceError> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Persisted handles refer to clips of a previous process.
    fn clear_stale_videos(&mut self) {
        for element in self.dances.iter_mut().flat_map(|d| d.elements.iter_mut()) {
            if let Some(handle) = element.video.take() {
                log::debug!("catalog: dropping stale video reference {handle}");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn dances(&self) -> &[Dance] {
        &self.dances
    }

    pub fn dance(&self, dance_id: &str) -> Option<&Dance> {
        self.dances.iter().find(|d| d.id == dance_id)
    }

    pub fn element(&self, dance_id: &str, element_id: &str) -> Option<&DanceElement> {
        self.dance(dance_id)?.element(element_id)
    }

    pub fn video(&self, handle: &VideoHandle) -> Option<&VideoClip> {
        self.videos.get(handle)
    }

    pub fn videos(&self) -> &VideoRegistry {
        &self.videos
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append a dance.  Blank names are ignored and return `None`.
    pub fn add_dance(&mut self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let id = format!("dance-{}", Uuid::new_v4().simple());
        self.dances.push(Dance {
            id: id.clone(),
            name: name.to_string(),
            elements: Vec::new(),
        });
        self.persist();
        Some(id)
    }

    /// Append an element to `dance_id`.  Returns `None` for a blank name or
    /// an unknown dance.
    pub fn add_element(&mut self, dance_id: &str, draft: ElementDraft) -> Option<String> {
        let name = draft.name.trim();
        if name.is_empty() {
            return None;
        }
        let dance = self.dances.iter_mut().find(|d| d.id == dance_id)?;

        let id = format!("element-{}", Uuid::new_v4().simple());
        let video = draft.video.map(|clip| self.videos.register(clip));
        dance.elements.push(DanceElement {
            id: id.clone(),
            name: name.to_string(),
            description: draft.description.trim().to_string(),
            difficulty: draft.difficulty,
            video,
        });
        self.persist();
        Some(id)
    }

    /// Replace name, description and difficulty.  A new clip releases the old
    /// one first.  Returns `false` if nothing was changed.
    pub fn edit_element(&mut self, dance_id: &str, element_id: &str, draft: ElementDraft) -> bool {
        let name = draft.name.trim();
        if name.is_empty() {
            return false;
        }
        let Some(element) = self
            .dances
            .iter_mut()
            .find(|d| d.id == dance_id)
            .and_then(|d| d.elements.iter_mut().find(|e| e.id == element_id))
        else {
            return false;
        };

        element.name = name.to_string();
        element.description = draft.description.trim().to_string();
        element.difficulty = draft.difficulty;
        if let Some(clip) = draft.video {
            if let Some(old) = element.video.take() {
                self.videos.release(&old);
            }
            element.video = Some(self.videos.register(clip));
        }
        self.persist();
        true
    }

    /// Remove an element and release its clip.  Returns `false` if the
    /// element did not exist.
    pub fn delete_element(&mut self, dance_id: &str, element_id: &str) -> bool {
        let Some(dance) = self.dances.iter_mut().find(|d| d.id == dance_id) else {
            return false;
        };
        let Some(index) = dance.elements.iter().position(|e| e.id == element_id) else {
            return false;
        };

        let removed = dance.elements.remove(index);
        if let Some(handle) = removed.video {
            self.videos.release(&handle);
        }
        self.persist();
        true
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write the catalog to its file.  In-memory catalogs succeed trivially.
    pub fn save(&self) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.dances)?;
        write_atomic(path, data.as_bytes())?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            log::error!("catalog: save failed, keeping in-memory state: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
