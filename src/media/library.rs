//! Music library management on top of a [`MediaStore`].

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::audio::MusicPlayer;
use crate::catalog::model::compare_names;
use crate::catalog::Catalog;

use super::store::{MediaError, MediaStore, MusicTrack, MusicTrackMetadata};

/// Which tracks a listing shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackFilter {
    #[default]
    All,
    Dance(String),
}

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackSort {
    #[default]
    Name,
    /// By the name of the linked dance; unlinked tracks sort first.
    Dance,
}

/// Cached metadata view plus import/remove operations.
pub struct MusicLibrary {
    store: Arc<dyn MediaStore>,
    tracks: Vec<MusicTrackMetadata>,
}

impl MusicLibrary {
    /// Load the metadata listing from `store`.
    pub fn open(store: Arc<dyn MediaStore>) -> Result<Self, MediaError> {
        let tracks = store.list_metadata()?;
        Ok(Self { store, tracks })
    }

    pub fn store(&self) -> Arc<dyn MediaStore> {
        Arc::clone(&self.store)
    }

    pub fn tracks(&self) -> &[MusicTrackMetadata] {
        &self.tracks
    }

    /// Store `bytes` under a fresh `music-…` id.
    pub fn add_track(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
        dance_id: Option<String>,
    ) -> Result<MusicTrackMetadata, MediaError> {
        let metadata = MusicTrackMetadata {
            id: format!("music-{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            dance_id,
        };
        self.store.put(MusicTrack {
            metadata: metadata.clone(),
            blob: bytes,
        })?;
        self.tracks.push(metadata.clone());
        log::info!("music: added '{}' as {}", metadata.name, metadata.id);
        Ok(metadata)
    }

    /// Read a file from disk and store it; the file name becomes the
    /// display name.
    pub fn import_file(
        &mut self,
        path: &Path,
        dance_id: Option<String>,
    ) -> Result<MusicTrackMetadata> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_string());
        Ok(self.add_track(&name, bytes, dance_id)?)
    }

    pub fn remove_track(&mut self, id: &str) -> Result<(), MediaError> {
        self.store.delete(id)?;
        self.tracks.retain(|t| t.id != id);
        Ok(())
    }

    /// Start playing the stored track `id` through `player`.
    ///
    /// Returns `Ok(None)` without touching the player when no track has
    /// that id.
    pub fn preview(
        &self,
        id: &str,
        player: &dyn MusicPlayer,
    ) -> Result<Option<MusicTrackMetadata>> {
        let Some(track) = self.store.get(id)? else {
            log::info!("music: nothing to play for '{id}'");
            return Ok(None);
        };
        player
            .play(&track)
            .with_context(|| format!("playing '{}'", track.metadata.name))?;
        Ok(Some(track.metadata))
    }

    /// Filtered, sorted listing.  Dance names are resolved through `catalog`.
    pub fn view(
        &self,
        filter: &TrackFilter,
        sort: TrackSort,
        catalog: &Catalog,
    ) -> Vec<&MusicTrackMetadata> {
        let mut result: Vec<&MusicTrackMetadata> = self
            .tracks
            .iter()
            .filter(|t| match filter {
                TrackFilter::All => true,
                TrackFilter::Dance(id) => t.dance_id.as_deref() == Some(id.as_str()),
            })
            .collect();

        let dance_name = |t: &MusicTrackMetadata| -> String {
            t.dance_id
                .as_deref()
                .and_then(|id| catalog.dance(id))
                .map(|d| d.name.clone())
                .unwrap_or_default()
        };

        match sort {
            TrackSort::Name => result.sort_by(|a, b| compare_names(&a.name, &b.name)),
            TrackSort::Dance => {
                result.sort_by(|a, b| compare_names(&dance_name(a), &dance_name(b)))
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockMusicPlayer;
    use crate::catalog::initial_dances;
    use crate::media::MemoryMediaStore;
    use tempfile::tempdir;

    fn library() -> MusicLibrary {
        let mut lib = MusicLibrary::open(Arc::new(MemoryMediaStore::new())).unwrap();
        lib.add_track("b-side.mp3", vec![1], Some("salsa".into())).unwrap();
        lib.add_track("Andante.mp3", vec![2], Some("bachata".into())).unwrap();
        lib.add_track("cumbia.mp3", vec![3], None).unwrap();
        lib
    }

    fn names(tracks: &[&MusicTrackMetadata]) -> Vec<String> {
        tracks.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn add_generates_music_ids_and_persists() {
        let lib = library();
        assert_eq!(lib.tracks().len(), 3);
        assert!(lib.tracks().iter().all(|t| t.id.starts_with("music-")));
        assert_eq!(lib.store().list_metadata().unwrap().len(), 3);
    }

    #[test]
    fn sort_by_name_ignores_case() {
        let lib = library();
        let catalog = Catalog::in_memory(initial_dances());
        let view = lib.view(&TrackFilter::All, TrackSort::Name, &catalog);
        assert_eq!(names(&view), ["Andante.mp3", "b-side.mp3", "cumbia.mp3"]);
    }

    #[test]
    fn sort_by_dance_name() {
        let lib = library();
        let catalog = Catalog::in_memory(initial_dances());
        let view = lib.view(&TrackFilter::All, TrackSort::Dance, &catalog);
        // "" (unlinked) < "Бачата" < "Сальса"
        assert_eq!(names(&view), ["cumbia.mp3", "Andante.mp3", "b-side.mp3"]);
    }

    #[test]
    fn filter_by_dance() {
        let lib = library();
        let catalog = Catalog::in_memory(initial_dances());
        let view = lib.view(&TrackFilter::Dance("salsa".into()), TrackSort::Name, &catalog);
        assert_eq!(names(&view), ["b-side.mp3"]);
    }

    #[test]
    fn remove_drops_from_store_and_listing() {
        let mut lib = library();
        let id = lib.tracks()[0].id.clone();
        lib.remove_track(&id).unwrap();
        assert_eq!(lib.tracks().len(), 2);
        assert!(lib.store().get(&id).unwrap().is_none());
    }

    #[test]
    fn import_uses_file_name() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("warmup.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let mut lib = MusicLibrary::open(Arc::new(MemoryMediaStore::new())).unwrap();
        let meta = lib.import_file(&path, None).unwrap();
        assert_eq!(meta.name, "warmup.wav");
        assert_eq!(lib.store().get(&meta.id).unwrap().unwrap().blob, b"RIFF");
    }

    #[test]
    fn import_missing_file_fails() {
        let mut lib = MusicLibrary::open(Arc::new(MemoryMediaStore::new())).unwrap();
        assert!(lib.import_file(Path::new("/nonexistent/track.mp3"), None).is_err());
    }

    #[test]
    fn preview_plays_stored_track() {
        let lib = library();
        let id = lib.tracks()[1].id.clone();
        let player = MockMusicPlayer::new();

        let meta = lib.preview(&id, &player).unwrap().unwrap();
        assert_eq!(meta.name, "Andante.mp3");
        assert_eq!(player.started(), [id]);
        assert!(player.is_playing());
    }

    #[test]
    fn preview_of_unknown_id_plays_nothing() {
        let lib = library();
        let player = MockMusicPlayer::new();
        assert!(lib.preview("music-missing", &player).unwrap().is_none());
        assert!(player.started().is_empty());
        assert!(!player.is_playing());
    }

    #[test]
    fn preview_reports_undecodable_track() {
        let lib = library();
        let id = lib.tracks()[0].id.clone();
        assert!(lib.preview(&id, &MockMusicPlayer::failing()).is_err());
    }
}
