//! Durable music library.
//!
//! * [`MediaStore`] — keyed blob storage (`put` / `get` / `delete` /
//!   `list_metadata`).
//! * [`FsMediaStore`] — directory-backed implementation used by the binary.
//! * [`MemoryMediaStore`] — non-durable implementation.
//! * [`MusicLibrary`] — import, removal and filtered/sorted listings.

pub mod library;
pub mod store;

pub use library::{MusicLibrary, TrackFilter, TrackSort};
pub use store::{
    FsMediaStore, MediaError, MediaStore, MemoryMediaStore, MusicTrack, MusicTrackMetadata,
};
