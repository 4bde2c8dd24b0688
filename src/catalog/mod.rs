//! Dance library: dances, their elements, and ephemeral demo videos.
//!
//! * [`Catalog`] — the collection, persisted to `catalog.json` on every
//!   mutation.
//! * [`VideoRegistry`] — in-memory clip storage behind [`VideoHandle`]s.
//! * [`initial_dances`] — starter library for first run.

pub mod model;
pub mod seed;
pub mod store;
pub mod video;

pub use model::{Dance, DanceElement, Difficulty, DifficultyFilter, SortOrder};
pub use seed::initial_dances;
pub use store::{Catalog, ElementDraft, PersistenceError, SharedCatalog};
pub use video::{VideoClip, VideoHandle, VideoRegistry};
