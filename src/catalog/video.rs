//! In-memory registry for element demo videos.
//!
//! Video bytes never reach the durable catalog.  An element only stores a
//! [`VideoHandle`]; the bytes live here until the handle is released, which
//! happens when the element is deleted or its video replaced.  Handles read
//! back from disk point at nothing and are cleared on load.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque reference to a registered clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoHandle(String);

impl VideoHandle {
    fn generate() -> Self {
        Self(format!("video:{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VideoHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A demo clip supplied by the user.
#[derive(Debug, Clone)]
pub struct VideoClip {
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

impl VideoClip {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Live clips keyed by handle.
#[derive(Debug, Default)]
pub struct VideoRegistry {
    clips: HashMap<VideoHandle, VideoClip>,
    released: u64,
}

impl VideoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, clip: VideoClip) -> VideoHandle {
        let handle = VideoHandle::generate();
        log::debug!("video: registered {} ({} bytes)", handle, clip.bytes.len());
        self.clips.insert(handle.clone(), clip);
        handle
    }

    /// Drop the clip behind `handle`.  Returns `false` when it was already
    /// released (or never existed), so a second release is a no-op.
    pub fn release(&mut self, handle: &VideoHandle) -> bool {
        match self.clips.remove(handle) {
            Some(_) => {
                self.released += 1;
                log::debug!("video: released {handle}");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, handle: &VideoHandle) -> Option<&VideoClip> {
        self.clips.get(handle)
    }

    pub fn is_live(&self, handle: &VideoHandle) -> bool {
        self.clips.contains_key(handle)
    }

    pub fn live_count(&self) -> usize {
        self.clips.len()
    }

    /// Total number of successful releases since creation.
    pub fn released_count(&self) -> u64 {
        self.released
    }
}
