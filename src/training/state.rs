//! Training phase machine and the display state a front-end renders.
//!
//! [`TrainingPhase`] is what the scheduler drives.  [`TrainingState`] holds
//! everything a view needs: phase, the element currently announced, the
//! loading flag and the last recoverable error.  It is shared behind
//! [`SharedTrainingState`].

use std::sync::{Arc, Mutex};

use crate::catalog::DanceElement;

// ---------------------------------------------------------------------------
// TrainingPhase
// ---------------------------------------------------------------------------

/// Phases of a training session.
///
/// ```text
/// Idle ──start(valid)──▶ Warmup ──warm-up elapsed──▶ Active
/// Warmup / Active ──stop──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrainingPhase {
    /// No session; no timers.
    #[default]
    Idle,

    /// Music is playing; the warm-up timer is pending.
    Warmup,

    /// Elements are being announced on every tick.
    Active,
}

impl TrainingPhase {
    /// `true` in `Warmup` and `Active`.
    pub fn is_running(&self) -> bool {
        !matches!(self, TrainingPhase::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrainingPhase::Idle => "Idle",
            TrainingPhase::Warmup => "Warm-up",
            TrainingPhase::Active => "Training",
        }
    }
}

// ---------------------------------------------------------------------------
// TrainingState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TrainingState {
    pub phase: TrainingPhase,

    /// Dance of the running session.
    pub dance_id: Option<String>,

    /// Element picked by the most recent tick.  Cleared on stop.
    pub current_element: Option<DanceElement>,

    /// `true` while at least one announcement is in flight.
    pub loading: bool,

    /// Last recoverable failure, cleared when the next tick starts.
    pub error_message: Option<String>,

    /// Announcements started in the current session.
    pub announcements: u64,
}

impl TrainingState {
    /// Return to the idle display state.
    pub fn reset(&mut self) {
        *self = TrainingState::default();
    }
}

// ---------------------------------------------------------------------------
// SharedTrainingState
// ---------------------------------------------------------------------------

/// Cheap to clone.  Never hold the lock across an `.await`.
pub type SharedTrainingState = Arc<Mutex<TrainingState>>;

pub fn new_shared_state() -> SharedTrainingState {
    Arc::new(Mutex::new(TrainingState::default()))
}
