//! Training sessions: selection, scheduling and display state.
//!
//! * [`ElementSelection`] — what the user picked for the next session.
//! * [`TrainingScheduler`] — warm-up timer, random announcements, stop.
//! * [`TrainingState`] — what a front-end renders, behind
//!   [`SharedTrainingState`].

pub mod scheduler;
pub mod selection;
pub mod state;

pub use scheduler::{
    SessionConfig, SpeechError, StartError, TrainingEvent, TrainingScheduler, ValidationError,
};
pub use selection::ElementSelection;
pub use state::{new_shared_state, SharedTrainingState, TrainingPhase, TrainingState};
