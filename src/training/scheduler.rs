//! Training scheduler: warm-up timer, repeating announcements, clean stop.
//!
//! [`TrainingScheduler`] owns the timers of at most one session.  Timers are
//! tokio tasks whose `JoinHandle`s live in the session slot and are aborted
//! on [`stop`](TrainingScheduler::stop).
//!
//! # Session flow
//!
//! ```text
//! start(config)
//!   └─▶ validate (music, elements, dance) → music.play → Warmup
//!         └─▶ sleep(warm-up) → Active → announce now
//!               └─▶ interval(period) → announce on every tick
//! stop()
//!   └─▶ abort timers → music.pause → Idle
//! ```
//!
//! Announcements run as spawned tasks.  `stop` does not cancel them; their
//! results are dropped once the session generation has moved on.
//!
//! Lock order: session → catalog → state.  `events` is a leaf lock.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::seq::IndexedRandom;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::audio::{AudioPlayer, MusicPlayer, PlaybackError};
use crate::catalog::{DanceElement, SharedCatalog};
use crate::config::{OverlapPolicy, TrainingConfig};
use crate::media::{MediaError, MediaStore};
use crate::speech::{SpeechSynthesizer, SynthesisError};

use super::state::{new_shared_state, SharedTrainingState, TrainingPhase, TrainingState};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Parameters of one session, snapshotted at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub dance_id: String,
    pub element_ids: BTreeSet<String>,
    /// Seconds between announcements, clamped to
    /// `1..=MAX_INTERVAL_SECS`.
    pub interval_secs: i64,
    pub music_id: Option<String>,
}

/// Longest accepted interval (one day).  Keeps timer deadlines
/// representable as an `Instant`.
pub const MAX_INTERVAL_SECS: i64 = 86_400;

impl SessionConfig {
    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.clamp(1, MAX_INTERVAL_SECS) as u64)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a session may not start.  Music is checked before elements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("select a music track from the library first")]
    NoMusic,

    #[error("select at least one element to train")]
    NoElements,

    #[error("unknown dance '{0}'")]
    UnknownDance(String),
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("training is already running")]
    AlreadyRunning,

    #[error("could not load music: {0}")]
    Media(#[from] MediaError),

    #[error("could not start music: {0}")]
    Playback(#[from] PlaybackError),
}

/// Recoverable announcement failure.  Never ends a session.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("could not synthesize the element name: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("could not play the element name: {0}")]
    Playback(#[from] PlaybackError),
}

// ---------------------------------------------------------------------------
// TrainingEvent
// ---------------------------------------------------------------------------

/// Progress notifications for a front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    PhaseChanged(TrainingPhase),
    Announcing { element_id: String, name: String },
    Announced { element_id: String },
    AnnouncementFailed { element_id: String, message: String },
    /// A tick found the previous announcement still in flight.
    TickSkipped,
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Session {
    config: SessionConfig,
    generation: u64,
    warmup: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
}

impl Session {
    fn live_timers(&self) -> usize {
        [&self.warmup, &self.ticker]
            .into_iter()
            .flatten()
            .filter(|h| !h.is_finished())
            .count()
    }
}

struct Inner {
    catalog: SharedCatalog,
    media: Arc<dyn MediaStore>,
    speech: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    music: Arc<dyn MusicPlayer>,
    config: TrainingConfig,
    state: SharedTrainingState,
    session: Mutex<Option<Session>>,
    /// Bumped on every start and stop, always under the `session` lock.
    generation: AtomicU64,
    /// In-flight counter for announcements made outside a session.
    idle_in_flight: Arc<AtomicUsize>,
    events: Mutex<Option<mpsc::UnboundedSender<TrainingEvent>>>,
}

/// Holds the loading flag up for as long as one announcement is in flight.
struct LoadingGuard {
    inner: Arc<Inner>,
    counter: Arc<AtomicUsize>,
    generation: u64,
}

impl LoadingGuard {
    fn acquire(inner: &Arc<Inner>, counter: Arc<AtomicUsize>, generation: u64) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        inner.update_state(generation, |st| st.loading = true);
        Self {
            inner: Arc::clone(inner),
            counter,
            generation,
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner
                .update_state(self.generation, |st| st.loading = false);
        }
    }
}

impl Inner {
    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Apply `f` to the display state unless `generation` is stale.
    fn update_state(&self, generation: u64, f: impl FnOnce(&mut TrainingState)) -> bool {
        let mut st = lock(&self.state);
        if generation != self.current_generation() {
            return false;
        }
        f(&mut st);
        true
    }

    fn emit(&self, event: TrainingEvent) {
        let mut events = lock(&self.events);
        if let Some(tx) = events.as_ref() {
            if tx.send(event).is_err() {
                *events = None;
            }
        }
    }

    fn set_phase(&self, generation: u64, phase: TrainingPhase) {
        if self.update_state(generation, |st| st.phase = phase) {
            log::info!("training: phase → {}", phase.label());
            self.emit(TrainingEvent::PhaseChanged(phase));
        }
    }

    // ---- start / stop -------------------------------------------------

    fn start(self: &Arc<Self>, config: SessionConfig) -> Result<(), StartError> {
        let mut slot = lock(&self.session);
        if slot.is_some() {
            return Err(StartError::AlreadyRunning);
        }

        let music_id = config.music_id.as_deref().ok_or(ValidationError::NoMusic)?;
        let track = self
            .media
            .get(music_id)?
            .ok_or(ValidationError::NoMusic)?;
        if config.element_ids.is_empty() {
            return Err(ValidationError::NoElements.into());
        }
        {
            let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
            if catalog.dance(&config.dance_id).is_none() {
                return Err(ValidationError::UnknownDance(config.dance_id.clone()).into());
            }
        }

        self.music.play(&track)?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut st = lock(&self.state);
            st.reset();
            st.dance_id = Some(config.dance_id.clone());
        }
        self.set_phase(generation, TrainingPhase::Warmup);

        let warmup = Duration::from_secs(self.config.warmup_secs);
        log::info!(
            "training: started '{}' with {} element(s), warm-up {:?}, interval {:?}",
            config.dance_id,
            config.element_ids.len(),
            warmup,
            config.effective_interval()
        );

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(warmup).await;
            inner.begin_active(generation);
        });

        *slot = Some(Session {
            config,
            generation,
            warmup: Some(handle),
            ticker: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
        });
        Ok(())
    }

    fn stop(&self) {
        let mut slot = lock(&self.session);
        let previous = slot.take();
        self.generation.fetch_add(1, Ordering::SeqCst);

        let was_running = previous.is_some();
        if let Some(session) = previous {
            if let Some(h) = session.warmup {
                h.abort();
            }
            if let Some(h) = session.ticker {
                h.abort();
            }
        }

        self.music.pause();
        lock(&self.state).reset();

        if was_running {
            log::info!("training: stopped");
            self.emit(TrainingEvent::PhaseChanged(TrainingPhase::Idle));
        }
    }

    // ---- timers -------------------------------------------------------

    /// Warm-up expiry: announce once, then start the repeating timer.
    fn begin_active(self: &Arc<Self>, generation: u64) {
        let mut slot = lock(&self.session);
        let Some(session) = slot.as_mut() else {
            return;
        };
        if session.generation != generation {
            return;
        }

        session.warmup = None;
        self.set_phase(generation, TrainingPhase::Active);
        self.tick_locked(session);

        let period = session.config.effective_interval();
        let first = Instant::now() + period;
        let inner = Arc::clone(self);
        session.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                inner.tick(generation);
            }
        }));
    }

    fn tick(self: &Arc<Self>, generation: u64) {
        let slot = lock(&self.session);
        if let Some(session) = slot.as_ref().filter(|s| s.generation == generation) {
            self.tick_locked(session);
        }
    }

    /// Pick a random selected element that still exists and announce it.
    fn tick_locked(self: &Arc<Self>, session: &Session) {
        if self.config.overlap == OverlapPolicy::SkipWhileBusy
            && session.in_flight.load(Ordering::SeqCst) > 0
        {
            log::debug!("training: previous announcement still running, skipping tick");
            self.emit(TrainingEvent::TickSkipped);
            return;
        }

        let element = {
            let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
            let candidates: Vec<&DanceElement> = catalog
                .dance(&session.config.dance_id)
                .map(|d| {
                    d.elements
                        .iter()
                        .filter(|e| session.config.element_ids.contains(&e.id))
                        .collect()
                })
                .unwrap_or_default();
            candidates.choose(&mut rand::rng()).map(|e| (*e).clone())
        };
        let Some(element) = element else {
            log::debug!("training: no selected element left, nothing to announce");
            return;
        };

        let generation = session.generation;
        self.update_state(generation, |st| {
            st.current_element = Some(element.clone());
            st.error_message = None;
            st.announcements += 1;
        });
        self.emit(TrainingEvent::Announcing {
            element_id: element.id.clone(),
            name: element.name.clone(),
        });

        let guard = LoadingGuard::acquire(self, Arc::clone(&session.in_flight), generation);
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            let result = inner.speak(&element.name).await;
            inner.finish_announcement(&element, generation, result);
        });
    }

    // ---- announcements ------------------------------------------------

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let audio = self.speech.synthesize(text).await?;
        let buffer = self
            .player
            .decode(&audio.pcm, audio.sample_rate, audio.channels)?;
        self.player.play(buffer).await?;
        Ok(())
    }

    fn finish_announcement(
        &self,
        element: &DanceElement,
        generation: u64,
        result: Result<(), SpeechError>,
    ) {
        match result {
            Ok(()) => {
                if self.update_state(generation, |_| {}) {
                    self.emit(TrainingEvent::Announced {
                        element_id: element.id.clone(),
                    });
                }
            }
            Err(e) => {
                let message = e.to_string();
                let current =
                    self.update_state(generation, |st| st.error_message = Some(message.clone()));
                if current {
                    log::warn!("training: announcing '{}' failed: {message}", element.name);
                    self.emit(TrainingEvent::AnnouncementFailed {
                        element_id: element.id.clone(),
                        message,
                    });
                } else {
                    log::debug!("training: dropping result of a stopped session");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TrainingScheduler
// ---------------------------------------------------------------------------

/// Runs training sessions.  Dropping the scheduler stops the session.
///
/// `start` spawns tokio tasks and must be called from within a runtime.
pub struct TrainingScheduler {
    inner: Arc<Inner>,
}

impl TrainingScheduler {
    pub fn new(
        catalog: SharedCatalog,
        media: Arc<dyn MediaStore>,
        speech: Arc<dyn SpeechSynthesizer>,
        player: Arc<dyn AudioPlayer>,
        music: Arc<dyn MusicPlayer>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                media,
                speech,
                player,
                music,
                config,
                state: new_shared_state(),
                session: Mutex::new(None),
                generation: AtomicU64::new(0),
                idle_in_flight: Arc::new(AtomicUsize::new(0)),
                events: Mutex::new(None),
            }),
        }
    }

    /// Receive [`TrainingEvent`]s from now on.  A second call replaces the
    /// previous subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TrainingEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.inner.events) = Some(tx);
        rx
    }

    /// Validate `config`, start the music and schedule the warm-up timer.
    ///
    /// # Errors
    ///
    /// Nothing is started when an error is returned; the phase stays idle.
    pub fn start(&self, config: SessionConfig) -> Result<(), StartError> {
        self.inner.start(config)
    }

    /// Cancel all timers, pause the music and return to idle.  Safe to call
    /// any number of times.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Synthesize and play `element`'s name.
    ///
    /// The loading flag is raised for the duration of the call.  A failure
    /// is also recorded as the session's error message.
    pub async fn announce_element(&self, element: &DanceElement) -> Result<(), SpeechError> {
        let (counter, generation) = {
            let slot = lock(&self.inner.session);
            match slot.as_ref() {
                Some(s) => (Arc::clone(&s.in_flight), s.generation),
                None => (
                    Arc::clone(&self.inner.idle_in_flight),
                    self.inner.current_generation(),
                ),
            }
        };
        let _guard = LoadingGuard::acquire(&self.inner, counter, generation);
        let result = self.inner.speak(&element.name).await;
        if let Err(e) = &result {
            let message = e.to_string();
            self.inner
                .update_state(generation, |st| st.error_message = Some(message));
        }
        result
    }

    pub fn phase(&self) -> TrainingPhase {
        lock(&self.inner.state).phase
    }

    /// Snapshot of the display state.
    pub fn state(&self) -> TrainingState {
        lock(&self.inner.state).clone()
    }

    pub fn shared_state(&self) -> SharedTrainingState {
        Arc::clone(&self.inner.state)
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner.state).loading
    }

    /// Warm-up and repeating timers currently alive.  Never more than one.
    pub fn live_timers(&self) -> usize {
        lock(&self.inner.session)
            .as_ref()
            .map_or(0, Session::live_timers)
    }

    /// Config of the running session, if any.
    pub fn session(&self) -> Option<SessionConfig> {
        lock(&self.inner.session).as_ref().map(|s| s.config.clone())
    }
}

impl Drop for TrainingScheduler {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
