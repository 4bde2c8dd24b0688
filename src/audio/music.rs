//! Background music via `rodio`.
//!
//! The rodio output stream lives on its own thread.  [`RodioMusicPlayer`]
//! talks to it over a command channel so the handle itself is
//! `Send + Sync` and can be shared with the scheduler.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rodio::{Decoder, OutputStreamBuilder, Sink};

use super::pcm::PlaybackError;
use crate::media::MusicTrack;

/// How often the audio thread refreshes the `is_playing` flag when idle.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// MusicPlayer trait
// ---------------------------------------------------------------------------

/// Controls the single background music track.
pub trait MusicPlayer: Send + Sync {
    /// Replace whatever is playing with `track`, from the beginning.
    fn play(&self, track: &MusicTrack) -> Result<(), PlaybackError>;

    /// Pause playback.  Calling it when nothing plays is a no-op.
    fn pause(&self);

    fn is_playing(&self) -> bool;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn MusicPlayer>) {}
};

// ---------------------------------------------------------------------------
// RodioMusicPlayer
// ---------------------------------------------------------------------------

enum Command {
    Play {
        bytes: Vec<u8>,
        reply: mpsc::Sender<Result<(), PlaybackError>>,
    },
    Pause,
    Shutdown,
}

pub struct RodioMusicPlayer {
    tx: mpsc::Sender<Command>,
    playing: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RodioMusicPlayer {
    /// Open the default output device on a dedicated thread.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoDevice`] when rodio cannot open a stream.
    pub fn spawn(volume: f32) -> Result<Self, PlaybackError> {
        let (tx, rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), PlaybackError>>();
        let playing = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&playing);
        let volume = volume.clamp(0.0, 2.0);

        let thread = std::thread::Builder::new()
            .name("music-output".into())
            .spawn(move || audio_thread(rx, ready_tx, flag, volume))
            .map_err(|e| PlaybackError::Output(format!("failed to spawn audio thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                tx,
                playing,
                thread: Mutex::new(Some(thread)),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(PlaybackError::Disconnected)
            }
        }
    }
}

fn audio_thread(
    rx: mpsc::Receiver<Command>,
    ready: mpsc::Sender<Result<(), PlaybackError>>,
    playing: Arc<AtomicBool>,
    volume: f32,
) {
    let mut stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => stream,
        Err(e) => {
            log::warn!("music: no output stream: {e}");
            let _ = ready.send(Err(PlaybackError::NoDevice));
            return;
        }
    };
    stream.log_on_drop(false);
    let _ = ready.send(Ok(()));

    let mut sink: Option<Sink> = None;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Command::Play { bytes, reply }) => {
                // Dropping the old sink stops it.
                sink = None;
                let result = decode(bytes).map(|source| {
                    let next = Sink::connect_new(stream.mixer());
                    next.set_volume(volume);
                    next.append(source);
                    next.play();
                    sink = Some(next);
                });
                let _ = reply.send(result);
            }
            Ok(Command::Pause) => {
                if let Some(s) = &sink {
                    s.pause();
                }
            }
            Ok(Command::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        let now_playing = sink.as_ref().is_some_and(|s| !s.is_paused() && !s.empty());
        playing.store(now_playing, Ordering::SeqCst);
    }

    playing.store(false, Ordering::SeqCst);
    log::debug!("music: audio thread exiting");
}

fn decode(bytes: Vec<u8>) -> Result<Decoder<Cursor<Vec<u8>>>, PlaybackError> {
    let byte_len = bytes.len() as u64;
    Decoder::builder()
        .with_data(Cursor::new(bytes))
        .with_byte_len(byte_len)
        .with_seekable(true)
        .build()
        .map_err(|e| PlaybackError::Decode(e.to_string()))
}

impl MusicPlayer for RodioMusicPlayer {
    fn play(&self, track: &MusicTrack) -> Result<(), PlaybackError> {
        let (reply, result) = mpsc::channel();
        self.tx
            .send(Command::Play {
                bytes: track.blob.clone(),
                reply,
            })
            .map_err(|_| PlaybackError::Disconnected)?;
        result.recv().map_err(|_| PlaybackError::Disconnected)??;
        self.playing.store(true, Ordering::SeqCst);
        log::info!("music: playing '{}'", track.metadata.name);
        Ok(())
    }

    fn pause(&self) {
        if self.tx.send(Command::Pause).is_ok() {
            self.playing.store(false, Ordering::SeqCst);
        }
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl Drop for RodioMusicPlayer {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Ok(mut slot) = self.thread.lock() {
            if let Some(handle) = slot.take() {
                let _ = handle.join();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockMusicPlayer (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod mock {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Default)]
    pub struct MockMusicPlayer {
        playing: AtomicBool,
        started: Mutex<Vec<String>>,
        pauses: AtomicUsize,
        fail: bool,
    }

    impl MockMusicPlayer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Ids of every track passed to `play`, in order.
        pub fn started(&self) -> Vec<String> {
            self.started.lock().unwrap().clone()
        }

        pub fn pauses(&self) -> usize {
            self.pauses.load(Ordering::SeqCst)
        }
    }

    impl MusicPlayer for MockMusicPlayer {
        fn play(&self, track: &MusicTrack) -> Result<(), PlaybackError> {
            if self.fail {
                return Err(PlaybackError::Decode("mock: not an audio file".into()));
            }
            self.started.lock().unwrap().push(track.metadata.id.clone());
            self.playing.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            self.playing.store(false, Ordering::SeqCst);
        }

        fn is_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
pub use mock::MockMusicPlayer;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MusicTrackMetadata;

    fn track() -> MusicTrack {
        MusicTrack {
            metadata: MusicTrackMetadata {
                id: "music-1".into(),
                name: "salsa.mp3".into(),
                dance_id: None,
            },
            blob: vec![0, 1, 2, 3],
        }
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            decode(b"definitely not audio".to_vec()),
            Err(PlaybackError::Decode(_))
        ));
    }

    #[test]
    fn mock_tracks_play_and_pause() {
        let player = MockMusicPlayer::new();
        assert!(!player.is_playing());
        player.play(&track()).unwrap();
        assert!(player.is_playing());
        player.pause();
        player.pause();
        assert!(!player.is_playing());
        assert_eq!(player.started(), ["music-1"]);
        assert_eq!(player.pauses(), 2);
    }

    /// Only meaningful on machines with an audio device; otherwise the
    /// player reports `NoDevice` and the test has nothing to check.
    #[test]
    fn rodio_player_rejects_undecodable_track() {
        let Ok(player) = RodioMusicPlayer::spawn(0.0) else {
            return;
        };
        assert!(player.play(&track()).is_err());
        assert!(!player.is_playing());
        player.pause();
    }
}
