//! Application entry point: dance trainer CLI.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Open the catalog and the music store under the data directory.
//! 4. Run the requested subcommand.  `train`, `say` and `music play` build a
//!    tokio runtime (multi-thread, 2 workers) and the audio engines they need.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use dance_trainer::{
    audio::{AudioPlayer, CpalSpeechPlayer, MusicPlayer, RodioMusicPlayer},
    catalog::{Catalog, Difficulty, DifficultyFilter, ElementDraft, SharedCatalog, SortOrder},
    config::{AppConfig, TtsConfig},
    media::{FsMediaStore, MediaStore, MusicLibrary, TrackFilter, TrackSort},
    speech::{GeminiSynthesizer, SpeechSynthesizer, UnconfiguredSynthesizer},
    training::{
        ElementSelection, SessionConfig, TrainingEvent, TrainingPhase, TrainingScheduler,
    },
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(author, version, about = "Dance practice trainer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List dances and their elements.
    Dances {
        #[arg(long, value_enum, default_value_t = ElementOrder::Default)]
        sort: ElementOrder,
        /// Only show elements of this difficulty (easy, medium, hard).
        #[arg(long)]
        difficulty: Option<Difficulty>,
    },
    /// Add a dance to the library.
    AddDance { name: String },
    /// Add an element to a dance.
    AddElement {
        dance: String,
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = Difficulty::Easy)]
        difficulty: Difficulty,
    },
    /// Change an element; omitted fields keep their value.
    EditElement {
        dance: String,
        element: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        difficulty: Option<Difficulty>,
    },
    /// Remove an element from a dance.
    DeleteElement { dance: String, element: String },
    /// Manage the music library.
    Music {
        #[command(subcommand)]
        command: MusicCommands,
    },
    /// Run a training session until Ctrl+C (or `--duration` elapses).
    Train {
        /// Dance id; defaults to the first dance.
        #[arg(long)]
        dance: Option<String>,
        /// Music track id; defaults to the first track linked to the dance.
        #[arg(long)]
        music: Option<String>,
        /// Comma-separated element ids.
        #[arg(long, value_delimiter = ',')]
        elements: Vec<String>,
        /// Select every element visible under `--difficulty`.
        #[arg(long)]
        all: bool,
        #[arg(long)]
        difficulty: Option<Difficulty>,
        /// Seconds between announcements.
        #[arg(long, allow_negative_numbers = true)]
        interval: Option<i64>,
        /// Stop automatically after this many seconds.
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Speak a phrase through the configured voice.
    Say { text: String },
    /// Write the current settings (defaults on first run) to settings.toml.
    InitConfig,
}

#[derive(Subcommand, Debug)]
enum MusicCommands {
    /// List tracks.
    List {
        /// Only tracks linked to this dance id.
        #[arg(long)]
        dance: Option<String>,
        #[arg(long, value_enum, default_value_t = TrackOrder::Name)]
        sort: TrackOrder,
    },
    /// Import an audio file.
    Add {
        path: PathBuf,
        /// Link the track to a dance id.
        #[arg(long)]
        dance: Option<String>,
    },
    /// Delete a track by id.
    Delete { id: String },
    /// Play a stored track until it ends or Ctrl+C is pressed.
    Play { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ElementOrder {
    Default,
    Asc,
    Desc,
}

impl From<ElementOrder> for SortOrder {
    fn from(order: ElementOrder) -> Self {
        match order {
            ElementOrder::Default => SortOrder::Default,
            ElementOrder::Asc => SortOrder::DifficultyAsc,
            ElementOrder::Desc => SortOrder::DifficultyDesc,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TrackOrder {
    Name,
    Dance,
}

impl From<TrackOrder> for TrackSort {
    fn from(order: TrackOrder) -> Self {
        match order {
            TrackOrder::Name => TrackSort::Name,
            TrackOrder::Dance => TrackSort::Dance,
        }
    }
}

fn difficulty_filter(difficulty: Option<Difficulty>) -> DifficultyFilter {
    difficulty.map_or(DifficultyFilter::All, DifficultyFilter::Only)
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = config.paths();

    // 3. Storage
    let mut catalog = Catalog::load_from(&paths.catalog_file);
    let store: Arc<dyn MediaStore> = Arc::new(
        FsMediaStore::open(&paths.music_dir)
            .with_context(|| format!("opening music store at {}", paths.music_dir.display()))?,
    );
    let mut library = MusicLibrary::open(Arc::clone(&store))?;

    // 4. Subcommand
    match cli.command {
        Commands::Dances { sort, difficulty } => {
            let filter = difficulty_filter(difficulty);
            for dance in catalog.dances() {
                println!("{}  {} ({} elements)", dance.id, dance.name, dance.elements.len());
                for element in dance
                    .sorted_elements(sort.into())
                    .into_iter()
                    .filter(|e| filter.matches(e))
                {
                    println!(
                        "    [{:<6}] {:<12} {}  {}",
                        element.difficulty.label(),
                        element.id,
                        element.name,
                        element.description
                    );
                }
            }
        }

        Commands::AddDance { name } => match catalog.add_dance(&name) {
            Some(id) => println!("added dance {id}"),
            None => bail!("dance name must not be empty"),
        },

        Commands::AddElement {
            dance,
            name,
            description,
            difficulty,
        } => {
            let draft = ElementDraft {
                name,
                description,
                difficulty,
                video: None,
            };
            match catalog.add_element(&dance, draft) {
                Some(id) => println!("added element {id}"),
                None => bail!("unknown dance '{dance}' or empty element name"),
            }
        }

        Commands::EditElement {
            dance,
            element,
            name,
            description,
            difficulty,
        } => {
            let current = catalog
                .element(&dance, &element)
                .cloned()
                .with_context(|| format!("no element '{element}' in dance '{dance}'"))?;
            let draft = ElementDraft {
                name: name.unwrap_or(current.name),
                description: description.unwrap_or(current.description),
                difficulty: difficulty.unwrap_or(current.difficulty),
                video: None,
            };
            if !catalog.edit_element(&dance, &element, draft) {
                bail!("element name must not be empty");
            }
            println!("updated {element}");
        }

        Commands::DeleteElement { dance, element } => {
            if !catalog.delete_element(&dance, &element) {
                bail!("no element '{element}' in dance '{dance}'");
            }
            println!("deleted {element}");
        }

        Commands::Music { command } => run_music(&config, command, &mut library, &catalog)?,

        Commands::Train {
            dance,
            music,
            elements,
            all,
            difficulty,
            interval,
            duration,
        } => {
            let mut selection =
                ElementSelection::new(&catalog, config.training.default_interval_secs);
            if let Some(dance) = &dance {
                selection.select_dance(dance);
            }
            if selection.reconcile(&catalog) {
                log::warn!(
                    "unknown dance '{}', using '{}'",
                    dance.as_deref().unwrap_or_default(),
                    selection.dance_id().unwrap_or_default()
                );
            }
            selection.set_filter(difficulty_filter(difficulty));
            if all {
                selection.select_all(&catalog);
            }
            for id in &elements {
                if !selection.is_selected(id) {
                    selection.toggle(id);
                }
            }
            if let Some(secs) = interval {
                selection.set_interval_secs(secs);
            }
            let music = music.or_else(|| {
                let dance_id = selection.dance_id()?;
                library
                    .tracks()
                    .iter()
                    .find(|t| t.dance_id.as_deref() == Some(dance_id))
                    .map(|t| t.id.clone())
            });
            selection.set_music(music);

            let session = selection
                .session_config()
                .context("the catalog has no dances")?;
            let catalog = catalog.into_shared();
            let runtime = build_runtime()?;
            runtime.block_on(train(
                &config,
                catalog,
                store,
                session,
                duration.map(Duration::from_secs),
            ))?;
        }

        Commands::Say { text } => {
            let runtime = build_runtime()?;
            runtime.block_on(say(&config, &text))?;
        }

        Commands::InitConfig => {
            config.save()?;
            println!("wrote {}", paths.settings_file.display());
        }
    }

    Ok(())
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}

fn run_music(
    config: &AppConfig,
    command: MusicCommands,
    library: &mut MusicLibrary,
    catalog: &Catalog,
) -> Result<()> {
    match command {
        MusicCommands::List { dance, sort } => {
            let filter = dance.map_or(TrackFilter::All, TrackFilter::Dance);
            for track in library.view(&filter, sort.into(), catalog) {
                let dance_name = track
                    .dance_id
                    .as_deref()
                    .and_then(|id| catalog.dance(id))
                    .map(|d| d.name.as_str())
                    .unwrap_or("-");
                println!("{}  {}  ({})", track.id, track.name, dance_name);
            }
        }
        MusicCommands::Add { path, dance } => {
            if let Some(id) = &dance {
                if catalog.dance(id).is_none() {
                    bail!("unknown dance '{id}'");
                }
            }
            let track = library.import_file(&path, dance)?;
            println!("added {} as {}", track.name, track.id);
        }
        MusicCommands::Delete { id } => {
            library.remove_track(&id)?;
            println!("deleted {id}");
        }
        MusicCommands::Play { id } => {
            if library.store().get(&id)?.is_none() {
                println!("nothing to play: no track '{id}'");
                return Ok(());
            }
            let player = RodioMusicPlayer::spawn(config.audio.music_volume)
                .context("music output unavailable")?;
            let Some(track) = library.preview(&id, &player)? else {
                println!("nothing to play: no track '{id}'");
                return Ok(());
            };
            println!("playing {}, press Ctrl+C to stop", track.name);
            let runtime = build_runtime()?;
            runtime.block_on(wait_for_music(&player));
            player.pause();
            println!("stopped");
        }
    }
    Ok(())
}

/// Resolves on Ctrl+C or once the player runs out of audio.
async fn wait_for_music(player: &dyn MusicPlayer) {
    let mut poll = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = poll.tick() => {
                if !player.is_playing() {
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

fn build_synthesizer(config: &TtsConfig) -> Arc<dyn SpeechSynthesizer> {
    match GeminiSynthesizer::from_config(config) {
        Ok(synth) => Arc::new(synth),
        Err(e) => {
            log::warn!("{e}. Announcements will fail until a key is configured.");
            Arc::new(UnconfiguredSynthesizer::new(config.api_key_env.clone()))
        }
    }
}

async fn train(
    config: &AppConfig,
    catalog: SharedCatalog,
    store: Arc<dyn MediaStore>,
    session: SessionConfig,
    duration: Option<Duration>,
) -> Result<()> {
    let music = Arc::new(
        RodioMusicPlayer::spawn(config.audio.music_volume).context("music output unavailable")?,
    );
    let player = Arc::new(CpalSpeechPlayer::new(
        config.audio.output_device.clone(),
        config.audio.speech_volume,
    ));
    let scheduler = TrainingScheduler::new(
        catalog,
        store,
        build_synthesizer(&config.tts),
        player,
        music,
        config.training.clone(),
    );

    let mut events = scheduler.subscribe();
    scheduler.start(session)?;
    println!(
        "warm-up: {} s, press Ctrl+C to stop",
        config.training.warmup_secs
    );

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(TrainingEvent::PhaseChanged(TrainingPhase::Active)) => println!("go!"),
                Some(TrainingEvent::PhaseChanged(_)) => {}
                Some(TrainingEvent::Announcing { name, .. }) => println!("> {name}"),
                Some(TrainingEvent::AnnouncementFailed { message, .. }) => eprintln!("! {message}"),
                Some(_) => {}
                None => break,
            },
        }
    }

    scheduler.stop();
    println!("stopped");
    Ok(())
}

async fn say(config: &AppConfig, text: &str) -> Result<()> {
    let synth = build_synthesizer(&config.tts);
    let player = CpalSpeechPlayer::new(config.audio.output_device.clone(), config.audio.speech_volume);

    let audio = synth.synthesize(text).await?;
    let buffer = player.decode(&audio.pcm, audio.sample_rate, audio.channels)?;
    log::info!("playing {:.1} s of speech", buffer.duration().as_secs_f32());
    player.play(buffer).await?;
    Ok(())
}
