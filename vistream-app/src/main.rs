mod bridge;
mod commands;
mod terminal;

use crate::bridge::{log_carousel_effects, log_playback_events, render_loading_bar};
use crate::commands::{Command, HELP};
use crate::terminal::{ReadyState, TerminalVideo};
use std::fs::File;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vistream_core::{
    format_video_duration, CarouselHandle, CarouselInput, CoreError, LoadingBar, MediaEvent,
    MemoryRouter, NavigateOptions, NavigateWithLoading, NavigationTrigger, PlaybackHandle,
    Router, SourceProbe, VistreamConfig,
};
use vistream_probe_http::{HttpProbeConfig, HttpSourceProbe, HTTP_PROBE_CONFIG_TEMPLATE};

/// Titles of the featured carousel slides
const FEATURED: &[&str] = &["Solo Leveling", "Chainsaw Man", "One Piece"];

/// Handles shared by the command loop
struct Session {
    loading_bar: Arc<LoadingBar>,
    router: Arc<MemoryRouter>,
    navigator: NavigateWithLoading,
    playback: PlaybackHandle,
    ready_state: ReadyState,
    carousel: CarouselHandle,
}

fn main() {
    // Check config for logging.enabled before full config load
    let file_logging_enabled = check_file_logging_enabled();
    init_tracing(file_logging_enabled);

    // Load config or create template on first run
    let probe_templates: &[&str] = &[HTTP_PROBE_CONFIG_TEMPLATE];
    let config = match VistreamConfig::load_or_create(Some(probe_templates)) {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            info!(
                "Created a config template at {}, continuing with defaults",
                path.display()
            );
            VistreamConfig::default()
        }
        Err(CoreError::ConfigParseError(parse_error)) => {
            error!(
                "Config file {} has a syntax error: {parse_error}",
                VistreamConfig::config_path().display()
            );
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let probe = match create_probe(&config) {
        Ok(probe) => probe,
        Err(e) => {
            error!("Failed to create source probe: {e}");
            std::process::exit(1);
        }
    };

    // Create tokio runtime for background tasks
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Set up Ctrl+C handler to trigger graceful shutdown
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    if let Err(e) = runtime.block_on(run(config, probe, cancel_token)) {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(
    config: VistreamConfig,
    probe: Arc<dyn SourceProbe>,
    cancel_token: CancellationToken,
) -> Result<(), CoreError> {
    let loading_bar = LoadingBar::new(config.loading_bar.clone(), Some(cancel_token.clone()));
    let router = MemoryRouter::new("/")?;

    let trigger = Arc::new(NavigationTrigger::new(
        loading_bar.clone(),
        router.clone(),
        Some(cancel_token.clone()),
    ));
    let navigator =
        NavigateWithLoading::new(loading_bar.clone(), router.clone(), &config.navigation);

    let ready_state = ReadyState::default();
    let playback = PlaybackHandle::spawn(
        TerminalVideo::new(ready_state.clone()),
        probe,
        config.playback.clone(),
        Some(cancel_token.clone()),
    );
    let carousel = CarouselHandle::spawn(
        FEATURED.len(),
        config.carousel.clone(),
        Some(cancel_token.clone()),
    );

    tokio::spawn(render_loading_bar(loading_bar.clone()));
    tokio::spawn(log_playback_events(playback.subscribe()));
    tokio::spawn(log_carousel_effects(carousel.subscribe(), FEATURED));
    let trigger_handle = trigger.start();

    let session = Session {
        loading_bar,
        router,
        navigator,
        playback,
        ready_state,
        carousel,
    };

    println!("{HELP}");
    read_commands(&session, &cancel_token).await;

    info!("Shutting down");
    cancel_token.cancel();
    let _ = trigger_handle.await;
    session.playback.close().await;
    session.carousel.close().await;
    Ok(())
}

/// Read commands from stdin until `quit`, EOF or cancellation
async fn read_commands(session: &Session, cancel_token: &CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = cancel_token.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        match Command::parse(line.trim()) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = execute(session, command).await {
                    warn!("{e}");
                }
            }
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }
}

async fn execute(session: &Session, command: Command) -> Result<(), CoreError> {
    match command {
        Command::Go { target, replace } => {
            let options = NavigateOptions {
                replace,
                state: None,
            };
            session.navigator.navigate(&target, options).await?;
        }
        Command::Back => {
            if !session.router.back().await {
                println!("Already at the first history entry");
            }
        }
        Command::Start => session.loading_bar.start_loading().await,
        Command::Progress(value) => session.loading_bar.update_progress(value).await,
        Command::Finish => session.loading_bar.finish_loading().await,
        Command::Watch(filename) => {
            session
                .navigator
                .navigate(&format!("/watch/{filename}"), NavigateOptions::default())
                .await?;
            session.playback.load(filename).await?;
        }
        Command::Media(event) => {
            if let MediaEvent::Progress {
                buffered_end,
                duration,
            } = &event
            {
                info!(
                    "Buffered {} of {}",
                    format_video_duration(*buffered_end),
                    format_video_duration(*duration)
                );
            }
            session.ready_state.observe(&event);
            session.playback.media_event(event).await?;
        }
        Command::Retry => session.playback.retry().await?,
        Command::Volume(level) => session.playback.set_volume(level).await?,
        Command::Mute => session.playback.toggle_mute().await?,
        Command::Carousel(input) => {
            if matches!(input, CarouselInput::SelectSlide(index) if index >= FEATURED.len()) {
                println!("There are only {} slides", FEATURED.len());
            }
            session.carousel.send(input).await?;
        }
        Command::Status => print_status(session).await,
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

async fn print_status(session: &Session) {
    let bar = session.loading_bar.state().await;
    let location = session.router.location().await;
    let playback = session.playback.state().await;
    let carousel = session.carousel.state().await;

    println!("route:    {location}");
    println!(
        "loading:  {} ({:.1}%)",
        if bar.is_loading { "visible" } else { "hidden" },
        bar.progress
    );
    println!(
        "playback: {:?} ({:.0}% loaded)",
        playback.status, playback.loading_progress
    );
    println!(
        "carousel: {} of {} ({:?})",
        carousel.current + 1,
        carousel.slide_count,
        carousel.trailer
    );
}

fn create_probe(config: &VistreamConfig) -> Result<Arc<dyn SourceProbe>, CoreError> {
    let probe_config = HttpProbeConfig::from_probes(&config.probe)?.unwrap_or_else(|| {
        info!("No [probe.http] section, using defaults");
        HttpProbeConfig::default()
    });

    info!("Probing video sources relative to {}", probe_config.base_url);
    Ok(Arc::new(HttpSourceProbe::new(&probe_config)?))
}

/// Check if file logging is enabled by reading the config file.
/// This is done before full config loading to set up tracing first.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled() -> bool {
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let config_path = VistreamConfig::config_path();
    let Ok(content) = std::fs::read_to_string(&config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with console output and optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest_retry=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = vistream_core::paths::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
