//! Lull Audio Player (lull-ap) - Main entry point
//!
//! Headless host for the ambient mixer: resolves configuration, builds the
//! playback coordinator over the in-process loop mixer, and drives it from a
//! line-oriented command shell on stdin.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lull_ap::audio::{ClipEngine, LoopMixer};
use lull_ap::config::MixConfig;
use lull_ap::observability::TracingSink;
use lull_ap::persistence::JsonFileStore;
use lull_ap::playback::{CoordinatorDeps, PlaybackCoordinator, RouteNotification, TimerMode};
use lull_ap::shell::{parse_command, Command, ConsoleRemote, HeadlessRoute, HELP};
use lull_common::config::{CompiledDefaults, RootFolderResolver, TomlConfig};
use lull_common::events::EventBus;
use lull_common::human_time::format_timer_label;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Render block size in frames for the headless clock
const RENDER_FRAMES: usize = 1024;

/// Command-line arguments for lull-ap
#[derive(Parser, Debug)]
#[command(name = "lull-ap")]
#[command(about = "Ambient multi-channel mixer with sleep timer")]
#[command(version)]
struct Args {
    /// Bootstrap config file (defaults to the platform config location)
    #[arg(short, long, env = "LULL_CONFIG")]
    config: Option<PathBuf>,

    /// Mix configuration (channel catalog and player settings)
    #[arg(short, long, env = "LULL_MIX")]
    mix: Option<PathBuf>,

    /// Root folder containing channel audio assets
    #[arg(short, long, env = "LULL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Preferences file
    #[arg(short, long, env = "LULL_PREFERENCES")]
    preferences: Option<PathBuf>,

    /// Arm a sleep timer at startup (minutes)
    #[arg(short, long)]
    timer_minutes: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_or_default(args.config.as_deref());

    // Initialize tracing
    let default_filter = format!("lull_ap={},lull_common=info", toml_config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let defaults = CompiledDefaults::for_current_platform();
    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml_value(toml_config.root_folder.clone())
        .resolve();
    let preferences_path = args
        .preferences
        .clone()
        .or_else(|| toml_config.preferences_path.clone())
        .unwrap_or(defaults.preferences_path);
    let mix_path = args.mix.clone().or_else(|| toml_config.mix_path.clone());

    info!("Starting Lull Audio Player");
    info!("Root folder: {}", root_folder.display());
    info!("Preferences: {}", preferences_path.display());

    let mix = MixConfig::load_or_fallback(mix_path.as_deref());
    let mixer = Arc::new(LoopMixer::new(mix.player.mixer_sample_rate));
    let engine = Arc::new(ClipEngine::new(root_folder, Arc::clone(&mixer)));
    let route = Arc::new(HeadlessRoute::new());
    let remote = Arc::new(ConsoleRemote::new());

    let deps = CoordinatorDeps {
        engine,
        store: Arc::new(JsonFileStore::open(preferences_path)),
        route: route.clone(),
        remote: remote.clone(),
        observability: Arc::new(TracingSink),
        events: EventBus::new(256),
    };
    let coordinator =
        PlaybackCoordinator::new(mix, deps).context("Failed to initialize playback coordinator")?;
    coordinator.start();
    info!("Playback coordinator initialized");

    if let Some(minutes) = args.timer_minutes {
        let mode = TimerMode::from_minutes(minutes);
        if let Err(e) = coordinator.set_timer(mode) {
            warn!("Startup timer rejected: {}", e);
        }
    }

    let stop = CancellationToken::new();
    let clock = tokio::spawn(render_clock(Arc::clone(&mixer), stop.clone()));

    println!("{}", HELP);
    tokio::select! {
        _ = command_loop(&coordinator, &route, &remote) => {}
        _ = shutdown_signal() => {}
    }

    stop.cancel();
    coordinator.shutdown().await;
    if let Err(e) = clock.await {
        error!("Render clock failed: {}", e);
    }
    info!("Lull Audio Player stopped");
    Ok(())
}

/// Pull mixed blocks at the device rate so voices advance in real time
async fn render_clock(mixer: Arc<LoopMixer>, stop: CancellationToken) {
    let rate = mixer.sample_rate().max(1);
    let period = Duration::from_secs_f64(RENDER_FRAMES as f64 / rate as f64);
    let mut buffer = vec![0.0f32; RENDER_FRAMES * lull_ap::audio::decoder::OUTPUT_CHANNELS as usize];
    let mut interval = tokio::time::interval(period);
    let mut blocks: u64 = 0;

    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = interval.tick() => {}
        }
        let peak = mixer.render(&mut buffer);
        blocks += 1;
        // Roughly every five seconds
        if blocks % (5 * rate as u64 / RENDER_FRAMES as u64).max(1) == 0 {
            debug!(
                voices = mixer.playing_count(),
                peak = f64::from(peak),
                "Mixer level"
            );
        }
    }
}

async fn command_loop(
    coordinator: &Arc<PlaybackCoordinator>,
    route: &HeadlessRoute,
    remote: &ConsoleRemote,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to read command: {}", e);
                return;
            }
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{} (type 'help')", e);
                continue;
            }
        };

        match command {
            Command::Toggle => {
                let state = coordinator.toggle();
                println!("{}", state);
            }
            Command::Play => {
                if let Err(e) = coordinator.play_all(Some(coordinator.settings().fade_in())).await {
                    println!("play failed: {}", e);
                }
            }
            Command::Pause => {
                if let Err(e) = coordinator.pause_all(Some(coordinator.settings().fade_out())).await {
                    println!("pause failed: {}", e);
                }
            }
            Command::Volume { channel_id, volume } => {
                match coordinator.set_channel_volume(&channel_id, volume).await {
                    Ok(stored) => println!("{} volume {:.2}", channel_id, stored),
                    Err(e) => println!("{}", e),
                }
            }
            Command::Variant {
                channel_id,
                variant,
            } => {
                if let Err(e) = coordinator.change_channel_variant(&channel_id, &variant).await {
                    println!("{}", e);
                }
            }
            Command::Timer(mode) => match coordinator.set_timer(mode) {
                Ok(()) => match (mode.seconds(), coordinator.timer_display_text()) {
                    (None, _) => println!("timer off"),
                    (Some(_), Some(text)) => println!("timer running: {}", text),
                    (Some(seconds), None) => {
                        println!("timer armed: {}", format_timer_label(seconds))
                    }
                },
                Err(e) => println!("{}", e),
            },
            Command::Remote(action) => {
                if !remote.press(action) {
                    println!("remote surface not registered");
                }
            }
            Command::Background => coordinator.enter_background().await,
            Command::Foreground => coordinator.enter_foreground().await,
            Command::Interrupt => route.simulate(RouteNotification::InterruptionBegan),
            Command::Resume { should_resume } => {
                route.simulate(RouteNotification::InterruptionEnded { should_resume })
            }
            Command::Status => match serde_json::to_string_pretty(&coordinator.status()) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to serialize status: {}", e),
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => return,
        }
    }
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
