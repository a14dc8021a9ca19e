use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use playerbridge::engine::{EngineFactory, SimulatedEngineFactory, SimulationScript};
use playerbridge::utils::{self, format_duration, Config};
use playerbridge::view::{EventKind, PlayerView, VideoEvent};
use playerbridge::wrapper::{PlayerDelegate, PlayerWrapper, WrapperState};
use playerbridge::{BridgeError, LoadState};

/// playerbridge demo - drive the bridge against the simulated engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source URL to play
    #[arg(value_name = "URL", default_value = "https://live.example/stream.m3u8")]
    url: String,

    /// Use the imperative facade instead of the view adapter
    #[arg(long)]
    facade: bool,

    /// Apply the low-latency configuration before loading
    #[arg(long)]
    low_latency: bool,

    /// Simulated media length in seconds (0 plays a live stream)
    #[arg(long, value_name = "SECONDS", default_value = "10")]
    media_seconds: u64,

    /// Simulate one stall at this position
    #[arg(long, value_name = "SECONDS")]
    stall_at: Option<u64>,

    /// Host fragments the simulated engine cannot reach
    #[arg(long, value_name = "HOST")]
    unreachable: Vec<String>,

    /// Stop after this many seconds
    #[arg(short, long, default_value = "15")]
    seconds: u64,

    /// Set initial volume (0-100)
    #[arg(short, long, value_name = "VOLUME")]
    volume: Option<u8>,

    /// Configuration file (defaults to the system and user files)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

const PUMP_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path).with_context(|| format!("loading {}", path.display()))?,
        None => utils::load_config().context("loading configuration")?,
    };

    // Initialize logging
    let log_level = if args.debug { "debug" } else { config.general.log_level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting playerbridge demo v{}", env!("CARGO_PKG_VERSION"));

    let script = SimulationScript {
        media_duration: (args.media_seconds > 0).then(|| Duration::from_secs(args.media_seconds)),
        stall_at: args.stall_at.map(Duration::from_secs),
        unreachable: args.unreachable.clone(),
        ..SimulationScript::default()
    };
    let factory: Arc<dyn EngineFactory> = Arc::new(SimulatedEngineFactory::new(script));
    let run_for = Duration::from_secs(args.seconds);

    if args.facade {
        run_facade(factory, config, &args, run_for).await
    } else {
        run_view(factory, config, &args, run_for).await
    }
}

async fn run_view(factory: Arc<dyn EngineFactory>, config: Config, args: &Args, run_for: Duration) -> Result<()> {
    let finished = Arc::new(AtomicBool::new(false));
    let mut view = PlayerView::new(factory, config);

    for kind in EventKind::ALL {
        let finished = Arc::clone(&finished);
        view.on(kind, move |event| {
            log_event(event);
            if matches!(event, VideoEvent::End | VideoEvent::Error(_)) {
                finished.store(true, Ordering::SeqCst);
            }
        });
    }

    if let Some(volume) = args.volume {
        view.set_volume(volume as f32 / 100.0);
    }
    if args.low_latency {
        view.setup_low_latency_configuration();
    }
    view.set_source(&args.url);

    let mut ticker = tokio::time::interval(PUMP_INTERVAL);
    let deadline = tokio::time::sleep(run_for);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(deadline, ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                view.pump();
                if finished.load(Ordering::SeqCst) {
                    break;
                }
            }
            _ = &mut deadline => {
                info!("Run time elapsed");
                break;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!("Stopping at {}", format_duration(view.current_playback_time()));
    view.stop();
    view.pump();
    Ok(())
}

async fn run_facade(factory: Arc<dyn EngineFactory>, config: Config, args: &Args, run_for: Duration) -> Result<()> {
    if args.low_latency || args.volume.is_some() {
        warn!("--low-latency and --volume only apply to the view adapter");
    }

    let delegate = Arc::new(LoggingDelegate::default());
    let weak: Weak<dyn PlayerDelegate> = Arc::downgrade(&delegate) as Weak<dyn PlayerDelegate>;
    let mut player = PlayerWrapper::with_config(factory, config, weak);
    player.setup_player_with_url(&args.url)?;

    let mut ticker = tokio::time::interval(PUMP_INTERVAL);
    let deadline = tokio::time::sleep(run_for);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(deadline, ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                player.pump();
                if player.state() == WrapperState::Ready {
                    player.play()?;
                }
                if matches!(player.state(), WrapperState::Failed | WrapperState::Stopped) {
                    break;
                }
            }
            _ = &mut deadline => {
                info!("Run time elapsed");
                break;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    info!("Facade finished in state {}", player.state());
    player.shutdown()?;
    Ok(())
}

fn log_event(event: &VideoEvent) {
    match event {
        VideoEvent::Progress { current_time, .. } => {
            // Log progress at debug level to avoid spam
            let position = utils::duration_from_secs(*current_time).unwrap_or_default();
            debug!("{} {}", event.kind(), format_duration(position));
        }
        VideoEvent::Error(payload) => error!("{} [{}] {}", event.kind(), payload.code, payload.message),
        _ => info!("{} {}", event.kind(), event.body()),
    }
}

/// Delegate that logs facade callbacks
#[derive(Default)]
struct LoggingDelegate {
    started: AtomicBool,
}

impl PlayerDelegate for LoggingDelegate {
    fn player_did_prepare(&self) {
        info!("Player prepared");
    }

    fn player_did_start(&self) {
        if !self.started.swap(true, Ordering::SeqCst) {
            info!("Playback started");
        }
    }

    fn player_did_fail(&self, error: &BridgeError) {
        error!("Player failed: {}", error);
    }

    fn player_load_state_changed(&self, state: LoadState) {
        debug!("Load state: {:?}", state);
    }
}
