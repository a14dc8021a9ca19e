//! Integration test utilities for playerbridge
//!
//! Provides:
//! - Event recording for a view with every slot bound
//! - A delegate that records facade callbacks
//! - Fast simulation scripts
//! - Polling helpers that pump an owner until a condition holds

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use playerbridge::engine::{SimulatedEngineFactory, SimulationScript};
use playerbridge::utils::Config;
use playerbridge::{BridgeError, ErrorKind, EventKind, LoadState, PlayerDelegate, PlayerView, PlayerWrapper, VideoEvent};

pub const LIVE_URL: &str = "https://live.example/stream.m3u8";
pub const VOD_URL: &str = "https://vod.example/movie.mp4";
pub const UNREACHABLE_URL: &str = "https://offline.example/stream.m3u8";

/// Default time budget for polling helpers
pub const WAIT: Duration = Duration::from_secs(5);

/// Records every event a view delivers
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<VideoEvent>>>,
}

impl EventRecorder {
    /// Bind a recorder to every event slot of `view`
    pub fn attach(view: &mut PlayerView) -> Self {
        let recorder = Self::default();
        for kind in EventKind::ALL {
            let events = Arc::clone(&recorder.events);
            view.on(kind, move |event| events.lock().push(event.clone()));
        }
        recorder
    }

    pub fn events(&self) -> Vec<VideoEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(VideoEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.count(kind) > 0
    }

    /// Kinds of every reported error, in order
    pub fn error_kinds(&self) -> Vec<ErrorKind> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                VideoEvent::Error(payload) => Some(payload.kind),
                _ => None,
            })
            .collect()
    }

    /// `currentTime` of every progress event, in order
    pub fn progress_positions(&self) -> Vec<f64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                VideoEvent::Progress { current_time, .. } => Some(*current_time),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// One recorded delegate callback
#[derive(Debug, Clone, PartialEq)]
pub enum DelegateCall {
    Prepared,
    Started,
    Failed(ErrorKind),
    LoadState(LoadState),
}

/// Delegate that records every callback it receives
#[derive(Default)]
pub struct RecordingDelegate {
    calls: Mutex<Vec<DelegateCall>>,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Weak handle to give to a facade
    pub fn weak(self: &Arc<Self>) -> Weak<dyn PlayerDelegate> {
        let delegate: Arc<dyn PlayerDelegate> = Arc::clone(self) as Arc<dyn PlayerDelegate>;
        Arc::downgrade(&delegate)
    }

    pub fn calls(&self) -> Vec<DelegateCall> {
        self.calls.lock().clone()
    }

    /// Calls other than load state changes
    pub fn outcomes(&self) -> Vec<DelegateCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| !matches!(c, DelegateCall::LoadState(_)))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl PlayerDelegate for RecordingDelegate {
    fn player_did_prepare(&self) {
        self.calls.lock().push(DelegateCall::Prepared);
    }

    fn player_did_start(&self) {
        self.calls.lock().push(DelegateCall::Started);
    }

    fn player_did_fail(&self, error: &BridgeError) {
        self.calls.lock().push(DelegateCall::Failed(error.kind()));
    }

    fn player_load_state_changed(&self, state: LoadState) {
        self.calls.lock().push(DelegateCall::LoadState(state));
    }
}

/// Simulation scripts tuned for short test runs
pub mod scripts {
    use super::*;

    /// Video on demand of the given length
    pub fn vod(length: Duration) -> SimulationScript {
        SimulationScript {
            prepare_delay: Duration::from_millis(10),
            media_duration: Some(length),
            unreachable: vec!["offline.example".to_string()],
            tick: Duration::from_millis(5),
            ..SimulationScript::default()
        }
    }

    /// Endless live stream
    pub fn live() -> SimulationScript {
        SimulationScript {
            media_duration: None,
            ..vod(Duration::ZERO)
        }
    }

    /// Live stream that stalls once
    pub fn stalling_live(at: Duration, stall_for: Duration) -> SimulationScript {
        SimulationScript {
            stall_at: Some(at),
            stall_for,
            ..live()
        }
    }
}

pub fn simulated(script: SimulationScript) -> Arc<SimulatedEngineFactory> {
    Arc::new(SimulatedEngineFactory::new(script))
}

/// Configuration with a fast progress cadence
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.progress.interval_ms = 20;
    config
}

/// Anything with a run-loop hook
pub trait Pump {
    fn pump(&mut self) -> usize;
}

impl Pump for PlayerView {
    fn pump(&mut self) -> usize {
        PlayerView::pump(self)
    }
}

impl Pump for PlayerWrapper {
    fn pump(&mut self) -> usize {
        PlayerWrapper::pump(self)
    }
}

/// Pump `owner` until `done` holds or `timeout` passes
///
/// Returns whether the condition was met.
pub async fn pump_until<P, F>(owner: &mut P, timeout: Duration, mut done: F) -> bool
where
    P: Pump,
    F: FnMut(&P) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        owner.pump();
        if done(owner) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Pump `owner` for a fixed wall-clock period
pub async fn pump_for<P: Pump>(owner: &mut P, period: Duration) {
    pump_until(owner, period, |_| false).await;
}
