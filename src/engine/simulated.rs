//! Simulated engine
//!
//! Plays a scripted timeline on its own thread and reports through the same
//! notifier path a real engine would: prepare delay, optional connection
//! failure, first frame, an optional stall, and end of media for sources with
//! a known duration. There is no media I/O; the position is a wall clock
//! scaled by the playback rate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::dispatch::EngineNotifier;
use crate::engine::options::{uri_scheme, EngineOptions, OptionCategory, OptionValue};
use crate::engine::{
    BufferLimits, EngineEvent, EngineFactory, EnginePlaybackState, FinishReason, LoadState,
    PlayerEngine, ResizeMode,
};
use crate::utils::error::{BridgeError, Result};

const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "rtmp", "rtmps", "rtsp", "file"];
const MAX_RATE: f32 = 4.0;
const CONNECTION_REFUSED: i32 = -111;

/// Timeline the simulated engine plays
#[derive(Debug, Clone)]
pub struct SimulationScript {
    /// Time from `prepare_to_play` to `Prepared`
    pub prepare_delay: Duration,

    /// Media length, `None` plays as a live stream
    pub media_duration: Option<Duration>,

    /// Reported video size
    pub natural_size: (u32, u32),

    /// Sources containing any of these fragments fail after the prepare delay
    pub unreachable: Vec<String>,

    /// Position at which the engine stalls once
    pub stall_at: Option<Duration>,

    /// How long the stall lasts
    pub stall_for: Duration,

    /// Worker thread cadence
    pub tick: Duration,
}

impl Default for SimulationScript {
    fn default() -> Self {
        Self {
            prepare_delay: Duration::from_millis(20),
            media_duration: Some(Duration::from_secs(30)),
            natural_size: (1280, 720),
            unreachable: Vec::new(),
            stall_at: None,
            stall_for: Duration::from_millis(200),
            tick: Duration::from_millis(10),
        }
    }
}

impl SimulationScript {
    /// Script for an endless live stream
    pub fn live() -> Self {
        Self {
            media_duration: None,
            ..Self::default()
        }
    }
}

/// Factory producing [`SimulatedEngine`] handles
pub struct SimulatedEngineFactory {
    script: SimulationScript,
    created: Arc<AtomicUsize>,
}

impl SimulatedEngineFactory {
    pub fn new(script: SimulationScript) -> Self {
        Self {
            script,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of handles created so far
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EngineFactory for SimulatedEngineFactory {
    fn create(
        &self,
        uri: &str,
        options: &EngineOptions,
        notifier: EngineNotifier,
    ) -> Result<Box<dyn PlayerEngine>> {
        if uri.trim().is_empty() {
            return Err(BridgeError::source_open("empty source"));
        }

        match uri_scheme(uri) {
            Some(scheme) if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) => {
                return Err(BridgeError::source_open(format!("unsupported scheme '{}'", scheme)));
            }
            None if !uri.starts_with('/') => {
                return Err(BridgeError::source_open(format!("not a URL or absolute path: {}", uri)));
            }
            _ => {}
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        let mut engine = SimulatedEngine::new(uri, self.script.clone(), notifier);
        engine.apply_options(options)?;
        Ok(Box::new(engine))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Preparing,
    Prepared,
    Finished,
    Failed,
    Shutdown,
}

#[derive(Debug)]
struct Clock {
    base: Duration,
    started_at: Option<Instant>,
    rate: f32,
}

impl Clock {
    fn position(&self) -> Duration {
        match self.started_at {
            Some(at) => self.base + at.elapsed().mul_f32(self.rate),
            None => self.base,
        }
    }

    fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn halt(&mut self) {
        self.base = self.position();
        self.started_at = None;
    }

    fn set_position(&mut self, position: Duration) {
        self.base = position;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn set_rate(&mut self, rate: f32) {
        let running = self.started_at.is_some();
        self.halt();
        self.rate = rate;
        if running {
            self.start();
        }
    }
}

#[derive(Debug)]
struct Shared {
    phase: Phase,
    clock: Clock,
    playing: bool,
    auto_start: bool,
    stalled_until: Option<Instant>,
    stall_done: bool,
    first_frame_sent: bool,
    duration: Option<Duration>,
    volume: f32,
    muted: bool,
    resize_mode: ResizeMode,
    limits: BufferLimits,
    hardware_decoding: bool,
}

/// In-process engine handle driven by a [`SimulationScript`]
pub struct SimulatedEngine {
    uri: String,
    script: SimulationScript,
    notifier: EngineNotifier,
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SimulatedEngine {
    pub fn new(uri: &str, script: SimulationScript, notifier: EngineNotifier) -> Self {
        Self {
            uri: uri.to_string(),
            script,
            notifier,
            shared: Arc::new(Mutex::new(Shared {
                phase: Phase::Created,
                clock: Clock { base: Duration::ZERO, started_at: None, rate: 1.0 },
                playing: false,
                auto_start: false,
                stalled_until: None,
                stall_done: false,
                first_frame_sent: false,
                duration: None,
                volume: 1.0,
                muted: false,
                resize_mode: ResizeMode::default(),
                limits: BufferLimits::default(),
                hardware_decoding: false,
            })),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn invalid(&self, operation: &'static str) -> BridgeError {
        BridgeError::InvalidState {
            operation,
            state: format!("{:?}", self.shared.lock().phase).to_lowercase(),
        }
    }

    fn notify_all(&self, events: Vec<EngineEvent>) {
        for event in events {
            self.notifier.notify(event);
        }
    }
}

impl PlayerEngine for SimulatedEngine {
    fn prepare_to_play(&mut self) -> Result<()> {
        {
            let mut shared = self.shared.lock();
            let phase = shared.phase;
            match phase {
                Phase::Created => shared.phase = Phase::Preparing,
                Phase::Preparing | Phase::Prepared => return Ok(()),
                _ => {
                    drop(shared);
                    return Err(self.invalid("prepare"));
                }
            }
        }

        debug!("simulated engine preparing {}", self.uri);
        self.running.store(true, Ordering::SeqCst);

        let timeline = Timeline {
            uri: self.uri.clone(),
            script: self.script.clone(),
            notifier: self.notifier.clone(),
            shared: Arc::clone(&self.shared),
            running: Arc::clone(&self.running),
        };
        self.worker = Some(thread::spawn(move || timeline.run()));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let events = {
            let mut shared = self.shared.lock();
            let phase = shared.phase;
            match phase {
                Phase::Created | Phase::Preparing => {
                    shared.auto_start = true;
                    Vec::new()
                }
                Phase::Prepared if !shared.playing => {
                    shared.playing = true;
                    if shared.stalled_until.is_none() {
                        shared.clock.start();
                    }
                    vec![
                        EngineEvent::PlaybackStateChanged(EnginePlaybackState::Playing),
                        EngineEvent::RateChanged { rate: shared.clock.rate },
                    ]
                }
                Phase::Prepared => Vec::new(),
                _ => {
                    drop(shared);
                    return Err(self.invalid("play"));
                }
            }
        };
        self.notify_all(events);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let events = {
            let mut shared = self.shared.lock();
            let phase = shared.phase;
            match phase {
                Phase::Created | Phase::Preparing => {
                    shared.auto_start = false;
                    Vec::new()
                }
                Phase::Prepared if shared.playing => {
                    shared.playing = false;
                    shared.clock.halt();
                    vec![
                        EngineEvent::PlaybackStateChanged(EnginePlaybackState::Paused),
                        EngineEvent::RateChanged { rate: 0.0 },
                    ]
                }
                _ => Vec::new(),
            }
        };
        self.notify_all(events);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let was_active = {
            let mut shared = self.shared.lock();
            let active = matches!(shared.phase, Phase::Preparing | Phase::Prepared);
            shared.playing = false;
            shared.clock.halt();
            if active {
                shared.phase = Phase::Finished;
            }
            active
        };
        self.running.store(false, Ordering::SeqCst);

        if was_active {
            self.notify_all(vec![
                EngineEvent::PlaybackStateChanged(EnginePlaybackState::Stopped),
                EngineEvent::Finished(FinishReason::UserExited),
            ]);
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let mut shared = self.shared.lock();
        shared.playing = false;
        shared.clock.halt();
        shared.phase = Phase::Shutdown;
        debug!(
            "simulated engine for {} shut down (volume {:.2}, muted {}, resize {}, hw {}, limits {:?})",
            self.uri,
            shared.volume,
            shared.muted,
            shared.resize_mode.as_str(),
            shared.hardware_decoding,
            shared.limits
        );
        drop(shared);
        // The worker exits on its next tick; dropping the handle detaches it.
        drop(self.worker.take());
    }

    fn is_playing(&self) -> bool {
        let shared = self.shared.lock();
        shared.playing && shared.stalled_until.is_none()
    }

    fn current_playback_time(&self) -> Duration {
        let shared = self.shared.lock();
        let position = shared.clock.position();
        match shared.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.shared.lock().duration
    }

    fn playable_duration(&self) -> Duration {
        let shared = self.shared.lock();
        let position = shared.clock.position();
        match shared.duration {
            Some(duration) => (position + Duration::from_secs(5)).min(duration),
            None => position,
        }
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let landed = {
            let mut shared = self.shared.lock();
            if shared.phase != Phase::Prepared {
                drop(shared);
                return Err(self.invalid("seek"));
            }
            match shared.duration {
                Some(duration) => {
                    let target = position.min(duration);
                    shared.clock.set_position(target);
                    target
                }
                // Live streams stay at the live edge
                None => shared.clock.position(),
            }
        };
        self.notifier.notify(EngineEvent::SeekCompleted { position: landed });
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(BridgeError::rejected(format!("volume {} out of range", volume)));
        }
        self.shared.lock().volume = volume;
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.shared.lock().muted = muted;
        Ok(())
    }

    fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 || rate > MAX_RATE {
            return Err(BridgeError::rejected(format!("playback rate {} not supported", rate)));
        }
        let notify = {
            let mut shared = self.shared.lock();
            let changed = (shared.clock.rate - rate).abs() > f32::EPSILON;
            shared.clock.set_rate(rate);
            changed && shared.playing
        };
        if notify {
            self.notifier.notify(EngineEvent::RateChanged { rate });
        }
        Ok(())
    }

    fn set_resize_mode(&mut self, mode: ResizeMode) -> Result<()> {
        self.shared.lock().resize_mode = mode;
        Ok(())
    }

    fn set_buffer_limits(&mut self, limits: BufferLimits) -> Result<()> {
        if let (Some(min), Some(max)) = (limits.min_buffer_size, limits.max_buffer_size) {
            if min > max {
                return Err(BridgeError::rejected(format!("min buffer {} exceeds max {}", min, max)));
            }
        }
        self.shared.lock().limits = limits;
        Ok(())
    }

    fn set_hardware_decoding(&mut self, enabled: bool) -> Result<()> {
        self.shared.lock().hardware_decoding = enabled;
        Ok(())
    }

    fn apply_options(&mut self, options: &EngineOptions) -> Result<()> {
        let mut shared = self.shared.lock();
        for (category, key, value) in options.iter() {
            match (category, key, value) {
                (OptionCategory::Player, "hwaccel", OptionValue::Int(v)) => shared.hardware_decoding = *v != 0,
                (OptionCategory::Player, "max-buffer-size", OptionValue::Int(v)) => {
                    shared.limits.max_buffer_size = u64::try_from(*v).ok();
                }
                (OptionCategory::Player, "min-frames", OptionValue::Int(v)) => {
                    shared.limits.min_buffer_size = u64::try_from(*v).ok();
                }
                _ => {}
            }
        }
        debug!("simulated engine took {} options", options.len());
        Ok(())
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            self.shutdown();
        }
    }
}

/// Worker side of a simulated handle
struct Timeline {
    uri: String,
    script: SimulationScript,
    notifier: EngineNotifier,
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
}

impl Timeline {
    fn alive(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.notifier.is_current()
    }

    fn sleep(&self, total: Duration) -> bool {
        let deadline = Instant::now() + total;
        while Instant::now() < deadline {
            if !self.alive() {
                return false;
            }
            thread::sleep(self.script.tick.min(deadline.saturating_duration_since(Instant::now())));
        }
        self.alive()
    }

    fn emit(&self, events: Vec<EngineEvent>) {
        for event in events {
            if !self.notifier.notify(event) {
                return;
            }
        }
    }

    fn run(self) {
        if !self.sleep(self.script.prepare_delay) {
            return;
        }

        if let Some(host) = self.script.unreachable.iter().find(|h| self.uri.contains(h.as_str())) {
            warn!("simulated engine cannot reach {}", host);
            self.shared.lock().phase = Phase::Failed;
            self.running.store(false, Ordering::SeqCst);
            self.emit(vec![EngineEvent::Failed {
                code: CONNECTION_REFUSED,
                message: format!("connection refused: {}", host),
            }]);
            return;
        }

        let mut events = vec![
            EngineEvent::Prepared {
                duration: self.script.media_duration,
                natural_size: Some(self.script.natural_size),
            },
            EngineEvent::LoadStateChanged(LoadState::PLAYABLE | LoadState::PLAYTHROUGH_OK),
        ];
        {
            let mut shared = self.shared.lock();
            if shared.phase != Phase::Preparing {
                return;
            }
            shared.phase = Phase::Prepared;
            shared.duration = self.script.media_duration;
            if shared.auto_start {
                shared.playing = true;
                shared.clock.start();
                events.push(EngineEvent::PlaybackStateChanged(EnginePlaybackState::Playing));
                events.push(EngineEvent::RateChanged { rate: shared.clock.rate });
            }
        }
        info!("simulated engine prepared {}", self.uri);
        self.emit(events);

        while self.sleep(self.script.tick) {
            let (events, finished) = self.step();
            self.emit(events);
            if finished {
                break;
            }
        }
    }

    fn step(&self) -> (Vec<EngineEvent>, bool) {
        let mut events = Vec::new();
        let mut shared = self.shared.lock();
        if shared.phase != Phase::Prepared || !shared.playing {
            return (events, false);
        }

        if !shared.first_frame_sent {
            shared.first_frame_sent = true;
            events.push(EngineEvent::FirstVideoFrameRendered);
        }

        let position = shared.clock.position();

        if let Some(until) = shared.stalled_until {
            if Instant::now() >= until {
                shared.stalled_until = None;
                shared.clock.start();
                events.push(EngineEvent::LoadStateChanged(LoadState::PLAYABLE | LoadState::PLAYTHROUGH_OK));
            }
        } else if let Some(at) = self.script.stall_at {
            if !shared.stall_done && position >= at {
                shared.stall_done = true;
                shared.clock.halt();
                shared.stalled_until = Some(Instant::now() + self.script.stall_for);
                events.push(EngineEvent::LoadStateChanged(LoadState::STALLED));
            }
        }

        if let Some(duration) = shared.duration {
            if position >= duration {
                shared.clock.halt();
                shared.clock.set_position(duration);
                shared.playing = false;
                shared.phase = Phase::Finished;
                events.push(EngineEvent::PlaybackStateChanged(EnginePlaybackState::Stopped));
                events.push(EngineEvent::Finished(FinishReason::PlaybackEnded));
                return (events, true);
            }
        }

        (events, false)
    }
}
