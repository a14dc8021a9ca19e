//! View adapter for playerbridge
//!
//! A [`PlayerView`] stands in for one native video view of the host UI:
//! - Property writes land in a [`PlaybackConfiguration`] and are pushed to the
//!   engine handle as soon as one exists
//! - Engine callbacks are marshaled to the owning thread and translated into
//!   the named host events of [`EventKind`]
//! - Progress ticks are throttled by a [`ProgressTracker`]
//!
//! Nothing reaches the host synchronously. Every event is queued and handed
//! to the bound handler during the next [`PlayerView::pump`].

mod config;
mod events;
mod progress;
mod props;

pub use config::PlaybackConfiguration;
pub use events::{ErrorPayload, EventKind, EventSink, NaturalSize, Orientation, VideoEvent};
pub use progress::{ProgressSample, ProgressTracker};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::dispatch::{guarded, Callback, CallbackQueue};
use crate::engine::options::is_network_uri;
use crate::engine::{
    EngineEvent, EngineFactory, EngineOptions, FinishReason, PlayerEngine, ResizeMode,
};
use crate::utils::config::Config;
use crate::utils::duration_from_secs;
use crate::utils::error::{BridgeError, Result};

/// Load lifecycle of the current source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    /// No source, or the handle was stopped
    Idle,

    /// Load started, engine not prepared yet
    Loading,

    /// Engine prepared; progress is reported
    Loaded,

    /// End of media reached
    Ended,

    /// Open or playback failure; the handle is gone
    Failed,
}

/// Host-facing video view backed by one engine handle
pub struct PlayerView {
    factory: Arc<dyn EngineFactory>,

    /// Bridge-wide settings (low-latency preset, progress cadence)
    settings: Config,

    config: PlaybackConfiguration,

    engine: Option<Box<dyn PlayerEngine>>,

    queue: CallbackQueue<VideoEvent>,

    sink: EventSink,

    progress: ProgressTracker,

    phase: SourcePhase,

    stalled: bool,

    /// `onReadyForDisplay` already sent for the current source
    ready_for_display: bool,

    fullscreen: bool,

    /// Seek targets handed to the engine and not completed yet, in seconds
    seeks_in_flight: VecDeque<f64>,

    /// Collects translated events while an engine callback is handled
    staging: Option<Vec<VideoEvent>>,
}

impl PlayerView {
    pub fn new(factory: Arc<dyn EngineFactory>, settings: Config) -> Self {
        let config = PlaybackConfiguration::from_defaults(&settings.playback);
        let progress = ProgressTracker::new(settings.progress.interval());
        Self {
            factory,
            settings,
            config,
            engine: None,
            queue: CallbackQueue::new(),
            sink: EventSink::new(),
            progress,
            phase: SourcePhase::Idle,
            stalled: false,
            ready_for_display: false,
            fullscreen: false,
            seeks_in_flight: VecDeque::new(),
            staging: None,
        }
    }

    /// Bind a host handler to one event slot
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: FnMut(&VideoEvent) + Send + 'static,
    {
        self.sink.set(kind, handler);
    }

    pub fn configuration(&self) -> &PlaybackConfiguration {
        &self.config
    }

    pub fn phase(&self) -> SourcePhase {
        self.phase
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Point the view at a new source
    ///
    /// An empty URI clears the source and releases the handle.
    pub fn set_source(&mut self, uri: &str) {
        if uri.is_empty() {
            debug!("source cleared");
            self.release_engine("source cleared");
            self.phase = SourcePhase::Idle;
            self.config.source = None;
            return;
        }

        if self.config.source.as_deref() == Some(uri) && self.engine.is_some() {
            debug!("source unchanged, re-applying modifiers");
            self.apply_modifiers();
            return;
        }

        self.release_engine("replaced by a new source");
        self.config.source = Some(uri.to_string());
        self.open_source();
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.config.paused = paused;
        self.forward(|engine| if paused { engine.pause() } else { engine.play() });
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.config.muted = muted;
        self.forward(|engine| engine.set_muted(muted));
    }

    /// Set output volume; values outside 0.0 to 1.0 are clamped
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            self.reject("volume must be a number".to_string());
            return;
        }
        let clamped = volume.clamp(0.0, 1.0);
        if clamped != volume {
            debug!("volume {} clamped to {}", volume, clamped);
        }
        self.config.volume = clamped;
        self.forward(|engine| engine.set_volume(clamped));
    }

    /// Set playback rate; non-positive or non-finite rates are rejected
    pub fn set_rate(&mut self, rate: f32) {
        if !rate.is_finite() || rate <= 0.0 {
            self.reject(format!("playback rate must be finite and positive, got {}", rate));
            return;
        }
        let previous = self.config.rate;
        self.config.rate = rate;
        if !self.forward(|engine| engine.set_playback_rate(rate)) {
            self.config.rate = previous;
        }
    }

    /// Request a seek, in seconds
    ///
    /// Always answered by `onVideoSeek`, preceded by `onVideoError` when the
    /// target is unusable or the engine refuses it. A buffered target that is
    /// replaced, or whose load fails or is superseded, is answered at that
    /// point.
    pub fn set_seek(&mut self, seconds: f64) {
        let Some(target) = duration_from_secs(seconds) else {
            self.reject(format!("seek target must be a finite number of seconds, got {}", seconds));
            let current_time = self.current_playback_time().as_secs_f64();
            self.emit(VideoEvent::Seek {
                current_time,
                seek_time: seconds,
            });
            return;
        };

        if let Some(previous) = self.config.pending_seek.take() {
            self.emit_error(BridgeError::Superseded(format!(
                "seek to {:.3}s replaced by a later seek",
                previous
            )));
            let current_time = self.current_playback_time().as_secs_f64();
            self.emit(VideoEvent::Seek {
                current_time,
                seek_time: previous,
            });
        }

        self.config.pending_seek = Some(target.as_secs_f64());
        match self.phase {
            SourcePhase::Loaded | SourcePhase::Ended => self.issue_pending_seek(),
            _ => debug!("seek to {:.3}s buffered until the source is loaded", target.as_secs_f64()),
        }
    }

    pub fn set_resize_mode(&mut self, mode: ResizeMode) {
        self.config.resize_mode = mode;
        self.forward(|engine| engine.set_resize_mode(mode));
    }

    /// Engine-refused limits are rolled back
    pub fn set_max_buffer_size(&mut self, size: Option<u64>) {
        let previous = self.config.max_buffer_size;
        self.config.max_buffer_size = size;
        let limits = self.config.buffer_limits();
        if !self.forward(|engine| engine.set_buffer_limits(limits)) {
            self.config.max_buffer_size = previous;
        }
    }

    /// Engine-refused limits are rolled back
    pub fn set_min_buffer_size(&mut self, size: Option<u64>) {
        let previous = self.config.min_buffer_size;
        self.config.min_buffer_size = size;
        let limits = self.config.buffer_limits();
        if !self.forward(|engine| engine.set_buffer_limits(limits)) {
            self.config.min_buffer_size = previous;
        }
    }

    pub fn set_hardware_decoding_enabled(&mut self, enabled: bool) {
        self.config.hardware_decoding = enabled;
        self.forward(|engine| engine.set_hardware_decoding(enabled));
    }

    /// Toggle low-latency mode
    ///
    /// Turning it off only affects handles created afterwards; the thresholds
    /// already written stay until overwritten.
    pub fn set_low_latency_mode(&mut self, enabled: bool) {
        if enabled {
            self.setup_low_latency_configuration();
        } else {
            debug!("low-latency mode disabled for future handles");
            self.config.low_latency = false;
        }
    }

    /// Configure buffer thresholds and decoding for minimum latency
    pub fn setup_low_latency_configuration(&mut self) {
        let preset = self.settings.low_latency.clone();
        self.config.enable_low_latency(&preset);

        let Some(engine) = self.engine.as_mut() else {
            debug!("low-latency configuration buffered until a handle exists");
            return;
        };

        if self.phase == SourcePhase::Loaded && engine.duration().is_some() {
            warn!("low-latency configuration applied to a source that is not live");
        }
        info!(
            "applying low-latency configuration (max buffer {}, min frames {})",
            preset.max_buffer_size, preset.min_buffer_size
        );

        let limits = self.config.buffer_limits();
        let results = [
            engine.apply_options(&EngineOptions::low_latency(&preset)),
            engine.set_buffer_limits(limits),
            engine.set_hardware_decoding(true),
        ];
        for err in results.into_iter().filter_map(|r| r.err()) {
            self.emit_error(err);
        }
    }

    /// Push the whole configuration to the handle
    ///
    /// Safe to call any number of times; with no handle it does nothing.
    pub fn apply_modifiers(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            trace!("no engine handle, modifiers stay buffered");
            return;
        };
        let config = &self.config;
        debug!(
            "applying modifiers: paused={} muted={} volume={} rate={} resize={}",
            config.paused,
            config.muted,
            config.volume,
            config.rate,
            config.resize_mode.as_str()
        );

        let results = [
            if config.low_latency {
                engine.apply_options(&EngineOptions::low_latency(&self.settings.low_latency))
            } else {
                Ok(())
            },
            engine.set_buffer_limits(config.buffer_limits()),
            engine.set_hardware_decoding(config.hardware_decoding),
            engine.set_resize_mode(config.resize_mode),
            engine.set_muted(config.muted),
            engine.set_volume(config.volume),
            engine.set_playback_rate(config.rate),
            if config.paused { engine.pause() } else { engine.play() },
        ];
        for err in results.into_iter().filter_map(|r| r.err()) {
            self.emit_error(err);
        }

        if self.phase == SourcePhase::Loaded {
            self.issue_pending_seek();
        }
    }

    /// Queue an `onVideoProgress` if one is due
    pub fn send_progress_update(&mut self) {
        self.send_progress_update_at(Instant::now());
    }

    fn send_progress_update_at(&mut self, now: Instant) {
        if self.phase != SourcePhase::Loaded {
            return;
        }
        let Some(engine) = self.engine.as_ref() else {
            return;
        };

        let sample = self.progress.sample(
            now,
            engine.current_playback_time(),
            engine.playable_duration(),
            engine.duration(),
            self.config.paused,
        );
        if let Some(sample) = sample {
            trace!("progress at {:.3}s", sample.position.as_secs_f64());
            self.emit(VideoEvent::Progress {
                current_time: sample.position.as_secs_f64(),
                playable_duration: sample.playable.as_secs_f64(),
                seekable_duration: sample.seekable.as_secs_f64(),
            });
        }
    }

    /// Run-loop hook: deliver pending events and fire the progress tick
    ///
    /// Returns the number of events handed to host handlers.
    pub fn pump(&mut self) -> usize {
        self.pump_at(Instant::now())
    }

    /// [`pump`](Self::pump) with an explicit clock reading for the progress tick
    pub fn pump_at(&mut self, now: Instant) -> usize {
        let mut delivered = self.drain();
        self.send_progress_update_at(now);
        delivered += self.drain();
        delivered
    }

    pub fn play(&mut self) {
        if self.engine.is_none() && self.config.source.is_some() && self.phase != SourcePhase::Loading {
            info!("reopening source for playback");
            self.config.paused = false;
            self.open_source();
            return;
        }
        self.set_paused(false);
    }

    pub fn pause(&mut self) {
        self.set_paused(true);
    }

    /// Stop playback and release the handle; a later source can still be set
    pub fn stop(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        info!("stopping playback");
        if let Err(err) = engine.stop() {
            warn!("engine stop failed: {}", err);
        }
        self.release_engine("stopped");
        self.phase = SourcePhase::Idle;
    }

    pub fn is_playing(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.is_playing())
    }

    pub fn current_playback_time(&self) -> Duration {
        self.engine
            .as_ref()
            .map_or(Duration::ZERO, |engine| engine.current_playback_time())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.engine.as_ref().and_then(|engine| engine.duration())
    }

    pub fn present_fullscreen_player(&mut self) {
        if self.fullscreen {
            return;
        }
        self.emit(VideoEvent::FullscreenPlayerWillPresent);
        self.fullscreen = true;
        self.emit(VideoEvent::FullscreenPlayerDidPresent);
    }

    pub fn dismiss_fullscreen_player(&mut self) {
        if !self.fullscreen {
            return;
        }
        self.emit(VideoEvent::FullscreenPlayerWillDismiss);
        self.fullscreen = false;
        self.emit(VideoEvent::FullscreenPlayerDidDismiss);
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        if fullscreen {
            self.present_fullscreen_player();
        } else {
            self.dismiss_fullscreen_player();
        }
    }

    pub fn handle_tap(&mut self) {
        self.emit(VideoEvent::Tap);
    }

    fn open_source(&mut self) {
        let Some(uri) = self.config.source.clone() else {
            return;
        };

        info!("loading source {}", uri);
        self.phase = SourcePhase::Loading;
        self.emit(VideoEvent::LoadStart {
            uri: uri.clone(),
            is_network: is_network_uri(&uri),
        });

        let options = self.config.creation_options(&uri, &self.settings.low_latency);
        let notifier = self.queue.notifier();
        let factory = Arc::clone(&self.factory);
        let created = guarded("engine factory", || factory.create(&uri, &options, notifier)).and_then(|r| r);

        let mut engine = match created {
            Ok(engine) => engine,
            Err(err) => {
                self.fail_load(err);
                return;
            }
        };

        if let Err(err) = engine.prepare_to_play() {
            engine.shutdown();
            self.fail_load(err);
            return;
        }

        self.engine = Some(engine);
        self.apply_modifiers();
    }

    fn fail_load(&mut self, err: BridgeError) {
        let err = match err {
            BridgeError::SourceOpen(_) => err,
            other => BridgeError::source_open(other.to_string()),
        };
        error!("failed to open source: {}", err);
        self.queue.invalidate();
        self.phase = SourcePhase::Failed;
        self.emit_error(err);
        self.abandon_pending_seek(0.0);
    }

    /// Tear the handle down; the caller decides the next phase
    fn release_engine(&mut self, reason: &str) {
        let current_time = self.current_playback_time().as_secs_f64();
        if self.phase == SourcePhase::Loading {
            let source = self.config.source.clone().unwrap_or_default();
            self.emit_error(BridgeError::Superseded(format!("load of {} {}", source, reason)));
            self.abandon_pending_seek(current_time);
        }

        while let Some(seek_time) = self.seeks_in_flight.pop_front() {
            self.emit(VideoEvent::Seek {
                current_time,
                seek_time,
            });
        }

        if let Some(mut engine) = self.engine.take() {
            debug!("releasing engine handle ({})", reason);
            self.queue.invalidate();
            engine.shutdown();
        }

        self.stalled = false;
        self.ready_for_display = false;
        self.progress.reset_baseline();
    }

    /// Answer a seek that will never reach an engine, because its load ended
    fn abandon_pending_seek(&mut self, current_time: f64) {
        if let Some(seek_time) = self.config.pending_seek.take() {
            debug!("seek to {:.3}s abandoned with its load", seek_time);
            self.emit(VideoEvent::Seek {
                current_time,
                seek_time,
            });
        }
    }

    fn issue_pending_seek(&mut self) {
        let Some(seconds) = self.config.pending_seek else {
            return;
        };
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        self.config.pending_seek = None;

        let target = duration_from_secs(seconds).unwrap_or_default();
        debug!("seeking to {:.3}s", seconds);
        match engine.seek(target) {
            Ok(()) => {
                self.seeks_in_flight.push_back(seconds);
                if self.phase == SourcePhase::Ended {
                    self.phase = SourcePhase::Loaded;
                }
            }
            Err(err) => {
                let current_time = engine.current_playback_time().as_secs_f64();
                self.emit_error(err);
                self.emit(VideoEvent::Seek {
                    current_time,
                    seek_time: seconds,
                });
            }
        }
    }

    /// Run `f` against the handle if there is one
    ///
    /// Returns `false` when the engine refused the call.
    fn forward<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut dyn PlayerEngine) -> Result<()>,
    {
        let Some(engine) = self.engine.as_mut() else {
            return true;
        };
        match f(engine.as_mut()) {
            Ok(()) => true,
            Err(err) => {
                self.emit_error(err);
                false
            }
        }
    }

    fn reject(&mut self, message: String) {
        self.emit_error(BridgeError::rejected(message));
    }

    fn emit_error(&mut self, err: BridgeError) {
        warn!("reporting error to host: {}", err);
        self.emit(VideoEvent::error(&err));
    }

    fn emit(&mut self, event: VideoEvent) {
        match self.staging.as_mut() {
            Some(staged) => staged.push(event),
            None => self.queue.post(event),
        }
    }

    fn drain(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(callback) = self.queue.try_next() {
            match callback {
                Callback::Local(event) => {
                    self.deliver(event);
                    delivered += 1;
                }
                Callback::Engine(event) => {
                    // Translated events go out before anything queued behind
                    // the engine callback.
                    self.staging = Some(Vec::new());
                    self.handle_engine_event(event);
                    for event in self.staging.take().unwrap_or_default() {
                        self.deliver(event);
                        delivered += 1;
                    }
                }
            }
        }
        delivered
    }

    fn deliver(&mut self, event: VideoEvent) {
        trace!("delivering {}", event.kind());
        let Err(err) = self.sink.dispatch(&event) else {
            return;
        };
        if event.kind() == EventKind::Error {
            error!("{} handler failed: {}", EventKind::Error, err);
            return;
        }
        if let Err(nested) = self.sink.dispatch(&VideoEvent::error(&err)) {
            error!("{} handler failed: {}", EventKind::Error, nested);
        }
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Prepared { duration, natural_size } => {
                if self.phase != SourcePhase::Loading {
                    debug!("ignoring prepare notification in phase {:?}", self.phase);
                    return;
                }
                self.phase = SourcePhase::Loaded;
                self.progress.reset_baseline();
                info!(
                    "source prepared ({})",
                    duration.map_or("live".to_string(), crate::utils::format_duration)
                );
                if self.config.low_latency && duration.is_some() {
                    warn!("low-latency configuration applied to a source that is not live");
                }
                let current_time = self.current_playback_time().as_secs_f64();
                self.emit(VideoEvent::Load {
                    duration: duration.map_or(0.0, |d| d.as_secs_f64()),
                    current_time,
                    natural_size: natural_size.map(|(w, h)| NaturalSize::new(w, h)),
                    is_live: duration.is_none(),
                });
                self.issue_pending_seek();
            }
            EngineEvent::LoadStateChanged(state) => {
                debug!("load state changed to {:?}", state);
                if state.is_stalled() && !self.stalled {
                    self.stalled = true;
                    self.emit(VideoEvent::Buffer { is_buffering: true });
                    self.emit(VideoEvent::PlaybackStalled);
                } else if !state.is_stalled() && state.is_playable() && self.stalled {
                    self.stalled = false;
                    self.emit(VideoEvent::Buffer { is_buffering: false });
                    self.emit(VideoEvent::PlaybackResume {
                        playback_rate: self.config.rate,
                    });
                }
            }
            EngineEvent::PlaybackStateChanged(state) => {
                debug!("engine playback state {:?}", state);
            }
            EngineEvent::FirstVideoFrameRendered => {
                if !self.ready_for_display {
                    self.ready_for_display = true;
                    self.emit(VideoEvent::ReadyForDisplay);
                }
            }
            EngineEvent::SeekCompleted { position } => {
                self.progress.reset_baseline();
                let current_time = position.as_secs_f64();
                let seek_time = self.seeks_in_flight.pop_front().unwrap_or(current_time);
                self.emit(VideoEvent::Seek {
                    current_time,
                    seek_time,
                });
            }
            EngineEvent::RateChanged { rate } => {
                self.emit(VideoEvent::PlaybackRateChange { playback_rate: rate });
            }
            EngineEvent::Finished(FinishReason::PlaybackEnded) => {
                if self.phase == SourcePhase::Loaded {
                    info!("playback reached the end of the source");
                    self.phase = SourcePhase::Ended;
                    self.emit(VideoEvent::End);
                }
            }
            EngineEvent::Finished(FinishReason::UserExited) => {
                debug!("engine finished after a stop request");
            }
            EngineEvent::Failed { code, message } => {
                let err = if self.phase == SourcePhase::Loading {
                    BridgeError::source_open(format!("{} (engine code {})", message, code))
                } else {
                    BridgeError::Playback { code, message }
                };
                error!("engine failure: {}", err);
                let current_time = self.current_playback_time().as_secs_f64();
                self.phase = SourcePhase::Failed;
                self.release_engine("failed");
                self.emit_error(err);
                self.abandon_pending_seek(current_time);
            }
        }
    }
}

impl Drop for PlayerView {
    fn drop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            debug!("view dropped, shutting engine handle down");
            self.queue.invalidate();
            engine.shutdown();
        }
    }
}
