//! Non-visual player facade
//!
//! [`PlayerWrapper`] owns one engine handle and exposes an imperative API
//! (setup, play, pause, stop, shutdown). Outcomes are reported to a
//! [`PlayerDelegate`] that the facade references weakly, so a delegate that
//! goes away simply stops hearing from it. Like the view, the facade only
//! calls the delegate from [`PlayerWrapper::pump`] on the owning thread.

mod state;

pub use state::WrapperState;

use std::sync::{Arc, Weak};

use log::{debug, error, info, trace, warn};

use crate::dispatch::{guarded, Callback, CallbackQueue};
use crate::engine::{
    BufferLimits, EngineEvent, EngineFactory, EngineOptions, EnginePlaybackState, FinishReason,
    LoadState, PlayerEngine,
};
use crate::internal_error;
use crate::utils::config::Config;
use crate::utils::error::{BridgeError, Result};

/// Receiver of facade outcomes
pub trait PlayerDelegate: Send + Sync {
    /// The source is open and ready to play
    fn player_did_prepare(&self);

    /// The engine reported that playback began
    fn player_did_start(&self);

    /// Setup or playback failed; the handle is already released
    fn player_did_fail(&self, error: &BridgeError);

    /// Engine load state transition, informational only
    fn player_load_state_changed(&self, _state: LoadState) {}
}

/// Notices the facade queues for itself
#[derive(Debug)]
enum Notice {
    Failed(BridgeError),
}

/// Imperative player facade over one engine handle
pub struct PlayerWrapper {
    factory: Arc<dyn EngineFactory>,

    settings: Config,

    delegate: Weak<dyn PlayerDelegate>,

    engine: Option<Box<dyn PlayerEngine>>,

    queue: CallbackQueue<Notice>,

    state: WrapperState,

    /// Last URL set up, kept across stop for a later play
    url: Option<String>,

    /// The current handle reported readiness
    prepared: bool,

    /// `player_did_start` already sent for the current play request
    started: bool,
}

impl PlayerWrapper {
    pub fn new(factory: Arc<dyn EngineFactory>, delegate: Weak<dyn PlayerDelegate>) -> Self {
        Self::with_config(factory, Config::default(), delegate)
    }

    pub fn with_config(
        factory: Arc<dyn EngineFactory>,
        settings: Config,
        delegate: Weak<dyn PlayerDelegate>,
    ) -> Self {
        Self {
            factory,
            settings,
            delegate,
            engine: None,
            queue: CallbackQueue::new(),
            state: WrapperState::Idle,
            url: None,
            prepared: false,
            started: false,
        }
    }

    pub fn state(&self) -> WrapperState {
        self.state
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.is_playing())
    }

    /// Create a handle for `url` and start preparing it
    ///
    /// Replaces any handle held. Readiness or failure is reported to the
    /// delegate; an engine that refuses the source puts the facade in
    /// `Failed` right away.
    pub fn setup_player_with_url(&mut self, url: &str) -> Result<()> {
        self.state.require("setup", WrapperState::can_setup)?;
        self.release_engine();
        self.url = Some(url.to_string());
        self.open(false)
    }

    /// Start or resume playback
    ///
    /// From `Stopped` the handle is re-created for the last URL and playback
    /// starts once it is ready.
    pub fn play(&mut self) -> Result<()> {
        self.state.require("play", WrapperState::can_play)?;

        if self.state == WrapperState::Stopped {
            info!("restarting {}", self.url.as_deref().unwrap_or_default());
            return self.open(true);
        }

        let engine = self.engine_mut("play")?;
        engine.play()?;
        self.started = false;
        self.state = WrapperState::Playing;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.state.require("pause", WrapperState::can_pause)?;
        let engine = self.engine_mut("pause")?;
        engine.pause()?;
        self.state = WrapperState::Paused;
        Ok(())
    }

    /// Stop playback and release the handle
    pub fn stop(&mut self) -> Result<()> {
        self.state.require("stop", WrapperState::can_stop)?;
        if let Some(engine) = self.engine.as_mut() {
            if let Err(err) = engine.stop() {
                warn!("engine stop failed: {}", err);
            }
        }
        self.release_engine();
        self.state = WrapperState::Stopped;
        info!("playback stopped");
        Ok(())
    }

    /// Release everything; every later call fails with `Disposed`
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == WrapperState::Disposed {
            return Err(BridgeError::Disposed);
        }
        self.dispose();
        Ok(())
    }

    /// Deliver pending engine callbacks to the delegate
    ///
    /// Returns the number of delegate calls made.
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(callback) = self.queue.try_next() {
            if self.state == WrapperState::Disposed {
                trace!("discarding callback after shutdown");
                continue;
            }
            delivered += match callback {
                Callback::Engine(event) => self.handle_engine_event(event),
                Callback::Local(Notice::Failed(err)) => {
                    self.notify_failure(&err);
                    1
                }
            };
        }
        delivered
    }

    fn open(&mut self, autoplay: bool) -> Result<()> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| internal_error!("no URL to open"))?;

        let defaults = &self.settings.playback;
        let limits = BufferLimits {
            max_buffer_size: defaults.max_buffer_size,
            min_buffer_size: defaults.min_buffer_size,
        };
        let options = EngineOptions::for_source(&url, defaults.hardware_decoding, limits);

        info!("setting up player for {}", url);
        self.prepared = false;
        self.started = false;

        let notifier = self.queue.notifier();
        let factory = Arc::clone(&self.factory);
        let created = guarded("engine factory", || factory.create(&url, &options, notifier)).and_then(|r| r);

        let started = created.and_then(|mut engine| {
            if autoplay {
                engine.play()?;
            }
            match engine.prepare_to_play() {
                Ok(()) => Ok(engine),
                Err(err) => {
                    engine.shutdown();
                    Err(err)
                }
            }
        });

        match started {
            Ok(engine) => {
                self.engine = Some(engine);
                self.state = if autoplay {
                    WrapperState::Playing
                } else {
                    WrapperState::Preparing
                };
            }
            Err(err) => {
                let err = match err {
                    BridgeError::SourceOpen(_) => err,
                    other => BridgeError::source_open(other.to_string()),
                };
                error!("setup failed: {}", err);
                self.queue.invalidate();
                self.state = WrapperState::Failed;
                // A later setup or shutdown withdraws this failure
                self.queue.post_current(Notice::Failed(err));
            }
        }
        Ok(())
    }

    fn engine_mut(&mut self, operation: &'static str) -> Result<&mut Box<dyn PlayerEngine>> {
        let state = self.state;
        self.engine.as_mut().ok_or(BridgeError::InvalidState {
            operation,
            state: state.name().to_string(),
        })
    }

    fn release_engine(&mut self) {
        self.queue.invalidate();
        if let Some(mut engine) = self.engine.take() {
            debug!("releasing engine handle");
            engine.shutdown();
        }
        self.prepared = false;
        self.started = false;
    }

    fn dispose(&mut self) {
        info!("shutting player down");
        self.release_engine();
        self.state = WrapperState::Disposed;
    }

    fn handle_engine_event(&mut self, event: EngineEvent) -> usize {
        match event {
            EngineEvent::Prepared { .. } => {
                if self.prepared {
                    return 0;
                }
                self.prepared = true;
                match self.state {
                    WrapperState::Preparing => {
                        self.state = WrapperState::Ready;
                    }
                    WrapperState::Playing => {
                        // Restart after stop: auto-start was armed before prepare
                        if let Some(engine) = self.engine.as_mut() {
                            if let Err(err) = engine.play() {
                                return self.fail(err);
                            }
                        }
                    }
                    _ => {}
                }
                info!("player prepared");
                self.call_delegate("player_did_prepare", |d| d.player_did_prepare())
            }
            EngineEvent::PlaybackStateChanged(EnginePlaybackState::Playing) => {
                if self.state != WrapperState::Playing || self.started {
                    return 0;
                }
                self.started = true;
                self.call_delegate("player_did_start", |d| d.player_did_start())
            }
            EngineEvent::PlaybackStateChanged(state) => {
                debug!("engine playback state {:?}", state);
                0
            }
            EngineEvent::LoadStateChanged(load_state) => {
                self.call_delegate("player_load_state_changed", |d| d.player_load_state_changed(load_state))
            }
            EngineEvent::Finished(FinishReason::PlaybackEnded) => {
                info!("playback reached the end of the media");
                self.release_engine();
                self.state = WrapperState::Stopped;
                0
            }
            EngineEvent::Failed { code, message } => {
                let err = if self.prepared {
                    BridgeError::Playback { code, message }
                } else {
                    BridgeError::source_open(format!("{} (engine code {})", message, code))
                };
                self.fail(err)
            }
            EngineEvent::Finished(FinishReason::UserExited)
            | EngineEvent::FirstVideoFrameRendered
            | EngineEvent::SeekCompleted { .. }
            | EngineEvent::RateChanged { .. } => 0,
        }
    }

    fn fail(&mut self, err: BridgeError) -> usize {
        if !self.state.holds_engine() {
            return 0;
        }
        error!("player failed in state {}: {}", self.state, err);
        self.release_engine();
        self.state = WrapperState::Failed;
        self.notify_failure(&err)
    }

    fn notify_failure(&self, err: &BridgeError) -> usize {
        self.call_delegate("player_did_fail", |d| d.player_did_fail(err))
    }

    /// Invoke the delegate if it is still alive, containing any panic
    fn call_delegate<F>(&self, what: &str, f: F) -> usize
    where
        F: FnOnce(&dyn PlayerDelegate),
    {
        let Some(delegate) = self.delegate.upgrade() else {
            trace!("delegate gone, dropping {}", what);
            return 0;
        };
        // The failure path is the delegate itself, so a panic can only be logged.
        if guarded(what, || f(delegate.as_ref())).is_err() {
            error!("delegate panicked in {}", what);
        }
        1
    }
}

impl Drop for PlayerWrapper {
    fn drop(&mut self) {
        if self.state != WrapperState::Disposed {
            self.dispose();
        }
    }
}
