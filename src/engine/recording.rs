//! Recording engine doubles
//!
//! A [`RecordingFactory`] hands out [`RecordingEngine`]s that never emit on
//! their own. Every call is appended to a shared log, and each created handle
//! leaves an [`EngineProbe`] behind so a test can inspect the calls, move the
//! reported position, and inject engine events through the handle's notifier.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::dispatch::EngineNotifier;
use crate::engine::{BufferLimits, EngineEvent, EngineFactory, EngineOptions, PlayerEngine, ResizeMode};
use crate::utils::error::{BridgeError, Result};

/// One call made on a recording handle
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Prepare,
    Play,
    Pause,
    Stop,
    Shutdown,
    Seek(Duration),
    SetVolume(f32),
    SetMuted(bool),
    SetRate(f32),
    SetResizeMode(ResizeMode),
    SetBufferLimits(BufferLimits),
    SetHardwareDecoding(bool),
    ApplyOptions(EngineOptions),
}

/// Final engine-side configuration after a sequence of calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    pub volume: Option<f32>,
    pub muted: Option<bool>,
    pub rate: Option<f32>,
    pub resize_mode: Option<ResizeMode>,
    pub limits: Option<BufferLimits>,
    pub hardware_decoding: Option<bool>,
    pub playing: bool,
    pub options: EngineOptions,
}

/// Shared record behind one handle
#[derive(Debug, Default)]
pub struct RecordedEngine {
    pub uri: String,
    pub created_with: EngineOptions,
    pub calls: Vec<EngineCall>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub playing: bool,
    /// Rates above this are refused like an engine would
    pub max_rate: Option<f32>,
}

impl RecordedEngine {
    /// Fold the call log into the configuration the engine ends up with
    pub fn settings(&self) -> EngineSettings {
        let mut settings = EngineSettings {
            options: self.created_with.clone(),
            ..EngineSettings::default()
        };
        for call in &self.calls {
            match call {
                EngineCall::SetVolume(v) => settings.volume = Some(*v),
                EngineCall::SetMuted(m) => settings.muted = Some(*m),
                EngineCall::SetRate(r) => settings.rate = Some(*r),
                EngineCall::SetResizeMode(m) => settings.resize_mode = Some(*m),
                EngineCall::SetBufferLimits(l) => settings.limits = Some(*l),
                EngineCall::SetHardwareDecoding(h) => settings.hardware_decoding = Some(*h),
                EngineCall::ApplyOptions(o) => settings.options.merge(o),
                EngineCall::Play => settings.playing = true,
                EngineCall::Pause | EngineCall::Stop | EngineCall::Shutdown => settings.playing = false,
                EngineCall::Prepare | EngineCall::Seek(_) => {}
            }
        }
        settings
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

/// Test-side view of a created handle
#[derive(Clone)]
pub struct EngineProbe {
    pub record: Arc<Mutex<RecordedEngine>>,
    pub notifier: EngineNotifier,
}

impl EngineProbe {
    /// Inject an engine event as if the engine thread sent it
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.notifier.notify(event)
    }

    pub fn set_position(&self, position: Duration) {
        self.record.lock().position = position;
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        self.record.lock().duration = duration;
    }

    pub fn uri(&self) -> String {
        self.record.lock().uri.clone()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.record.lock().calls.clone()
    }

    pub fn settings(&self) -> EngineSettings {
        self.record.lock().settings()
    }

    pub fn is_shut_down(&self) -> bool {
        self.record.lock().calls.contains(&EngineCall::Shutdown)
    }
}

/// Engine handle that only records
pub struct RecordingEngine {
    record: Arc<Mutex<RecordedEngine>>,
}

impl RecordingEngine {
    fn log(&self, call: EngineCall) {
        self.record.lock().calls.push(call);
    }
}

impl PlayerEngine for RecordingEngine {
    fn prepare_to_play(&mut self) -> Result<()> {
        self.log(EngineCall::Prepare);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.log(EngineCall::Play);
        self.record.lock().playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.log(EngineCall::Pause);
        self.record.lock().playing = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log(EngineCall::Stop);
        self.record.lock().playing = false;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.log(EngineCall::Shutdown);
        self.record.lock().playing = false;
    }

    fn is_playing(&self) -> bool {
        self.record.lock().playing
    }

    fn current_playback_time(&self) -> Duration {
        self.record.lock().position
    }

    fn duration(&self) -> Option<Duration> {
        self.record.lock().duration
    }

    fn playable_duration(&self) -> Duration {
        self.record.lock().position
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.log(EngineCall::Seek(position));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.log(EngineCall::SetVolume(volume));
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.log(EngineCall::SetMuted(muted));
        Ok(())
    }

    fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        let max = self.record.lock().max_rate;
        if max.is_some_and(|max| rate > max) {
            return Err(BridgeError::rejected(format!("rate {} above engine maximum", rate)));
        }
        self.log(EngineCall::SetRate(rate));
        Ok(())
    }

    fn set_resize_mode(&mut self, mode: ResizeMode) -> Result<()> {
        self.log(EngineCall::SetResizeMode(mode));
        Ok(())
    }

    fn set_buffer_limits(&mut self, limits: BufferLimits) -> Result<()> {
        self.log(EngineCall::SetBufferLimits(limits));
        Ok(())
    }

    fn set_hardware_decoding(&mut self, enabled: bool) -> Result<()> {
        self.log(EngineCall::SetHardwareDecoding(enabled));
        Ok(())
    }

    fn apply_options(&mut self, options: &EngineOptions) -> Result<()> {
        self.log(EngineCall::ApplyOptions(options.clone()));
        Ok(())
    }
}

/// Factory creating [`RecordingEngine`]s and keeping a probe for each
#[derive(Default)]
pub struct RecordingFactory {
    probes: Mutex<Vec<EngineProbe>>,
    refused: Mutex<Vec<String>>,
    max_rate: Mutex<Option<f32>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources containing `fragment` are refused with `SourceOpen`
    pub fn refuse(&self, fragment: &str) {
        self.refused.lock().push(fragment.to_string());
    }

    /// Handles created from now on refuse rates above `max`
    pub fn limit_rate(&self, max: f32) {
        *self.max_rate.lock() = Some(max);
    }

    pub fn created(&self) -> usize {
        self.probes.lock().len()
    }

    pub fn probe(&self, index: usize) -> Option<EngineProbe> {
        self.probes.lock().get(index).cloned()
    }

    pub fn last(&self) -> Option<EngineProbe> {
        self.probes.lock().last().cloned()
    }
}

impl EngineFactory for RecordingFactory {
    fn create(
        &self,
        uri: &str,
        options: &EngineOptions,
        notifier: EngineNotifier,
    ) -> Result<Box<dyn PlayerEngine>> {
        if self.refused.lock().iter().any(|f| uri.contains(f.as_str())) {
            return Err(BridgeError::source_open(format!("refused {}", uri)));
        }

        let record = Arc::new(Mutex::new(RecordedEngine {
            uri: uri.to_string(),
            created_with: options.clone(),
            max_rate: *self.max_rate.lock(),
            ..RecordedEngine::default()
        }));
        self.probes.lock().push(EngineProbe {
            record: Arc::clone(&record),
            notifier,
        });
        Ok(Box::new(RecordingEngine { record }))
    }
}
