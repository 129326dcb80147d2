//! Shared context threaded through the conversation states

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::agent::{
    ChatMessage, ConsoleTranscriber, ConsoleVoice, ReasoningBackend, RuleBackend, Transcriber,
    Voice,
};
use crate::audio::{tones, CaptureSource, MixerHandle, OutputMixer};
use crate::config::Settings;
use crate::detect::{EnergyVad, EnergyWakeScorer, SpeechListener, WakeMonitor};
use crate::schedule::{ReminderScheduler, TimerManager};
use crate::store::{self, ReminderRepo};
use crate::tools::ToolRouter;
use crate::{Error, Result};

/// Everything the state handlers touch
///
/// Built once on the conversation thread and consumed by
/// [`run`](crate::state::run). Holds the live audio streams, so it must
/// stay on the thread that created it.
pub struct AppContext {
    pub settings: Settings,
    pub mixer: MixerHandle,
    pub capture: Option<CaptureSource>,
    pub listener: SpeechListener,
    pub monitor: WakeMonitor,
    pub timers: TimerManager,
    pub scheduler: ReminderScheduler,
    pub reminders: ReminderRepo,
    pub backend: Box<dyn ReasoningBackend>,
    pub transcriber: Box<dyn Transcriber>,
    pub voice: Box<dyn Voice>,
    pub history: Vec<ChatMessage>,
    pub thread_id: Option<String>,
    pub shutdown: Arc<AtomicBool>,
    pub listening_cue: Vec<f32>,
    pub done_cue: Vec<f32>,
    pub thinking_cue: Vec<f32>,
    pub ding: Vec<f32>,
    // The output stream closes when the context drops
    _output: Option<OutputMixer>,
}

impl AppContext {
    /// Wire up audio, detection, storage, and the backend
    ///
    /// `shutdown` and `interrupt` are created by the caller so signal
    /// handling can trip them from another thread. Fails when the wake
    /// model file is missing or no audio devices are available.
    pub fn build(
        settings: Settings,
        shutdown: Arc<AtomicBool>,
        interrupt: Arc<AtomicBool>,
    ) -> Result<Self> {
        let model_path = settings.wake_model_path();
        if !model_path.exists() {
            return Err(Error::WakeWord(format!(
                "wake model not found: {}",
                model_path.display()
            )));
        }

        let output = OutputMixer::new()?;
        let mixer = output.handle();

        let mut capture = CaptureSource::new()?;
        let listener_frames = capture.subscribe();
        let monitor_frames = capture.subscribe();
        capture.start()?;

        let listener = SpeechListener::new(
            listener_frames,
            Box::new(EnergyWakeScorer::default()),
            Box::new(EnergyVad::default()),
            settings.wake_word.threshold,
            interrupt,
        );
        let monitor = WakeMonitor::new(SpeechListener::new(
            monitor_frames,
            Box::new(EnergyWakeScorer::default()),
            Box::new(EnergyVad::default()),
            settings.wake_word.threshold,
            Arc::new(AtomicBool::new(false)),
        ));

        let alarm = tones::load_sound_or(&settings.sounds_dir, "alarm.wav", tones::alarm_fallback);
        let ding = tones::load_sound_or(&settings.sounds_dir, "ding.wav", tones::ding_fallback);

        let pool = store::init(settings.data_dir().join("ember.db"))?;
        let reminders = ReminderRepo::new(pool);

        let scheduler = ReminderScheduler::new(reminders.clone(), listener.interrupt_flag());
        scheduler.start();

        let timers = TimerManager::new(mixer.clone(), alarm);
        let router = ToolRouter::new(timers.clone(), reminders.clone(), scheduler.clone());

        let transcriber = ConsoleTranscriber::new(settings.wake_word.display_name.clone());

        tracing::info!(
            wake_word = %settings.wake_word.display_name,
            "assistant ready"
        );

        Ok(Self {
            settings,
            mixer,
            capture: Some(capture),
            listener,
            monitor,
            timers,
            scheduler,
            reminders,
            backend: Box::new(RuleBackend::new(router)),
            transcriber: Box::new(transcriber),
            voice: Box::new(ConsoleVoice),
            history: Vec::new(),
            thread_id: None,
            shutdown,
            listening_cue: tones::listening_tone(),
            done_cue: tones::done_tone(),
            thinking_cue: tones::thinking_sequence(),
            ding,
            _output: Some(output),
        })
    }

    /// Whether a conversation is in progress
    #[must_use]
    pub fn in_conversation(&self) -> bool {
        !self.history.is_empty()
    }

    /// Forget the current conversation thread
    pub fn reset_conversation(&mut self) {
        self.history.clear();
        self.thread_id = None;
    }

    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Context with no audio hardware, for exercising state handlers
    #[cfg(test)]
    pub(crate) fn detached(
        backend: Box<dyn ReasoningBackend>,
        transcriber: Box<dyn Transcriber>,
        frames: (
            std::sync::mpsc::Receiver<Vec<f32>>,
            std::sync::mpsc::Receiver<Vec<f32>>,
        ),
    ) -> Self {
        let settings = Settings::default();
        let mixer = MixerHandle::detached();
        let interrupt = Arc::new(AtomicBool::new(false));

        let listener = SpeechListener::new(
            frames.0,
            Box::new(EnergyWakeScorer::default()),
            Box::new(EnergyVad::default()),
            settings.wake_word.threshold,
            interrupt,
        );
        let monitor = WakeMonitor::new(SpeechListener::new(
            frames.1,
            Box::new(EnergyWakeScorer::default()),
            Box::new(EnergyVad::default()),
            settings.wake_word.threshold,
            Arc::new(AtomicBool::new(false)),
        ));

        let pool = store::init_memory().expect("in-memory store");
        let reminders = ReminderRepo::new(pool);
        let scheduler = ReminderScheduler::new(reminders.clone(), listener.interrupt_flag());
        let timers = TimerManager::new(mixer.clone(), vec![0.2; 64]);

        Self {
            settings,
            mixer,
            capture: None,
            listener,
            monitor,
            timers,
            scheduler,
            reminders,
            backend,
            transcriber,
            voice: Box::new(ConsoleVoice),
            history: Vec::new(),
            thread_id: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            listening_cue: Vec::new(),
            done_cue: Vec::new(),
            thinking_cue: Vec::new(),
            ding: Vec::new(),
            _output: None,
        }
    }
}
