//! Wake-phrase detection and VAD end-pointed speech capture

pub mod listener;
pub mod monitor;
pub mod vad;
pub mod wake;

pub use listener::SpeechListener;
pub use monitor::WakeMonitor;
pub use vad::{EnergyVad, VoiceActivity};
pub use wake::{EnergyWakeScorer, WakeScorer};

/// Samples per wake-scoring frame (80 ms at 16 kHz)
pub const WAKE_FRAME_SAMPLES: usize = 1280;

/// Samples per VAD window (32 ms at 16 kHz)
pub const VAD_WINDOW_SAMPLES: usize = 512;
