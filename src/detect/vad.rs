//! Voice activity detection

use crate::audio::rms;

/// Probability above which a VAD window counts as speech
pub const SPEECH_PROBABILITY_THRESHOLD: f32 = 0.5;

/// Maps an audio window to a speech probability
///
/// Implementations must be cheap enough to run on every captured window.
pub trait VoiceActivity: Send {
    /// Probability (0.0 to 1.0) that the window contains speech
    fn speech_probability(&self, window: &[f32]) -> f32;
}

/// Energy-based voice activity detector
///
/// Maps window RMS linearly onto 0.0–1.0, saturating at `reference_rms`.
/// Crude next to a model-based VAD but dependency-free and good enough to
/// end-point utterances in a quiet room.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    reference_rms: f32,
}

impl EnergyVad {
    /// RMS level treated as certain speech
    pub const DEFAULT_REFERENCE_RMS: f32 = 0.02;

    #[must_use]
    pub fn new(reference_rms: f32) -> Self {
        Self {
            reference_rms: reference_rms.max(f32::EPSILON),
        }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REFERENCE_RMS)
    }
}

impl VoiceActivity for EnergyVad {
    fn speech_probability(&self, window: &[f32]) -> f32 {
        (rms(window) / self.reference_rms).clamp(0.0, 1.0)
    }
}
