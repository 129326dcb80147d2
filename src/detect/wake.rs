//! Wake-phrase scoring

use crate::audio::rms;

/// Scores audio frames for the wake phrase
///
/// The listener feeds 80 ms frames and triggers when the score crosses the
/// configured threshold. Model-based scorers (ONNX wake models) plug in
/// here; the built-in scorer is energy-based.
pub trait WakeScorer: Send {
    /// Score (0.0 to 1.0) for the latest frame, given prior context
    fn score(&mut self, frame: &[f32]) -> f32;

    /// Reset any internal state between detection sessions
    fn reset(&mut self);
}

/// Energy-based wake scorer
///
/// Smooths per-frame RMS into a sustained-speech score. Triggers on any
/// sufficiently loud, sustained audio rather than a specific phrase, which
/// makes it a usable stand-in when no wake model is installed.
#[derive(Debug, Clone)]
pub struct EnergyWakeScorer {
    reference_rms: f32,
    smoothed: f32,
}

impl EnergyWakeScorer {
    /// RMS level treated as certain speech
    pub const DEFAULT_REFERENCE_RMS: f32 = 0.04;

    /// Exponential smoothing factor for the running score
    const SMOOTHING: f32 = 0.3;

    #[must_use]
    pub fn new(reference_rms: f32) -> Self {
        Self {
            reference_rms: reference_rms.max(f32::EPSILON),
            smoothed: 0.0,
        }
    }
}

impl Default for EnergyWakeScorer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REFERENCE_RMS)
    }
}

impl WakeScorer for EnergyWakeScorer {
    fn score(&mut self, frame: &[f32]) -> f32 {
        let level = (rms(frame) / self.reference_rms).clamp(0.0, 1.0);
        self.smoothed = (1.0 - Self::SMOOTHING) * self.smoothed + Self::SMOOTHING * level;
        self.smoothed
    }

    fn reset(&mut self) {
        self.smoothed = 0.0;
    }
}
