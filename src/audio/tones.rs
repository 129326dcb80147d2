//! Generated feedback tones and sound file loading
//!
//! Short musical cues indicate listening state:
//! - Ascending C→G: now listening
//! - Descending G→C: finished listening
//! - Looping D→A: thinking (waiting for the backend)

use std::path::Path;

use crate::audio::{resample, OUTPUT_SAMPLE_RATE};
use crate::{Error, Result};

// Note frequencies (Hz)
const C4: f32 = 261.63;
const G4: f32 = 392.00;
const D4: f32 = 293.66;
const A4: f32 = 440.00;

const NOTE_DURATION: f32 = 0.1;
const GAP_DURATION: f32 = 0.05;

// Thinking tone: slower tempo, softer, longer envelope so the loop seam
// doesn't pop
const THINKING_NOTE_DURATION: f32 = 0.4;
const THINKING_VOLUME: f32 = 0.2;
const THINKING_ENVELOPE: f32 = 0.05;

/// Generate a sine tone with a raised-cosine attack and release
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate_tone(frequency: f32, duration: f32, volume: f32, envelope_duration: f32) -> Vec<f32> {
    let sample_rate = OUTPUT_SAMPLE_RATE as f32;
    let num_samples = (sample_rate * duration) as usize;
    let envelope_samples = ((envelope_duration * sample_rate) as usize).min(num_samples / 2);

    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate;
            let tone = (2.0 * std::f32::consts::PI * frequency * t).sin();

            let envelope = if i < envelope_samples {
                let x = i as f32 / envelope_samples as f32;
                0.5 * (1.0 - (std::f32::consts::PI * x).cos())
            } else if i >= num_samples - envelope_samples {
                let x = (num_samples - 1 - i) as f32 / envelope_samples as f32;
                0.5 * (1.0 - (std::f32::consts::PI * x).cos())
            } else {
                1.0
            };

            tone * envelope * volume
        })
        .collect()
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn silence(duration: f32) -> Vec<f32> {
    vec![0.0; (OUTPUT_SAMPLE_RATE as f32 * duration) as usize]
}

fn two_tone_sequence(freq1: f32, freq2: f32) -> Vec<f32> {
    let mut out = generate_tone(freq1, NOTE_DURATION, 0.3, 0.02);
    out.extend(silence(GAP_DURATION));
    out.extend(generate_tone(freq2, NOTE_DURATION, 0.3, 0.02));
    out
}

/// Ascending C→G cue: now listening
#[must_use]
pub fn listening_tone() -> Vec<f32> {
    two_tone_sequence(C4, G4)
}

/// Descending G→C cue: finished listening
#[must_use]
pub fn done_tone() -> Vec<f32> {
    two_tone_sequence(G4, C4)
}

/// One period of the looping D→A thinking cue
#[must_use]
pub fn thinking_sequence() -> Vec<f32> {
    let mut out = generate_tone(D4, THINKING_NOTE_DURATION, THINKING_VOLUME, THINKING_ENVELOPE);
    out.extend(silence(GAP_DURATION));
    out.extend(generate_tone(A4, THINKING_NOTE_DURATION, THINKING_VOLUME, THINKING_ENVELOPE));
    out.extend(silence(GAP_DURATION));
    out
}

/// Short attention chime used before reminder delivery when no ding file
/// is available
#[must_use]
pub fn ding_fallback() -> Vec<f32> {
    let mut out = generate_tone(A4 * 2.0, 0.15, 0.4, 0.02);
    out.extend(silence(0.05));
    out.extend(generate_tone(A4 * 2.0, 0.3, 0.4, 0.02));
    out
}

/// One period of a synthesized alarm, used when no alarm file is available
#[must_use]
pub fn alarm_fallback() -> Vec<f32> {
    let mut out = Vec::new();
    for _ in 0..3 {
        out.extend(generate_tone(A4 * 2.0, 0.12, 0.4, 0.01));
        out.extend(silence(0.08));
    }
    out.extend(silence(0.4));
    out
}

/// Load a mono WAV file, resampled to the mixer rate
///
/// Stereo files are downmixed by averaging channels.
pub fn load_wav(path: &Path) -> Result<Vec<f32>> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| Error::Audio(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(format!("{}: {e}", path.display())))?,
        hound::SampleFormat::Int => {
            let max = f32::from(i16::MAX);
            reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) / max))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(format!("{}: {e}", path.display())))?
        }
    };

    #[allow(clippy::cast_precision_loss)]
    let mono: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    resample(&mono, spec.sample_rate, OUTPUT_SAMPLE_RATE)
}

/// Load a named sound from the sounds directory, falling back to a
/// generated tone when the file is missing
#[must_use]
pub fn load_sound_or(sounds_dir: &Path, name: &str, fallback: fn() -> Vec<f32>) -> Vec<f32> {
    let path = sounds_dir.join(name);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "sound file not found, using generated tone");
        return fallback();
    }
    match load_wav(&path) {
        Ok(samples) => samples,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "failed to load sound, using generated tone");
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_length() {
        let tone = generate_tone(440.0, 0.1, 0.3, 0.02);
        assert_eq!(tone.len(), 4410);
    }

    #[test]
    fn test_envelope_starts_and_ends_near_zero() {
        let tone = generate_tone(440.0, 0.1, 0.3, 0.02);
        assert!(tone[0].abs() < 1e-3);
        assert!(tone[tone.len() - 1].abs() < 1e-3);
    }

    #[test]
    fn test_volume_bound() {
        let tone = generate_tone(440.0, 0.2, 0.3, 0.02);
        assert!(tone.iter().all(|s| s.abs() <= 0.3 + 1e-6));
        assert!(tone.iter().any(|s| s.abs() > 0.2));
    }

    #[test]
    fn test_cue_tones_have_two_notes() {
        // note + gap + note
        let expected = 4410 + 2205 + 4410;
        assert_eq!(listening_tone().len(), expected);
        assert_eq!(done_tone().len(), expected);
    }

    #[test]
    fn test_missing_sound_uses_fallback() {
        let samples = load_sound_or(Path::new("/nonexistent"), "ding.wav", ding_fallback);
        assert_eq!(samples.len(), ding_fallback().len());
    }
}
