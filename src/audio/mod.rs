//! Audio I/O: capture fan-out, output mixing, pre-roll buffering, tones

pub mod capture;
pub mod mixer;
pub mod ring;
pub mod tones;

pub use capture::CaptureSource;
pub use mixer::{MixerHandle, MutedGuard, OutputMixer};
pub use ring::RollingBuffer;

use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

/// Sample rate for audio capture (16 kHz for speech)
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate for all playback through the mixer
pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// Calculate RMS energy of a sample window
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Resample mono audio between sample rates
///
/// Uses an FFT resampler for anything longer than one chunk; short clips
/// fall back to linear interpolation, which is fine for cue tones.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    const CHUNK: usize = 1024;

    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if samples.len() < CHUNK {
        return Ok(resample_linear(samples, from, to));
    }

    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, CHUNK, 2, 1)
        .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let ratio = f64::from(to) / f64::from(from);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut out = Vec::with_capacity((samples.len() as f64 * ratio) as usize + CHUNK);

    let mut pos = 0;
    while pos + CHUNK <= samples.len() {
        let frames = resampler
            .process(&[&samples[pos..pos + CHUNK]], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        out.extend_from_slice(&frames[0]);
        pos += CHUNK;
    }
    if pos < samples.len() {
        let frames = resampler
            .process_partial(Some(&[&samples[pos..]]), None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        out.extend_from_slice(&frames[0]);
    }

    Ok(out)
}

/// Linear-interpolation resampling for short clips
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = f64::from(from) / f64::from(to);
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;

    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx = src.floor() as usize;
            let frac = (src - src.floor()) as f32;
            let a = samples[idx];
            let b = samples.get(idx + 1).copied().unwrap_or(a);
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_silence_is_zero() {
        assert!(rms(&vec![0.0; 512]) < f32::EPSILON);
        assert!(rms(&[]) < f32::EPSILON);
    }

    #[test]
    fn test_rms_full_scale_square() {
        let samples: Vec<f32> = (0..512).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((rms(&samples) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(resample(&samples, 16_000, 16_000).unwrap(), samples);
    }

    #[test]
    fn test_resample_length_ratio() {
        let samples = vec![0.5_f32; 16_000];
        let out = resample(&samples, 16_000, 44_100).unwrap();
        // FFT resampler output length tracks the ratio within one chunk
        let expected = 44_100;
        assert!((out.len() as i64 - expected).unsigned_abs() < 3000);
    }

    #[test]
    fn test_resample_linear_halves() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let out = resample_linear(&samples, 44_100, 22_050);
        assert_eq!(out.len(), 50);
        // Downsampled ramp stays monotonic
        assert!(out.windows(2).all(|w| w[1] > w[0]));
    }
}
