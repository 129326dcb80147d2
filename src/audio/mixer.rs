//! Output mixer: one persistent stream for every sound the assistant makes
//!
//! All playback (cue tones, speech, alarm loop) is routed through a single
//! cpal output stream at 44.1 kHz. The hardware callback drains a one-shot
//! clip queue, falls back to loop audio, then silence. Keeping the stream
//! open avoids cold-start pops between clips.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::audio::{resample, OUTPUT_SAMPLE_RATE};
use crate::{Error, Result};

/// Clips are scaled down so their peak never exceeds this
const PEAK_LIMIT: f32 = 0.95;

/// How often a blocked caller re-checks its interrupt condition
const COMPLETION_POLL: Duration = Duration::from_millis(50);

/// Completion signal attached to a queued clip
type DoneFlag = Arc<(Mutex<bool>, Condvar)>;

struct Clip {
    samples: Vec<f32>,
    pos: usize,
    done: Option<DoneFlag>,
}

impl Clip {
    fn finish(&self) {
        if let Some(done) = &self.done {
            let (flag, cv) = &**done;
            if let Ok(mut finished) = flag.lock() {
                *finished = true;
            }
            cv.notify_all();
        }
    }
}

/// State shared between the hardware callback and the rest of the program
///
/// Held under one short lock; the callback never allocates or blocks on
/// anything else.
struct Shared {
    queue: VecDeque<Clip>,
    current: Option<Clip>,
    loop_clip: Option<Arc<Vec<f32>>>,
    loop_pos: usize,
    muted: bool,
}

impl Shared {
    const fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            loop_pos: 0,
            loop_clip: None,
            muted: false,
        }
    }

    /// Fill one output buffer: queued clips, then loop audio, then silence
    fn fill(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels) {
            let sample = if self.muted { 0.0 } else { self.next_sample() };
            for out in frame.iter_mut() {
                *out = sample;
            }
        }
    }

    fn next_sample(&mut self) -> f32 {
        loop {
            if let Some(clip) = &mut self.current {
                if clip.pos < clip.samples.len() {
                    let sample = clip.samples[clip.pos];
                    clip.pos += 1;
                    return sample;
                }
                clip.finish();
                self.current = None;
                continue;
            }

            if let Some(clip) = self.queue.pop_front() {
                self.current = Some(clip);
                continue;
            }

            if let Some(loop_clip) = &self.loop_clip {
                if loop_clip.is_empty() {
                    return 0.0;
                }
                let sample = loop_clip[self.loop_pos];
                self.loop_pos = (self.loop_pos + 1) % loop_clip.len();
                return sample;
            }

            return 0.0;
        }
    }

    /// Drop every in-flight clip, signalling blocked callers
    fn flush(&mut self) {
        if let Some(clip) = self.current.take() {
            clip.finish();
        }
        for clip in self.queue.drain(..) {
            clip.finish();
        }
    }
}

/// Owns the cpal output stream; create once and keep alive
///
/// The stream itself is not `Send`, so the mixer stays on the thread that
/// built it. All playback operations go through cloneable [`MixerHandle`]s.
pub struct OutputMixer {
    handle: MixerHandle,
    _stream: Stream,
}

impl OutputMixer {
    /// Open the default output device and start the persistent stream
    ///
    /// Prefers a mono config at 44.1 kHz; falls back to stereo with the
    /// sample duplicated across channels.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(OUTPUT_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(OUTPUT_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(OUTPUT_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(OUTPUT_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(OUTPUT_SAMPLE_RATE))
            .config();
        let channels = usize::from(config.channels);

        let shared = Arc::new(Mutex::new(Shared::new()));

        let callback_shared = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut state) = callback_shared.lock() {
                        state.fill(data, channels);
                    } else {
                        data.fill(0.0);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio output error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = OUTPUT_SAMPLE_RATE,
            channels,
            "output mixer initialized"
        );

        Ok(Self {
            handle: MixerHandle { shared },
            _stream: stream,
        })
    }

    /// Get a cloneable handle for playback operations
    #[must_use]
    pub fn handle(&self) -> MixerHandle {
        self.handle.clone()
    }
}

/// Cloneable handle to the mixer's shared state
///
/// Safe to use from any thread; the owning [`OutputMixer`] must outlive
/// the sounds you queue.
#[derive(Clone)]
pub struct MixerHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MixerHandle {
    /// Queue a clip for playback; returns whether it was accepted
    ///
    /// The clip is resampled to the mixer rate and peak-limited before it
    /// reaches the callback. No-op while muted.
    pub fn queue(&self, samples: Vec<f32>, sample_rate: u32) -> Result<bool> {
        self.enqueue(samples, sample_rate, None)
    }

    /// Queue a clip and block until it finishes playing
    ///
    /// `interrupt` is polled every 50 ms; when it returns true the queue
    /// and current clip are flushed and `Ok(true)` is returned. `Ok(false)`
    /// means the clip played to completion (or was skipped while muted).
    pub fn queue_blocking(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        interrupt: impl Fn() -> bool,
    ) -> Result<bool> {
        let done: DoneFlag = Arc::new((Mutex::new(false), Condvar::new()));
        if !self.enqueue(samples, sample_rate, Some(Arc::clone(&done)))? {
            return Ok(false);
        }

        let (flag, cv) = &*done;
        let mut finished = flag
            .lock()
            .map_err(|_| Error::Audio("mixer completion lock poisoned".to_string()))?;
        while !*finished {
            if interrupt() {
                drop(finished);
                self.stop_playback();
                return Ok(true);
            }
            let (guard, _timeout) = cv
                .wait_timeout(finished, COMPLETION_POLL)
                .map_err(|_| Error::Audio("mixer completion lock poisoned".to_string()))?;
            finished = guard;
        }
        Ok(false)
    }

    fn enqueue(&self, samples: Vec<f32>, sample_rate: u32, done: Option<DoneFlag>) -> Result<bool> {
        let mut samples = resample(&samples, sample_rate, OUTPUT_SAMPLE_RATE)?;
        limit_peak(&mut samples);

        let mut state = self.lock()?;
        if state.muted {
            if let Some(done) = &done {
                let (flag, _) = &**done;
                if let Ok(mut finished) = flag.lock() {
                    *finished = true;
                }
            }
            return Ok(false);
        }
        state.queue.push_back(Clip {
            samples,
            pos: 0,
            done,
        });
        Ok(true)
    }

    /// Start looping a clip; lowest playback priority
    ///
    /// The clip must already be at the mixer rate (generated tones are).
    pub fn start_loop(&self, samples: Vec<f32>) {
        let mut samples = samples;
        limit_peak(&mut samples);
        if let Ok(mut state) = self.lock() {
            state.loop_clip = Some(Arc::new(samples));
            state.loop_pos = 0;
        }
    }

    /// Stop any looping audio
    pub fn stop_loop(&self) {
        if let Ok(mut state) = self.lock() {
            state.loop_clip = None;
            state.loop_pos = 0;
        }
    }

    /// Drop all queued and in-flight clips, waking blocked callers
    ///
    /// Each flushed clip signals its own completion flag, so callers
    /// parked in [`queue_blocking`](Self::queue_blocking) return.
    pub fn stop_playback(&self) {
        if let Ok(mut state) = self.lock() {
            state.flush();
        }
    }

    /// Mute output and clear in-flight audio
    ///
    /// Idempotent; looping audio is retained and resumes on unmute.
    pub fn mute(&self) {
        if let Ok(mut state) = self.lock() {
            state.muted = true;
            state.flush();
        }
    }

    /// Unmute output; idempotent
    pub fn unmute(&self) {
        if let Ok(mut state) = self.lock() {
            state.muted = false;
        }
    }

    /// Whether output is currently muted
    #[must_use]
    pub fn muted(&self) -> bool {
        self.lock().map(|state| state.muted).unwrap_or(false)
    }

    /// Mute for the duration of the returned guard
    #[must_use]
    pub fn muted_scope(&self) -> MutedGuard<'_> {
        self.mute();
        MutedGuard { handle: self }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Shared>> {
        self.shared
            .lock()
            .map_err(|_| Error::Audio("mixer state lock poisoned".to_string()))
    }

    /// Handle with no backing stream; clips queue but never play
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::new())),
        }
    }

    #[cfg(test)]
    fn fill_output(&self, frames: usize, channels: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * channels];
        self.shared.lock().unwrap().fill(&mut out, channels);
        out
    }
}

/// Restores unmuted output when dropped
pub struct MutedGuard<'a> {
    handle: &'a MixerHandle,
}

impl Drop for MutedGuard<'_> {
    fn drop(&mut self) {
        self.handle.unmute();
    }
}

fn limit_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
    if peak > PEAK_LIMIT {
        let scale = PEAK_LIMIT / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_then_loop_then_silence() {
        let handle = MixerHandle::detached();
        handle.queue(vec![0.5, 0.5], OUTPUT_SAMPLE_RATE).unwrap();
        handle.start_loop(vec![0.25, -0.25]);

        let out = handle.fill_output(6, 1);
        // Queued clip first, then loop audio repeats
        assert_eq!(out, vec![0.5, 0.5, 0.25, -0.25, 0.25, -0.25]);

        handle.stop_loop();
        let out = handle.fill_output(2, 1);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn test_stereo_duplicates_samples() {
        let handle = MixerHandle::detached();
        handle.queue(vec![0.5, -0.5], OUTPUT_SAMPLE_RATE).unwrap();

        let out = handle.fill_output(2, 2);
        assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn test_queue_while_muted_is_noop() {
        let handle = MixerHandle::detached();
        handle.mute();
        let accepted = handle.queue(vec![0.5; 8], OUTPUT_SAMPLE_RATE).unwrap();
        assert!(!accepted);

        handle.unmute();
        let out = handle.fill_output(4, 1);
        assert_eq!(out, vec![0.0; 4]);
    }

    #[test]
    fn test_mute_is_boolean_not_counted() {
        let handle = MixerHandle::detached();
        handle.mute();
        handle.mute();
        handle.unmute();
        // A single unmute clears the state no matter how many mutes preceded it
        assert!(!handle.muted());
    }

    #[test]
    fn test_muted_guard_restores() {
        let handle = MixerHandle::detached();
        {
            let _guard = handle.muted_scope();
            assert!(handle.muted());
        }
        assert!(!handle.muted());
    }

    #[test]
    fn test_mute_clears_in_flight_audio() {
        let handle = MixerHandle::detached();
        handle.queue(vec![0.5; 100], OUTPUT_SAMPLE_RATE).unwrap();
        handle.mute();
        handle.unmute();
        let out = handle.fill_output(4, 1);
        assert_eq!(out, vec![0.0; 4]);
    }

    #[test]
    fn test_mute_silences_loop_without_dropping_it() {
        let handle = MixerHandle::detached();
        handle.start_loop(vec![0.25; 4]);
        handle.mute();
        assert_eq!(handle.fill_output(2, 1), vec![0.0, 0.0]);
        handle.unmute();
        assert_eq!(handle.fill_output(2, 1), vec![0.25, 0.25]);
    }

    #[test]
    fn test_queue_blocking_interrupt() {
        let handle = MixerHandle::detached();
        // Nothing drains the detached queue, so only the interrupt can
        // release the caller
        let interrupted = handle
            .queue_blocking(vec![0.5; 64], OUTPUT_SAMPLE_RATE, || true)
            .unwrap();
        assert!(interrupted);
    }

    #[test]
    fn test_stop_playback_releases_blocked_caller() {
        let handle = MixerHandle::detached();
        let stopper = handle.clone();
        let flusher = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            stopper.stop_playback();
        });

        // The flush finishes the clip, so this reads as completed playback
        let interrupted = handle
            .queue_blocking(vec![0.5; 64], OUTPUT_SAMPLE_RATE, || false)
            .unwrap();
        assert!(!interrupted);
        flusher.join().unwrap();
    }

    #[test]
    fn test_queue_blocking_while_muted_returns_immediately() {
        let handle = MixerHandle::detached();
        handle.mute();
        let interrupted = handle
            .queue_blocking(vec![0.5; 64], OUTPUT_SAMPLE_RATE, || false)
            .unwrap();
        assert!(!interrupted);
    }

    #[test]
    fn test_completion_flag_signalled_when_clip_drains() {
        let handle = MixerHandle::detached();
        handle.queue(vec![0.1, 0.2], OUTPUT_SAMPLE_RATE).unwrap();
        handle.queue(vec![0.3], OUTPUT_SAMPLE_RATE).unwrap();
        // Draining both clips leaves silence
        let out = handle.fill_output(4, 1);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.0]);
    }

    #[test]
    fn test_peak_limiting() {
        let mut samples = vec![2.0, -4.0, 1.0];
        limit_peak(&mut samples);
        assert!((samples[1] + PEAK_LIMIT).abs() < 1e-6);
        assert!((samples[0] - PEAK_LIMIT / 2.0).abs() < 1e-6);
    }
}
