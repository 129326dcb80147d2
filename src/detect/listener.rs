//! Wake-triggered and follow-up speech capture
//!
//! The listener consumes one capture subscription and produces discrete
//! utterances: a pre-roll ring keeps the last few seconds of audio, wake
//! scoring runs on 80 ms frames, and VAD end-pointing stops a capture after
//! sustained trailing silence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{RollingBuffer, INPUT_SAMPLE_RATE};
use crate::detect::vad::SPEECH_PROBABILITY_THRESHOLD;
use crate::detect::{VoiceActivity, WakeScorer, VAD_WINDOW_SAMPLES, WAKE_FRAME_SAMPLES};
use crate::{Error, Result};

/// Seconds of audio kept before the wake trigger
const PREROLL_SECONDS: f32 = 3.0;

/// Trailing silence that ends a capture
const SILENCE_CUTOFF: Duration = Duration::from_millis(1500);

/// Minimum time between wake detections
const DETECTION_COOLDOWN: Duration = Duration::from_secs(2);

/// How often blocked waits re-check the interrupt flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bound on a wake capture in which no speech ever registers
///
/// The pre-roll seed normally arms the silence timer the moment capture
/// starts; when it does not, the capture ends here and whatever audio
/// accumulated is returned as the utterance.
const WAKE_CAPTURE_TIMEOUT: Duration = Duration::from_secs(6);

/// What to do when a capture times out before any speech
enum TimeoutBehavior {
    /// Return whatever was accumulated (wake-triggered capture)
    ReturnAudio,
    /// Report no speech (follow-up capture)
    ReturnNone,
}

/// Turns a stream of capture frames into discrete utterances
pub struct SpeechListener {
    frames: Receiver<Vec<f32>>,
    scorer: Box<dyn WakeScorer>,
    vad: Box<dyn VoiceActivity>,
    preroll: RollingBuffer,
    pending_wake: Vec<f32>,
    threshold: f32,
    last_detection: Option<Instant>,
    interrupt: Arc<AtomicBool>,
}

impl SpeechListener {
    pub fn new(
        frames: Receiver<Vec<f32>>,
        scorer: Box<dyn WakeScorer>,
        vad: Box<dyn VoiceActivity>,
        threshold: f32,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        Self {
            frames,
            scorer,
            vad,
            preroll: RollingBuffer::new(PREROLL_SECONDS, INPUT_SAMPLE_RATE),
            pending_wake: Vec::with_capacity(WAKE_FRAME_SAMPLES * 2),
            threshold,
            last_detection: None,
            interrupt,
        }
    }

    /// Shared flag that aborts any blocking wait on this listener
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Check the interrupt flag without clearing it
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Clear the interrupt flag
    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::SeqCst);
    }

    /// Block until the wake phrase is heard, then capture the utterance
    ///
    /// `on_wake` runs the moment the score crosses the threshold, before
    /// capture continues. The returned audio is the pre-roll snapshot plus
    /// everything up to the trailing-silence cut-off; it may contain no
    /// speech at all, which is a valid empty utterance.
    ///
    /// Returns `None` when interrupted; the flag is left set so the caller
    /// can tell interruption apart from a completed capture.
    pub fn wait_for_wake_and_speech(
        &mut self,
        mut on_wake: impl FnMut(),
    ) -> Result<Option<Vec<f32>>> {
        self.preroll.clear();
        self.pending_wake.clear();
        self.scorer.reset();
        self.drain_stale_frames();

        loop {
            if self.is_interrupted() {
                return Ok(None);
            }

            let frame = match self.frames.recv_timeout(POLL_INTERVAL) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Audio("capture channel closed".to_string()));
                }
            };

            self.preroll.extend(&frame);
            self.pending_wake.extend_from_slice(&frame);

            while self.pending_wake.len() >= WAKE_FRAME_SAMPLES {
                let wake_frame: Vec<f32> =
                    self.pending_wake.drain(..WAKE_FRAME_SAMPLES).collect();
                let score = self.scorer.score(&wake_frame);

                if score >= self.threshold && self.cooldown_elapsed() {
                    self.last_detection = Some(Instant::now());
                    tracing::debug!(score, "wake phrase detected");
                    on_wake();

                    let seed = self.preroll.snapshot();
                    return self.record_until_silence(
                        seed,
                        Some(WAKE_CAPTURE_TIMEOUT),
                        TimeoutBehavior::ReturnAudio,
                    );
                }
            }
        }
    }

    /// Capture a follow-up utterance without a wake trigger
    ///
    /// Returns `None` if no speech starts within `timeout` or the wait is
    /// interrupted.
    pub fn listen_for_speech(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>> {
        self.drain_stale_frames();
        self.record_until_silence(Vec::new(), Some(timeout), TimeoutBehavior::ReturnNone)
    }

    /// Accumulate frames until speech has been heard and then trailed off
    ///
    /// The silence timer arms at the first speech-positive VAD window,
    /// whether that window is in the seed or in a newly received frame.
    /// Partial VAD windows never drop audio: whole frames are always kept
    /// in the utterance.
    fn record_until_silence(
        &mut self,
        seed: Vec<f32>,
        timeout: Option<Duration>,
        on_timeout: TimeoutBehavior,
    ) -> Result<Option<Vec<f32>>> {
        let mut audio = seed;
        let mut vad_pending: Vec<f32> = Vec::with_capacity(VAD_WINDOW_SAMPLES * 2);
        let started = Instant::now();
        let mut last_speech = Instant::now();

        // Speech already in the seed (the wake utterance itself) counts, so
        // the silence timer is armed from the start of the capture
        let mut speech_seen = audio.chunks(VAD_WINDOW_SAMPLES).any(|window| {
            window.len() == VAD_WINDOW_SAMPLES
                && self.vad.speech_probability(window) > SPEECH_PROBABILITY_THRESHOLD
        });

        loop {
            if self.is_interrupted() {
                return Ok(None);
            }

            match self.frames.recv_timeout(POLL_INTERVAL) {
                Ok(frame) => {
                    audio.extend_from_slice(&frame);
                    vad_pending.extend_from_slice(&frame);

                    while vad_pending.len() >= VAD_WINDOW_SAMPLES {
                        let window: Vec<f32> =
                            vad_pending.drain(..VAD_WINDOW_SAMPLES).collect();
                        if self.vad.speech_probability(&window) > SPEECH_PROBABILITY_THRESHOLD {
                            speech_seen = true;
                            last_speech = Instant::now();
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Audio("capture channel closed".to_string()));
                }
            }

            if speech_seen && last_speech.elapsed() >= SILENCE_CUTOFF {
                tracing::debug!(samples = audio.len(), "utterance complete");
                return Ok(Some(audio));
            }

            if let Some(limit) = timeout {
                if !speech_seen && started.elapsed() >= limit {
                    return Ok(match on_timeout {
                        TimeoutBehavior::ReturnAudio => Some(audio),
                        TimeoutBehavior::ReturnNone => None,
                    });
                }
            }
        }
    }

    fn cooldown_elapsed(&self) -> bool {
        self.last_detection
            .map_or(true, |at| at.elapsed() >= DETECTION_COOLDOWN)
    }

    fn drain_stale_frames(&self) {
        while self.frames.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{EnergyVad, EnergyWakeScorer};
    use std::sync::mpsc::channel;

    fn sine(duration_secs: f32, amplitude: f32) -> Vec<f32> {
        let n = (INPUT_SAMPLE_RATE as f32 * duration_secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / INPUT_SAMPLE_RATE as f32;
                amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    fn listener_with_feed() -> (SpeechListener, std::sync::mpsc::Sender<Vec<f32>>) {
        let (tx, rx) = channel();
        let listener = SpeechListener::new(
            rx,
            Box::new(EnergyWakeScorer::default()),
            Box::new(EnergyVad::default()),
            0.5,
            Arc::new(AtomicBool::new(false)),
        );
        (listener, tx)
    }

    #[test]
    fn test_follow_up_timeout_is_none() {
        let (mut listener, tx) = listener_with_feed();
        // Only silence arrives
        tx.send(vec![0.0; 4096]).unwrap();
        let result = listener
            .listen_for_speech(Duration::from_millis(200))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_follow_up_captures_endpointed_speech() {
        let (mut listener, tx) = listener_with_feed();
        let speech = sine(0.5, 0.3);
        let speech_len = speech.len();
        tx.send(speech).unwrap();
        // 2 s of silence comfortably clears the 1.5 s cut-off
        tx.send(vec![0.0; INPUT_SAMPLE_RATE as usize * 2]).unwrap();

        let audio = listener
            .listen_for_speech(Duration::from_secs(5))
            .unwrap()
            .expect("speech should be captured");
        assert!(audio.len() >= speech_len);
    }

    #[test]
    fn test_interrupt_aborts_wait() {
        let (mut listener, _tx) = listener_with_feed();
        let flag = listener.interrupt_flag();
        flag.store(true, Ordering::SeqCst);

        let result = listener.wait_for_wake_and_speech(|| {}).unwrap();
        assert!(result.is_none());
        // Flag stays set so the caller can distinguish the cause
        assert!(listener.is_interrupted());
    }

    #[test]
    fn test_wake_capture_includes_preroll() {
        let (mut listener, tx) = listener_with_feed();

        // Quiet lead-in lands in the pre-roll, loud sustained audio trips
        // the wake scorer, then silence ends the capture
        let quiet = sine(0.5, 0.005);
        let quiet_len = quiet.len();
        tx.send(quiet).unwrap();
        tx.send(sine(1.0, 0.3)).unwrap();
        tx.send(vec![0.0; INPUT_SAMPLE_RATE as usize * 2]).unwrap();

        let mut woke = false;
        let audio = listener
            .wait_for_wake_and_speech(|| woke = true)
            .unwrap()
            .expect("wake should trigger");

        assert!(woke);
        // The capture contains at least the quiet lead-in plus the speech
        assert!(audio.len() > quiet_len);
    }
}
