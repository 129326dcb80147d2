//! Background wake monitoring during speech playback
//!
//! Runs a second listener on its own capture subscription so the user can
//! interrupt the assistant mid-sentence. When the wake phrase fires the
//! monitor captures the rest of the utterance itself, so the caller can
//! hand the audio straight to transcription without listening again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::detect::SpeechListener;

/// Watches for the wake phrase while other audio plays
pub struct WakeMonitor {
    listener: Option<SpeechListener>,
    interrupt: Arc<AtomicBool>,
    detected: Arc<AtomicBool>,
    handle: Option<JoinHandle<(SpeechListener, Option<Vec<f32>>)>>,
}

impl WakeMonitor {
    /// Wrap a listener with its own capture subscription
    #[must_use]
    pub fn new(listener: SpeechListener) -> Self {
        let interrupt = listener.interrupt_flag();
        Self {
            listener: Some(listener),
            interrupt,
            detected: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start monitoring in a background thread; a no-op if already running
    pub fn start(&mut self) {
        let Some(mut listener) = self.listener.take() else {
            return;
        };

        self.detected.store(false, Ordering::SeqCst);
        listener.clear_interrupt();

        let detected = Arc::clone(&self.detected);
        let handle = std::thread::Builder::new()
            .name("wake-monitor".to_string())
            .spawn(move || {
                let flag = Arc::clone(&detected);
                let capture = listener
                    .wait_for_wake_and_speech(move || flag.store(true, Ordering::SeqCst))
                    .unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "wake monitor failed");
                        None
                    });
                (listener, capture)
            });

        match handle {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => tracing::error!(error = %e, "failed to spawn wake monitor"),
        }
    }

    /// Whether the wake phrase fired since the last [`start`](Self::start)
    #[must_use]
    pub fn was_detected(&self) -> bool {
        self.detected.load(Ordering::SeqCst)
    }

    /// Stop monitoring and return any captured interruption audio
    ///
    /// If the wake phrase fired, the join waits for the end-pointed capture
    /// to finish so the interruption audio is not cut off.
    pub fn stop(&mut self) -> Option<Vec<f32>> {
        let handle = self.handle.take()?;

        // Unblock the listener if it is still waiting for the wake phrase;
        // a detected capture is left to run to its end-point
        if !self.was_detected() {
            self.interrupt.store(true, Ordering::SeqCst);
        }

        match handle.join() {
            Ok((listener, capture)) => {
                listener.clear_interrupt();
                self.listener = Some(listener);
                capture
            }
            Err(_) => {
                tracing::error!("wake monitor thread panicked");
                None
            }
        }
    }
}

impl Drop for WakeMonitor {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}
