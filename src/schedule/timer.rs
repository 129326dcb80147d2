//! Named countdown timers with a looping alarm

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::{tones, MixerHandle};
use crate::schedule::format_duration;

/// How often countdown threads re-check their cancel flag
const TICK: Duration = Duration::from_millis(100);

enum TimerState {
    Counting,
    Ringing,
}

struct TimerEntry {
    duration: Duration,
    started: Instant,
    state: TimerState,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

struct TimersInner {
    timers: HashMap<String, TimerEntry>,
    ringing: Option<String>,
    muted: bool,
}

/// Manages named countdown timers
///
/// Each timer counts down on its own thread; when it fires the alarm clip
/// loops on the mixer until the timer is stopped. Muting silences the alarm
/// loop without cancelling any timer.
#[derive(Clone)]
pub struct TimerManager {
    inner: Arc<Mutex<TimersInner>>,
    mixer: MixerHandle,
    alarm: Arc<Vec<f32>>,
}

impl TimerManager {
    #[must_use]
    pub fn new(mixer: MixerHandle, alarm: Vec<f32>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TimersInner {
                timers: HashMap::new(),
                ringing: None,
                muted: false,
            })),
            mixer,
            alarm: Arc::new(alarm),
        }
    }

    /// Start (or restart) a named timer
    ///
    /// Setting a timer with an existing name replaces it; if the old timer
    /// was ringing the alarm is silenced first.
    pub fn set(&self, name: &str, duration: Duration) -> String {
        let cancel = Arc::new(AtomicBool::new(false));

        // Insert before spawning so the countdown always finds its entry
        let old = {
            let Ok(mut inner) = self.inner.lock() else {
                return "Sorry, I couldn't set that timer.".to_string();
            };
            let old = inner.timers.insert(
                name.to_string(),
                TimerEntry {
                    duration,
                    started: Instant::now(),
                    state: TimerState::Counting,
                    cancel: Arc::clone(&cancel),
                    handle: None,
                },
            );
            if old.is_some() && inner.ringing.as_deref() == Some(name) {
                inner.ringing = None;
                self.mixer.stop_loop();
            }
            old
        };
        Self::reap(old);

        let thread_inner = Arc::clone(&self.inner);
        let thread_mixer = self.mixer.clone();
        let thread_alarm = Arc::clone(&self.alarm);
        let thread_cancel = Arc::clone(&cancel);
        let thread_name = name.to_string();

        let handle = std::thread::Builder::new()
            .name(format!("timer-{name}"))
            .spawn(move || {
                let started = Instant::now();
                while started.elapsed() < duration {
                    if thread_cancel.load(Ordering::SeqCst) {
                        return;
                    }
                    let remaining = duration - started.elapsed().min(duration);
                    std::thread::sleep(remaining.min(TICK));
                }
                if thread_cancel.load(Ordering::SeqCst) {
                    return;
                }

                let Ok(mut inner) = thread_inner.lock() else {
                    return;
                };
                if let Some(entry) = inner.timers.get_mut(&thread_name) {
                    // A same-name replacement owns this slot now
                    if !Arc::ptr_eq(&entry.cancel, &thread_cancel) {
                        return;
                    }
                    entry.state = TimerState::Ringing;
                    inner.ringing = Some(thread_name.clone());
                    tracing::info!(timer = %thread_name, "timer fired");
                    if !inner.muted {
                        thread_mixer.start_loop((*thread_alarm).clone());
                    }
                }
            });

        match handle {
            Ok(handle) => {
                if let Ok(mut inner) = self.inner.lock() {
                    if let Some(entry) = inner.timers.get_mut(name) {
                        // Only attach to the entry this call created
                        if Arc::ptr_eq(&entry.cancel, &cancel) {
                            entry.handle = Some(handle);
                        }
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to spawn timer thread"),
        }

        format!("Timer '{name}' set for {}.", format_duration(duration))
    }

    /// Describe every running and ringing timer
    #[must_use]
    pub fn status(&self) -> String {
        let Ok(inner) = self.inner.lock() else {
            return "Sorry, I couldn't check the timers.".to_string();
        };
        if inner.timers.is_empty() {
            return "No timers are currently running.".to_string();
        }

        let mut lines: Vec<String> = inner
            .timers
            .iter()
            .map(|(name, entry)| match entry.state {
                TimerState::Ringing => format!("Timer '{name}' is ringing"),
                TimerState::Counting => {
                    let remaining = entry
                        .duration
                        .saturating_sub(entry.started.elapsed());
                    format!("Timer '{name}' has {} remaining", format_duration(remaining))
                }
            })
            .collect();
        lines.sort();
        format!("{}.", lines.join(". "))
    }

    /// Stop a timer by name, or the ringing one when no name is given
    pub fn stop(&self, name: Option<&str>) -> String {
        match name {
            Some(name) => {
                let Ok(mut inner) = self.inner.lock() else {
                    return "Sorry, I couldn't stop that timer.".to_string();
                };
                let Some(entry) = inner.timers.remove(name) else {
                    return format!("No timer named '{name}' found.");
                };
                entry.cancel.store(true, Ordering::SeqCst);
                if inner.ringing.as_deref() == Some(name) {
                    inner.ringing = None;
                    self.mixer.stop_loop();
                }
                drop(inner);
                Self::reap(Some(entry));
                format!("Stopped timer '{name}'.")
            }
            None => {
                if self.stop_any_ringing() {
                    "Timer stopped.".to_string()
                } else {
                    "No timer is currently ringing.".to_string()
                }
            }
        }
    }

    /// Silence and remove the ringing timer, if any
    pub fn stop_any_ringing(&self) -> bool {
        let entry = {
            let Ok(mut inner) = self.inner.lock() else {
                return false;
            };
            let Some(name) = inner.ringing.take() else {
                return false;
            };
            self.mixer.stop_loop();
            inner.timers.remove(&name)
        };
        Self::reap(entry);
        true
    }

    /// Whether a timer is currently ringing
    #[must_use]
    pub fn is_ringing(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.ringing.is_some())
            .unwrap_or(false)
    }

    /// Silence the alarm loop without cancelling timers
    ///
    /// A timer that fires while muted rings silently; the alarm resumes on
    /// [`unmute`](Self::unmute) if it is still ringing.
    pub fn mute(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.muted = true;
            if inner.ringing.is_some() {
                self.mixer.stop_loop();
            }
        }
    }

    /// Resume the alarm loop for any still-ringing timer
    pub fn unmute(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.muted = false;
            if inner.ringing.is_some() {
                self.mixer.start_loop((*self.alarm).clone());
            }
        }
    }

    /// Cancel every timer and join their threads
    pub fn shutdown(&self) {
        let entries: Vec<TimerEntry> = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            if inner.ringing.take().is_some() {
                self.mixer.stop_loop();
            }
            inner.timers.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            entry.cancel.store(true, Ordering::SeqCst);
            Self::reap(Some(entry));
        }
    }

    fn reap(entry: Option<TimerEntry>) {
        if let Some(mut entry) = entry {
            entry.cancel.store(true, Ordering::SeqCst);
            if let Some(handle) = entry.handle.take() {
                let _ = handle.join();
            }
        }
    }
}
