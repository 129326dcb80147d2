//! Background reminder delivery scheduling

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{Local, Timelike};

use crate::store::{Reminder, ReminderRepo};

/// Upper bound on how long the scheduler sleeps between checks
const MAX_WAIT: Duration = Duration::from_secs(60);

/// How long [`stop`](ReminderScheduler::stop) waits for the thread to exit
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

struct SchedState {
    pending_delivery: Option<Reminder>,
    stopping: bool,
}

struct Shared {
    state: Mutex<SchedState>,
    changed: Condvar,
    repo: ReminderRepo,
    interrupt: Arc<AtomicBool>,
}

/// Watches the reminder store and flags reminders as they come due
///
/// When a pending reminder's due time arrives the scheduler parks it as the
/// pending delivery and trips the listener interrupt so the idle wake wait
/// returns. Delivery itself happens on the conversation thread; the
/// scheduler holds the reminder until the outcome is recorded.
#[derive(Clone)]
pub struct ReminderScheduler {
    shared: Arc<Shared>,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ReminderScheduler {
    #[must_use]
    pub fn new(repo: ReminderRepo, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedState {
                    pending_delivery: None,
                    stopping: false,
                }),
                changed: Condvar::new(),
                repo,
                interrupt,
            }),
            handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduling thread; a no-op if already running
    pub fn start(&self) {
        let Ok(mut slot) = self.handle.lock() else {
            return;
        };
        if slot.is_some() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        match std::thread::Builder::new()
            .name("reminder-scheduler".to_string())
            .spawn(move || run(&shared))
        {
            Ok(handle) => *slot = Some(handle),
            Err(e) => tracing::error!(error = %e, "failed to spawn reminder scheduler"),
        }
    }

    /// Stop the scheduling thread
    pub fn stop(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.stopping = true;
        }
        self.shared.changed.notify_all();

        if let Ok(mut slot) = self.handle.lock() {
            if let Some(handle) = slot.take() {
                // Bounded join; the loop wakes at least every MAX_WAIT
                let deadline = std::time::Instant::now() + STOP_TIMEOUT;
                while !handle.is_finished() && std::time::Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(10));
                }
                if handle.is_finished() {
                    let _ = handle.join();
                } else {
                    tracing::warn!("reminder scheduler did not stop in time");
                }
            }
        }
    }

    /// The reminder currently awaiting delivery, if any
    #[must_use]
    pub fn pending_delivery(&self) -> Option<Reminder> {
        self.shared
            .state
            .lock()
            .ok()
            .and_then(|state| state.pending_delivery.clone())
    }

    /// Record that the pending reminder was acknowledged and cleared
    pub fn mark_cleared(&self, id: i64) {
        if let Err(e) = self.shared.repo.clear(id) {
            tracing::error!(error = %e, id, "failed to clear reminder");
        }
        self.release_pending();
    }

    /// Re-schedule the pending reminder `minutes` from now
    ///
    /// The new due time is persisted, so the retry survives a restart.
    pub fn schedule_retry(&self, id: i64, minutes: i64) {
        if let Err(e) = self.shared.repo.snooze(id, minutes) {
            tracing::error!(error = %e, id, "failed to re-schedule reminder");
        }
        self.release_pending();
    }

    /// Wake the scheduler after the store changed underneath it
    pub fn notify_changed(&self) {
        self.shared.changed.notify_all();
    }

    fn release_pending(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.pending_delivery = None;
        }
        self.shared.changed.notify_all();
    }
}

fn run(shared: &Shared) {
    tracing::debug!("reminder scheduler started");
    loop {
        let Ok(mut state) = shared.state.lock() else {
            return;
        };
        if state.stopping {
            return;
        }

        // Hold off while a delivery is in flight
        if state.pending_delivery.is_some() {
            let _unused = shared.changed.wait_timeout(state, MAX_WAIT);
            continue;
        }

        let now = Local::now();
        match shared.repo.due(now) {
            Ok(mut due) => {
                if !due.is_empty() {
                    let reminder = due.remove(0);
                    tracing::info!(id = reminder.id, message = %reminder.message, "reminder due");
                    state.pending_delivery = Some(reminder);
                    drop(state);
                    // Break the idle wake wait so delivery starts promptly
                    shared.interrupt.store(true, Ordering::SeqCst);
                    continue;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to query due reminders");
            }
        }

        let wait = next_wait(shared, now);
        let _unused = shared.changed.wait_timeout(state, wait);
    }
}

/// Time until the next pending reminder's minute begins, capped at MAX_WAIT
fn next_wait(shared: &Shared, now: chrono::DateTime<Local>) -> Duration {
    let next = match shared.repo.next_pending_time() {
        Ok(next) => next,
        Err(e) => {
            tracing::error!(error = %e, "failed to query next reminder");
            return MAX_WAIT;
        }
    };
    let Some(next) = next else {
        return MAX_WAIT;
    };

    // Reminders fire at minute resolution
    let target = next.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(next);
    let until = (target - now).to_std().unwrap_or(Duration::ZERO);
    until.min(MAX_WAIT).max(Duration::from_millis(50))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{init_memory, ReminderStatus};
    use chrono::Duration as ChronoDuration;
    use std::time::Instant;

    fn scheduler() -> (ReminderScheduler, ReminderRepo, Arc<AtomicBool>) {
        let repo = ReminderRepo::new(init_memory().unwrap());
        let interrupt = Arc::new(AtomicBool::new(false));
        let sched = ReminderScheduler::new(repo.clone(), Arc::clone(&interrupt));
        (sched, repo, interrupt)
    }

    fn wait_for_pending(sched: &ReminderScheduler) -> Option<Reminder> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(r) = sched.pending_delivery() {
                return Some(r);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        None
    }

    #[test]
    fn test_due_reminder_becomes_pending_and_interrupts() {
        let (sched, repo, interrupt) = scheduler();
        let created = repo
            .create("water the plants", Local::now() - ChronoDuration::minutes(1))
            .unwrap();

        sched.start();
        let pending = wait_for_pending(&sched).expect("reminder should come due");
        assert_eq!(pending.id, created.id);
        assert!(interrupt.load(Ordering::SeqCst));
        sched.stop();
    }

    #[test]
    fn test_mark_cleared_releases_and_persists() {
        let (sched, repo, _interrupt) = scheduler();
        let created = repo
            .create("stretch", Local::now() - ChronoDuration::minutes(1))
            .unwrap();

        sched.start();
        let pending = wait_for_pending(&sched).unwrap();
        sched.mark_cleared(pending.id);

        assert!(sched.pending_delivery().is_none());
        let stored = repo.get(created.id).unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Cleared);
        sched.stop();
    }

    #[test]
    fn test_retry_pushes_due_time_out() {
        let (sched, repo, _interrupt) = scheduler();
        let created = repo
            .create("call back", Local::now() - ChronoDuration::minutes(1))
            .unwrap();

        sched.start();
        let pending = wait_for_pending(&sched).unwrap();
        sched.schedule_retry(pending.id, 10);

        assert!(sched.pending_delivery().is_none());
        let stored = repo.get(created.id).unwrap().unwrap();
        assert_eq!(stored.status, ReminderStatus::Pending);
        assert!(stored.due_at > Local::now() + ChronoDuration::minutes(9));
        sched.stop();
    }

    #[test]
    fn test_simultaneous_due_reminders_surface_one_at_a_time() {
        let (sched, repo, _interrupt) = scheduler();
        let first = repo
            .create("feed the cat", Local::now() - ChronoDuration::minutes(5))
            .unwrap();
        let second = repo
            .create("take out the trash", Local::now() - ChronoDuration::minutes(1))
            .unwrap();

        sched.start();
        let pending = wait_for_pending(&sched).unwrap();
        assert_eq!(pending.id, first.id);
        // The second stays queued until the first delivery resolves
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(sched.pending_delivery().unwrap().id, first.id);

        sched.mark_cleared(first.id);
        let next = wait_for_pending(&sched).unwrap();
        assert_eq!(next.id, second.id);
        sched.stop();
    }

    #[test]
    fn test_future_reminder_stays_quiet() {
        let (sched, repo, interrupt) = scheduler();
        repo.create("later", Local::now() + ChronoDuration::hours(1))
            .unwrap();

        sched.start();
        std::thread::sleep(Duration::from_millis(100));
        assert!(sched.pending_delivery().is_none());
        assert!(!interrupt.load(Ordering::SeqCst));
        sched.stop();
    }
}
