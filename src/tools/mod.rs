//! Assistant tools and their dispatch

pub mod datetime;

use chrono::{DateTime, Local};
use serde_json::Value;

use crate::schedule::{ReminderScheduler, TimerManager};
use crate::store::{ReminderRepo, ReminderStatus};
use crate::{Error, Result};

pub use datetime::{format_clock, format_when, parse_when};

/// Everything the assistant can do besides talk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    SetTimer,
    CheckTimers,
    StopTimer,
    CreateReminder,
    ListReminders,
    UpdateReminder,
    DeleteReminder,
    CurrentTime,
}

/// Static description of a tool
pub struct ToolSpec {
    pub kind: ToolKind,
    pub name: &'static str,
    pub summary: &'static str,
    /// Whether the user must confirm before the tool runs
    pub requires_confirmation: bool,
}

/// Tool registry; creation of reminders is gated behind confirmation
pub static TOOL_SPECS: &[ToolSpec] = &[
    ToolSpec {
        kind: ToolKind::SetTimer,
        name: "set_timer",
        summary: "Start a named countdown timer",
        requires_confirmation: false,
    },
    ToolSpec {
        kind: ToolKind::CheckTimers,
        name: "check_timers",
        summary: "Report running and ringing timers",
        requires_confirmation: false,
    },
    ToolSpec {
        kind: ToolKind::StopTimer,
        name: "stop_timer",
        summary: "Stop a ringing or running timer",
        requires_confirmation: false,
    },
    ToolSpec {
        kind: ToolKind::CreateReminder,
        name: "create_reminder",
        summary: "Create a reminder for a future time",
        requires_confirmation: true,
    },
    ToolSpec {
        kind: ToolKind::ListReminders,
        name: "list_reminders",
        summary: "List upcoming reminders",
        requires_confirmation: false,
    },
    ToolSpec {
        kind: ToolKind::UpdateReminder,
        name: "update_reminder",
        summary: "Change a reminder's message or time",
        requires_confirmation: false,
    },
    ToolSpec {
        kind: ToolKind::DeleteReminder,
        name: "delete_reminder",
        summary: "Delete a reminder",
        requires_confirmation: false,
    },
    ToolSpec {
        kind: ToolKind::CurrentTime,
        name: "current_time",
        summary: "Report the current wall-clock time",
        requires_confirmation: false,
    },
];

impl ToolKind {
    #[must_use]
    pub fn spec(self) -> &'static ToolSpec {
        TOOL_SPECS
            .iter()
            .find(|spec| spec.kind == self)
            .unwrap_or(&TOOL_SPECS[0])
    }

    #[must_use]
    pub fn requires_confirmation(self) -> bool {
        self.spec().requires_confirmation
    }
}

/// A tool call with its arguments resolved
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub kind: ToolKind,
    pub args: Value,
}

impl ToolInvocation {
    #[must_use]
    pub fn new(kind: ToolKind, args: Value) -> Self {
        Self { kind, args }
    }

    fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    fn u64_arg(&self, key: &str) -> Option<u64> {
        self.args.get(key).and_then(Value::as_u64)
    }

    fn i64_arg(&self, key: &str) -> Option<i64> {
        self.args.get(key).and_then(Value::as_i64)
    }
}

/// Executes tool invocations against the live timers and reminder store
#[derive(Clone)]
pub struct ToolRouter {
    timers: TimerManager,
    reminders: ReminderRepo,
    scheduler: ReminderScheduler,
}

impl ToolRouter {
    #[must_use]
    pub fn new(
        timers: TimerManager,
        reminders: ReminderRepo,
        scheduler: ReminderScheduler,
    ) -> Self {
        Self {
            timers,
            reminders,
            scheduler,
        }
    }

    /// Run a tool and produce the sentence the assistant speaks
    pub fn execute(&self, invocation: &ToolInvocation) -> Result<String> {
        tracing::debug!(tool = invocation.kind.spec().name, "executing tool");
        match invocation.kind {
            ToolKind::SetTimer => {
                let name = invocation.str_arg("name").unwrap_or("timer");
                let secs = invocation
                    .u64_arg("duration_secs")
                    .ok_or_else(|| Error::Agent("set_timer missing duration".to_string()))?;
                Ok(self.timers.set(name, std::time::Duration::from_secs(secs)))
            }
            ToolKind::CheckTimers => Ok(self.timers.status()),
            ToolKind::StopTimer => Ok(self.timers.stop(invocation.str_arg("name"))),
            ToolKind::CreateReminder => self.create_reminder(invocation),
            ToolKind::ListReminders => self.list_reminders(),
            ToolKind::UpdateReminder => self.update_reminder(invocation),
            ToolKind::DeleteReminder => self.delete_reminder(invocation),
            ToolKind::CurrentTime => Ok(format!("It's {}.", format_clock(Local::now()))),
        }
    }

    fn create_reminder(&self, invocation: &ToolInvocation) -> Result<String> {
        let message = invocation
            .str_arg("message")
            .ok_or_else(|| Error::Agent("create_reminder missing message".to_string()))?;
        let due_text = invocation
            .str_arg("due_at")
            .ok_or_else(|| Error::Agent("create_reminder missing due time".to_string()))?;
        let due_at: DateTime<Local> = DateTime::parse_from_rfc3339(due_text)
            .map_err(|e| Error::Agent(format!("create_reminder bad due time: {e}")))?
            .with_timezone(&Local);

        let reminder = self.reminders.create(message, due_at)?;
        self.scheduler.notify_changed();
        Ok(format!(
            "Reminder created: '{}' for {}.",
            reminder.message,
            format_when(reminder.due_at)
        ))
    }

    fn list_reminders(&self) -> Result<String> {
        let pending = self.reminders.list(Some(ReminderStatus::Pending))?;
        if pending.is_empty() {
            return Ok("You have no upcoming reminders.".to_string());
        }

        let lines: Vec<String> = pending
            .iter()
            .map(|r| format!("'{}' for {}", r.message, format_when(r.due_at)))
            .collect();
        let count = pending.len();
        let plural = if count == 1 { "reminder" } else { "reminders" };
        Ok(format!(
            "You have {count} upcoming {plural}: {}.",
            lines.join("; ")
        ))
    }

    fn update_reminder(&self, invocation: &ToolInvocation) -> Result<String> {
        let id = invocation
            .i64_arg("id")
            .ok_or_else(|| Error::Agent("update_reminder missing id".to_string()))?;
        let message = invocation.str_arg("message");
        let due_at = match invocation.str_arg("due_at") {
            Some(text) => Some(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|e| Error::Agent(format!("update_reminder bad due time: {e}")))?
                    .with_timezone(&Local),
            ),
            None => None,
        };

        match self.reminders.update(id, message, due_at, None)? {
            Some(reminder) => {
                self.scheduler.notify_changed();
                Ok(format!(
                    "Reminder updated: '{}' for {}.",
                    reminder.message,
                    format_when(reminder.due_at)
                ))
            }
            None => Ok(format!("No reminder with id {id} found.")),
        }
    }

    fn delete_reminder(&self, invocation: &ToolInvocation) -> Result<String> {
        let id = invocation
            .i64_arg("id")
            .ok_or_else(|| Error::Agent("delete_reminder missing id".to_string()))?;
        if self.reminders.delete(id)? {
            self.scheduler.notify_changed();
            Ok("Reminder deleted.".to_string())
        } else {
            Ok(format!("No reminder with id {id} found."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MixerHandle;
    use crate::store::init_memory;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn router() -> ToolRouter {
        let repo = ReminderRepo::new(init_memory().unwrap());
        let scheduler = ReminderScheduler::new(repo.clone(), Arc::new(AtomicBool::new(false)));
        let timers = TimerManager::new(MixerHandle::detached(), vec![0.2; 64]);
        ToolRouter::new(timers, repo, scheduler)
    }

    #[test]
    fn test_set_timer() {
        let router = router();
        let reply = router
            .execute(&ToolInvocation::new(
                ToolKind::SetTimer,
                json!({"name": "tea", "duration_secs": 300}),
            ))
            .unwrap();
        assert_eq!(reply, "Timer 'tea' set for 5 minutes.");
        router.timers.shutdown();
    }

    #[test]
    fn test_set_timer_requires_duration() {
        let router = router();
        let result = router.execute(&ToolInvocation::new(
            ToolKind::SetTimer,
            json!({"name": "tea"}),
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_and_list_reminders() {
        let router = router();
        let due = Local::now() + ChronoDuration::hours(2);
        let reply = router
            .execute(&ToolInvocation::new(
                ToolKind::CreateReminder,
                json!({"message": "water the plants", "due_at": due.to_rfc3339()}),
            ))
            .unwrap();
        assert!(reply.starts_with("Reminder created: 'water the plants' for "));

        let listed = router
            .execute(&ToolInvocation::new(ToolKind::ListReminders, json!({})))
            .unwrap();
        assert!(listed.contains("1 upcoming reminder"));
        assert!(listed.contains("water the plants"));
    }

    #[test]
    fn test_list_empty() {
        let reply = router()
            .execute(&ToolInvocation::new(ToolKind::ListReminders, json!({})))
            .unwrap();
        assert_eq!(reply, "You have no upcoming reminders.");
    }

    #[test]
    fn test_delete_missing_reminder() {
        let reply = router()
            .execute(&ToolInvocation::new(
                ToolKind::DeleteReminder,
                json!({"id": 42}),
            ))
            .unwrap();
        assert_eq!(reply, "No reminder with id 42 found.");
    }

    #[test]
    fn test_only_create_reminder_needs_confirmation() {
        for spec in TOOL_SPECS {
            assert_eq!(
                spec.requires_confirmation,
                spec.kind == ToolKind::CreateReminder,
            );
        }
    }

    #[test]
    fn test_current_time_speaks_a_time() {
        let reply = router()
            .execute(&ToolInvocation::new(ToolKind::CurrentTime, json!({})))
            .unwrap();
        assert!(reply.starts_with("It's "));
        assert!(reply.ends_with('.'));
    }
}
