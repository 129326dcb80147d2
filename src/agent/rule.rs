//! Rule-based reasoning backend
//!
//! Routes utterances to tools with intent regexes. No network, no model;
//! every behavior is deterministic, which also makes it the backend the
//! conversation tests run against.

use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;
use serde_json::json;
use uuid::Uuid;

use crate::agent::{
    truncate_history, AgentOutcome, AgentTurn, ChatMessage, PendingConfirmation, ReasoningBackend,
};
use crate::schedule::parse_duration;
use crate::tools::{format_when, parse_when, ToolInvocation, ToolKind, ToolRouter};
use crate::Result;

static TIMER_SET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:set|start)\b.*\btimer\b").unwrap());
static TIMER_STOP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:stop|cancel|silence)\b.*\btimer").unwrap());
static TIMER_CHECK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:check|how\s+(?:long|much)|status\s+of|left\s+on)\b.*\btimer|\btimer.*\bleft\b")
        .unwrap()
});
static TIMER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:a|the|my)\s+([a-z]+)\s+timer\b").unwrap());
static REMIND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"remind\s+me\s+(?:to\s+)?(.+?)\s+((?:at|on|in|tomorrow|today|tonight|next|this)\b.*)$")
        .unwrap()
});
static LIST_REMINDERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:list|what|which|any|upcoming|my)\b.*\breminders?\b").unwrap()
});
static DELETE_REMINDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:delete|remove)\b.*\breminder\s+(\d+)").unwrap());
static UPDATE_REMINDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:update|change|move)\b.*\breminder\s+(\d+)\s+to\s+(.+)$").unwrap()
});
static TIME_QUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bwhat\s+time\b|\bcurrent\s+time\b|\btime\s+is\s+it\b").unwrap());

/// Deterministic intent-routing backend
pub struct RuleBackend {
    router: ToolRouter,
}

impl RuleBackend {
    #[must_use]
    pub fn new(router: ToolRouter) -> Self {
        Self { router }
    }

    fn route(&self, text: &str, thread_id: &str) -> Result<AgentOutcome> {
        if let Some(caps) = REMIND_RE.captures(text) {
            return Ok(self.route_reminder(&caps[1], &caps[2], thread_id));
        }

        if let Some(caps) = UPDATE_REMINDER_RE.captures(text) {
            let id: i64 = caps[1].parse().unwrap_or(-1);
            let when_text = caps[2].trim();
            let Some(due) = parse_when(when_text, Local::now()) else {
                return Ok(AgentOutcome::Reply(unparseable_time(when_text)));
            };
            let reply = self.router.execute(&ToolInvocation::new(
                ToolKind::UpdateReminder,
                json!({"id": id, "due_at": due.to_rfc3339()}),
            ))?;
            return Ok(AgentOutcome::Reply(reply));
        }

        if let Some(caps) = DELETE_REMINDER_RE.captures(text) {
            let id: i64 = caps[1].parse().unwrap_or(-1);
            let reply = self.router.execute(&ToolInvocation::new(
                ToolKind::DeleteReminder,
                json!({"id": id}),
            ))?;
            return Ok(AgentOutcome::Reply(reply));
        }

        if LIST_REMINDERS_RE.is_match(text) {
            let reply = self
                .router
                .execute(&ToolInvocation::new(ToolKind::ListReminders, json!({})))?;
            return Ok(AgentOutcome::Reply(reply));
        }

        if TIMER_STOP_RE.is_match(text) {
            let reply = self.router.execute(&ToolInvocation::new(
                ToolKind::StopTimer,
                timer_name(text).map_or(json!({}), |name| json!({"name": name})),
            ))?;
            return Ok(AgentOutcome::Reply(reply));
        }

        if TIMER_CHECK_RE.is_match(text) {
            let reply = self
                .router
                .execute(&ToolInvocation::new(ToolKind::CheckTimers, json!({})))?;
            return Ok(AgentOutcome::Reply(reply));
        }

        if TIMER_SET_RE.is_match(text) {
            let Some(duration) = parse_duration(text) else {
                return Ok(AgentOutcome::Reply(
                    "I couldn't work out the duration. Try something like 'set a timer for 10 minutes'.".to_string(),
                ));
            };
            let name = timer_name(text).unwrap_or_else(|| "timer".to_string());
            let reply = self.router.execute(&ToolInvocation::new(
                ToolKind::SetTimer,
                json!({"name": name, "duration_secs": duration.as_secs()}),
            ))?;
            return Ok(AgentOutcome::Reply(reply));
        }

        if TIME_QUERY_RE.is_match(text) {
            let reply = self
                .router
                .execute(&ToolInvocation::new(ToolKind::CurrentTime, json!({})))?;
            return Ok(AgentOutcome::Reply(reply));
        }

        Ok(AgentOutcome::Reply(
            "I can set timers, create reminders, and tell you the time.".to_string(),
        ))
    }

    /// Validate a reminder request and gate creation behind confirmation
    fn route_reminder(&self, message: &str, when_text: &str, thread_id: &str) -> AgentOutcome {
        let now = Local::now();
        let Some(due) = parse_when(when_text, now) else {
            return AgentOutcome::Reply(unparseable_time(when_text));
        };
        if due <= now {
            return AgentOutcome::Reply(format!(
                "The specified time ({}) is in the past. Please specify a future date and time.",
                format_when(due)
            ));
        }

        let message = message.trim();
        AgentOutcome::NeedsConfirmation(PendingConfirmation {
            invocation: ToolInvocation::new(
                ToolKind::CreateReminder,
                json!({"message": message, "due_at": due.to_rfc3339()}),
            ),
            prompt: format!(
                "I'll remind you to {message} on {}. Should I create this reminder?",
                format_when(due)
            ),
            thread_id: thread_id.to_string(),
        })
    }
}

impl ReasoningBackend for RuleBackend {
    fn invoke(
        &self,
        text: &str,
        mut history: Vec<ChatMessage>,
        thread_id: Option<String>,
    ) -> Result<AgentTurn> {
        let thread_id = thread_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let text = text.trim().to_lowercase();

        history.push(ChatMessage::user(&text));
        let outcome = self.route(&text, &thread_id)?;
        match &outcome {
            AgentOutcome::Reply(reply) => history.push(ChatMessage::assistant(reply)),
            AgentOutcome::NeedsConfirmation(pending) => {
                history.push(ChatMessage::assistant(&pending.prompt));
            }
        }
        truncate_history(&mut history);

        Ok(AgentTurn {
            outcome,
            history,
            thread_id,
        })
    }

    fn confirm(
        &self,
        pending: PendingConfirmation,
        confirmed: bool,
    ) -> Result<(String, Vec<ChatMessage>)> {
        if !confirmed {
            let reply = "Okay, I won't create the reminder.".to_string();
            return Ok((reply.clone(), vec![ChatMessage::assistant(reply)]));
        }

        let result = self.router.execute(&pending.invocation)?;
        let messages = vec![
            ChatMessage::tool(&result),
            ChatMessage::assistant(&result),
        ];
        Ok((result, messages))
    }
}

fn timer_name(text: &str) -> Option<String> {
    let name = TIMER_NAME_RE.captures(text)?.get(1)?.as_str();
    // Articles and filler words are not names
    if matches!(name, "new" | "another" | "quick") {
        return None;
    }
    Some(name.to_string())
}

fn unparseable_time(when_text: &str) -> String {
    format!(
        "Could not understand the date/time '{when_text}'. Try formats like 'tomorrow at 3pm' or 'in 20 minutes'."
    )
}
