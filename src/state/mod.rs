//! Conversation state machine
//!
//! One thread drives a loop over seven states. Handlers return the next
//! [`Transition`]; a handler error logs and falls back to waiting so a bad
//! turn never kills the assistant.

mod confirming;
mod context;
mod listening;
pub mod phrases;
mod processing;
mod reminder;
mod speaking;
mod waiting;

use std::fmt;

use crate::agent::PendingConfirmation;
use crate::store::Reminder;
use crate::Result;

pub use context::AppContext;

/// The state the conversation loop is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Waiting,
    Listening,
    Processing,
    Speaking,
    Confirming,
    DeliveringReminder,
    ShuttingDown,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
            Self::Confirming => "confirming",
            Self::DeliveringReminder => "delivering_reminder",
            Self::ShuttingDown => "shutting_down",
        };
        f.write_str(name)
    }
}

/// What a state handler decided to do next
pub enum Transition {
    Wait,
    Listen {
        /// Audio already captured (wake-triggered or interruption capture)
        audio: Option<Vec<f32>>,
        from_wake: bool,
    },
    Process {
        transcription: String,
    },
    Speak {
        response: String,
        force_end: bool,
    },
    Confirm {
        pending: PendingConfirmation,
    },
    DeliverReminder {
        reminder: Reminder,
    },
    Shutdown,
}

impl Transition {
    #[must_use]
    pub fn state(&self) -> ConversationState {
        match self {
            Self::Wait => ConversationState::Waiting,
            Self::Listen { .. } => ConversationState::Listening,
            Self::Process { .. } => ConversationState::Processing,
            Self::Speak { .. } => ConversationState::Speaking,
            Self::Confirm { .. } => ConversationState::Confirming,
            Self::DeliverReminder { .. } => ConversationState::DeliveringReminder,
            Self::Shutdown => ConversationState::ShuttingDown,
        }
    }
}

/// Drive the conversation loop until shutdown
pub fn run(ctx: &mut AppContext) -> Result<()> {
    let mut next = Transition::Wait;

    loop {
        if ctx.shutdown_requested() {
            next = Transition::Shutdown;
        }
        tracing::debug!(state = %next.state(), "entering state");

        let outcome = match next {
            Transition::Wait => waiting::handle(ctx),
            Transition::Listen { audio, from_wake } => listening::handle(ctx, audio, from_wake),
            Transition::Process { transcription } => processing::handle(ctx, transcription),
            Transition::Speak { response, force_end } => {
                speaking::handle(ctx, response, force_end)
            }
            Transition::Confirm { pending } => confirming::handle(ctx, pending),
            Transition::DeliverReminder { reminder } => reminder::handle(ctx, reminder),
            Transition::Shutdown => break,
        };

        next = match outcome {
            Ok(transition) => transition,
            Err(e) => {
                tracing::error!(error = %e, "state handler failed");
                Transition::Wait
            }
        };
    }

    cleanup(ctx);
    Ok(())
}

/// Synthesize and play a reply, blocking until it finishes
///
/// Interruptible only by shutdown; states that need wake interruption go
/// through the speaking handler instead.
pub(crate) fn speak(ctx: &mut AppContext, text: &str) -> Result<()> {
    let stream = ctx.voice.synthesize(text)?;
    let rate = stream.sample_rate();
    for chunk in stream {
        let interrupted = ctx
            .mixer
            .queue_blocking(chunk, rate, || ctx.shutdown_requested())?;
        if interrupted {
            break;
        }
    }
    Ok(())
}

fn cleanup(ctx: &mut AppContext) {
    tracing::info!("shutting down");
    ctx.scheduler.stop();
    ctx.timers.shutdown();
    ctx.mixer.stop_loop();
    ctx.mixer.stop_playback();
    if let Some(capture) = ctx.capture.as_mut() {
        capture.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_state_names() {
        assert_eq!(Transition::Wait.state().to_string(), "waiting");
        assert_eq!(Transition::Shutdown.state().to_string(), "shutting_down");
        assert_eq!(
            Transition::Process {
                transcription: String::new()
            }
            .state(),
            ConversationState::Processing
        );
    }
}
