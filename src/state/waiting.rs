//! Waiting state: idle until the wake phrase or a due reminder

use crate::state::{AppContext, Transition};
use crate::Result;

pub(crate) fn handle(ctx: &mut AppContext) -> Result<Transition> {
    // Each visit starts a fresh conversation
    ctx.reset_conversation();
    ctx.timers.unmute();

    // A reminder that came due mid-conversation is delivered first
    if let Some(reminder) = ctx.scheduler.pending_delivery() {
        return Ok(Transition::DeliverReminder { reminder });
    }

    let timers = ctx.timers.clone();
    let mixer = ctx.mixer.clone();
    let cue = ctx.listening_cue.clone();
    let capture = ctx.listener.wait_for_wake_and_speech(move || {
        // Quiet the alarm so the utterance is audible, and cue the user
        timers.mute();
        if let Err(e) = mixer.queue(cue.clone(), crate::audio::OUTPUT_SAMPLE_RATE) {
            tracing::warn!(error = %e, "failed to play listening cue");
        }
    })?;

    match capture {
        Some(audio) => Ok(Transition::Listen {
            audio: Some(audio),
            from_wake: true,
        }),
        None => {
            if ctx.shutdown_requested() {
                return Ok(Transition::Shutdown);
            }
            ctx.listener.clear_interrupt();
            if let Some(reminder) = ctx.scheduler.pending_delivery() {
                return Ok(Transition::DeliverReminder { reminder });
            }
            Ok(Transition::Wait)
        }
    }
}
