//! Reminder delivery: announce a due reminder and record the outcome

use std::time::Duration;

use crate::audio::OUTPUT_SAMPLE_RATE;
use crate::state::{phrases, speak, AppContext, Transition};
use crate::store::Reminder;
use crate::Result;

/// How long to wait for a response after announcing a reminder
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn handle(ctx: &mut AppContext, reminder: Reminder) -> Result<Transition> {
    // The alarm must not talk over the announcement
    ctx.timers.mute();
    ctx.listener.clear_interrupt();

    let result = deliver(ctx, &reminder);

    ctx.timers.unmute();
    result
}

fn deliver(ctx: &mut AppContext, reminder: &Reminder) -> Result<Transition> {
    ctx.mixer.queue(ctx.ding.clone(), OUTPUT_SAMPLE_RATE)?;
    speak(
        ctx,
        &format!(
            "You have a reminder: {}. Would you like to clear this reminder?",
            reminder.message
        ),
    )?;
    if ctx.shutdown_requested() {
        return Ok(Transition::Shutdown);
    }

    let audio = ctx.listener.listen_for_speech(RESPONSE_TIMEOUT)?;
    let retry_minutes = ctx.settings.reminders.retry_minutes;

    let Some(audio) = audio else {
        if ctx.shutdown_requested() {
            return Ok(Transition::Shutdown);
        }
        ctx.listener.clear_interrupt();
        tracing::debug!(id = reminder.id, "no response, re-scheduling reminder");
        ctx.scheduler.schedule_retry(reminder.id, retry_minutes);
        return Ok(Transition::Wait);
    };

    let text = ctx.transcriber.transcribe(&audio, false)?;
    let text = text.trim().to_string();
    tracing::info!(%text, "reminder response");

    if let Some(minutes) = phrases::parse_snooze_minutes(&text) {
        ctx.scheduler.schedule_retry(reminder.id, minutes);
        speak(ctx, &format!("Okay, I'll remind you again in {minutes} minutes."))?;
        return Ok(Transition::Wait);
    }

    if phrases::is_confirmation(&text) {
        ctx.scheduler.mark_cleared(reminder.id);
        speak(ctx, "Reminder cleared.")?;
        return Ok(Transition::Wait);
    }

    if phrases::is_rejection(&text) {
        ctx.scheduler.schedule_retry(reminder.id, retry_minutes);
        speak(
            ctx,
            &format!("Okay, I'll remind you again in {retry_minutes} minutes."),
        )?;
        return Ok(Transition::Wait);
    }

    // Unclear answers leave the reminder pending for another pass
    ctx.scheduler.schedule_retry(reminder.id, retry_minutes);
    Ok(Transition::Wait)
}
