//! Listening state: capture an utterance and decide what to do with it

use std::time::Duration;

use crate::audio::OUTPUT_SAMPLE_RATE;
use crate::state::{phrases, AppContext, Transition};
use crate::Result;

pub(crate) fn handle(
    ctx: &mut AppContext,
    audio: Option<Vec<f32>>,
    from_wake: bool,
) -> Result<Transition> {
    let audio = match audio {
        Some(audio) => Some(audio),
        None => {
            // Follow-up capture: cue, then wait for speech to start
            ctx.mixer
                .queue(ctx.listening_cue.clone(), OUTPUT_SAMPLE_RATE)?;
            let timeout = Duration::from_secs_f32(ctx.settings.listening_timeout_secs);
            ctx.listener.listen_for_speech(timeout)?
        }
    };

    let Some(audio) = audio else {
        if ctx.shutdown_requested() {
            return Ok(Transition::Shutdown);
        }
        ctx.listener.clear_interrupt();
        tracing::debug!("no speech captured");
        ctx.mixer.queue(ctx.done_cue.clone(), OUTPUT_SAMPLE_RATE)?;
        return Ok(Transition::Wait);
    };

    ctx.mixer.queue(ctx.done_cue.clone(), OUTPUT_SAMPLE_RATE)?;

    let text = ctx.transcriber.transcribe(&audio, from_wake)?;
    let text = text.trim().to_string();
    if text.is_empty() {
        tracing::debug!("empty transcription");
        return Ok(Transition::Wait);
    }
    tracing::info!(%text, "heard");

    // A ringing alarm takes the stop command before the backend sees it
    if ctx.timers.is_ringing() && phrases::is_timer_stop(&text) {
        ctx.timers.stop_any_ringing();
        return Ok(Transition::Speak {
            response: "Timer stopped.".to_string(),
            force_end: true,
        });
    }

    if ctx.in_conversation() && phrases::is_abort(&text) {
        return Ok(Transition::Speak {
            response: "Okay.".to_string(),
            force_end: true,
        });
    }

    Ok(Transition::Process {
        transcription: text,
    })
}
