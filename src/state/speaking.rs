//! Speaking state: play the reply while watching for interruption

use crate::agent::Role;
use crate::state::{AppContext, Transition};
use crate::Result;

pub(crate) fn handle(
    ctx: &mut AppContext,
    response: String,
    force_end: bool,
) -> Result<Transition> {
    ctx.monitor.start();

    let playback = play_response(ctx, &response);
    let captured = ctx.monitor.stop();

    if let Err(e) = playback {
        tracing::error!(error = %e, "speech playback failed");
    }

    if ctx.shutdown_requested() {
        return Ok(Transition::Shutdown);
    }

    if ctx.monitor.was_detected() {
        tracing::debug!("interrupted by wake phrase");
        mark_last_reply_interrupted(ctx);
        ctx.mixer.stop_playback();
        return Ok(Transition::Listen {
            audio: captured,
            from_wake: true,
        });
    }

    if force_end {
        return Ok(Transition::Wait);
    }

    // A reply that ends with a question keeps the floor open
    if response.trim_end().ends_with('?') {
        Ok(Transition::Listen {
            audio: None,
            from_wake: false,
        })
    } else {
        Ok(Transition::Wait)
    }
}

fn play_response(ctx: &mut AppContext, response: &str) -> Result<()> {
    let stream = ctx.voice.synthesize(response)?;
    let rate = stream.sample_rate();
    for chunk in stream {
        let interrupted = ctx.mixer.queue_blocking(chunk, rate, || {
            ctx.monitor.was_detected() || ctx.shutdown_requested()
        })?;
        if interrupted {
            break;
        }
    }
    Ok(())
}

fn mark_last_reply_interrupted(ctx: &mut AppContext) {
    if let Some(message) = ctx
        .history
        .iter_mut()
        .rev()
        .find(|m| m.role == Role::Assistant)
    {
        message.content.push_str(" [interrupted]");
    }
}
