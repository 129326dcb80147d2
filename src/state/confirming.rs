//! Confirming state: ask before running a gated tool

use std::time::Duration;

use crate::agent::{ChatMessage, PendingConfirmation};
use crate::audio::OUTPUT_SAMPLE_RATE;
use crate::state::{phrases, speak, AppContext, Transition};
use crate::Result;

/// How long to wait for a yes or no
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn handle(ctx: &mut AppContext, pending: PendingConfirmation) -> Result<Transition> {
    speak(ctx, &pending.prompt)?;
    if ctx.shutdown_requested() {
        return Ok(Transition::Shutdown);
    }

    ctx.mixer
        .queue(ctx.listening_cue.clone(), OUTPUT_SAMPLE_RATE)?;
    let audio = ctx.listener.listen_for_speech(CONFIRMATION_TIMEOUT)?;
    ctx.mixer.queue(ctx.done_cue.clone(), OUTPUT_SAMPLE_RATE)?;

    let Some(audio) = audio else {
        if ctx.shutdown_requested() {
            return Ok(Transition::Shutdown);
        }
        ctx.listener.clear_interrupt();
        // Silence counts as declining
        return resolve(ctx, pending, false, None);
    };

    let text = ctx.transcriber.transcribe(&audio, false)?;
    let text = text.trim().to_string();
    tracing::info!(%text, "confirmation response");

    match classify(&text) {
        Response::Confirmed => resolve(ctx, pending, true, Some(text)),
        Response::Declined => resolve(ctx, pending, false, Some(text)),
        Response::Modified => {
            // A modification runs as a fresh request
            ctx.history.push(ChatMessage::user(&text));
            Ok(Transition::Process {
                transcription: text,
            })
        }
    }
}

#[derive(Debug)]
enum Response {
    Confirmed,
    Declined,
    Modified,
}

/// Affirmation is checked before rejection so mixed phrasings like
/// "do it now" land on the confirm side
fn classify(text: &str) -> Response {
    if text.is_empty() {
        return Response::Declined;
    }
    if phrases::is_confirmation(text) {
        return Response::Confirmed;
    }
    if phrases::is_rejection(text) {
        return Response::Declined;
    }
    Response::Modified
}

fn resolve(
    ctx: &mut AppContext,
    pending: PendingConfirmation,
    confirmed: bool,
    user_text: Option<String>,
) -> Result<Transition> {
    if let Some(text) = user_text.filter(|t| !t.is_empty()) {
        ctx.history.push(ChatMessage::user(text));
    }

    let (reply, messages) = ctx.backend.confirm(pending, confirmed)?;
    ctx.history.extend(messages);
    crate::agent::truncate_history(&mut ctx.history);

    // Every resolved confirmation closes the conversation, even if the
    // backend's reply happens to end with a question
    Ok(Transition::Speak {
        response: reply,
        force_end: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentTurn, ReasoningBackend, Transcriber};
    use crate::tools::{ToolInvocation, ToolKind};
    use crate::Result as CrateResult;
    use std::sync::mpsc::channel;

    struct AskingBackend;

    impl ReasoningBackend for AskingBackend {
        fn invoke(
            &self,
            _text: &str,
            history: Vec<ChatMessage>,
            thread_id: Option<String>,
        ) -> CrateResult<AgentTurn> {
            Ok(AgentTurn {
                outcome: crate::agent::AgentOutcome::Reply(String::new()),
                history,
                thread_id: thread_id.unwrap_or_default(),
            })
        }

        fn confirm(
            &self,
            _pending: PendingConfirmation,
            confirmed: bool,
        ) -> CrateResult<(String, Vec<ChatMessage>)> {
            // A reply ending in '?' must not reopen the floor
            let reply = if confirmed {
                "Reminder created. Anything else?".to_string()
            } else {
                "Okay, I won't create the reminder.".to_string()
            };
            Ok((reply.clone(), vec![ChatMessage::assistant(reply)]))
        }
    }

    struct SilentTranscriber;

    impl Transcriber for SilentTranscriber {
        fn transcribe(&self, _samples: &[f32], _strip: bool) -> CrateResult<String> {
            Ok(String::new())
        }
    }

    fn ctx() -> AppContext {
        let (_tx_a, rx_a) = channel();
        let (_tx_b, rx_b) = channel();
        AppContext::detached(Box::new(AskingBackend), Box::new(SilentTranscriber), (rx_a, rx_b))
    }

    fn pending() -> PendingConfirmation {
        PendingConfirmation {
            invocation: ToolInvocation::new(ToolKind::CreateReminder, serde_json::json!({})),
            prompt: "Should I create this reminder?".to_string(),
            thread_id: "t1".to_string(),
        }
    }

    #[test]
    fn test_affirmation_wins_over_embedded_no() {
        assert!(matches!(classify("do it now"), Response::Confirmed));
        assert!(matches!(classify("you know what, do it"), Response::Confirmed));
        assert!(matches!(classify("no, don't"), Response::Declined));
        assert!(matches!(classify(""), Response::Declined));
    }

    #[test]
    fn test_modification_is_neither_yes_nor_no() {
        assert!(matches!(classify("make it 4pm instead"), Response::Modified));
    }

    #[test]
    fn test_resolved_confirmation_forces_conversation_end() {
        let mut ctx = ctx();
        let next = resolve(&mut ctx, pending(), true, Some("yes".to_string())).unwrap();
        match next {
            Transition::Speak { response, force_end } => {
                assert!(response.ends_with('?'));
                assert!(force_end);
            }
            _ => panic!("expected speak"),
        }
    }

    #[test]
    fn test_resolved_rejection_forces_conversation_end() {
        let mut ctx = ctx();
        let next = resolve(&mut ctx, pending(), false, None).unwrap();
        match next {
            Transition::Speak { force_end, .. } => assert!(force_end),
            _ => panic!("expected speak"),
        }
    }
}
