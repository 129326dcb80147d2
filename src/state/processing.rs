//! Processing state: run the backend with the thinking cue looping

use crate::state::{AppContext, Transition};
use crate::Result;

pub(crate) fn handle(ctx: &mut AppContext, transcription: String) -> Result<Transition> {
    ctx.mixer.start_loop(ctx.thinking_cue.clone());
    let turn = ctx
        .backend
        .invoke(&transcription, ctx.history.clone(), ctx.thread_id.clone());
    ctx.mixer.stop_loop();

    let turn = match turn {
        Ok(turn) => turn,
        Err(e) => {
            tracing::error!(error = %e, "backend failed");
            return Ok(Transition::Speak {
                response: "Sorry, I encountered an error processing your request.".to_string(),
                force_end: true,
            });
        }
    };

    ctx.history = turn.history;
    ctx.thread_id = Some(turn.thread_id);

    match turn.outcome {
        crate::agent::AgentOutcome::Reply(response) => Ok(Transition::Speak {
            response,
            force_end: false,
        }),
        crate::agent::AgentOutcome::NeedsConfirmation(pending) => {
            Ok(Transition::Confirm { pending })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{
        AgentOutcome, AgentTurn, ChatMessage, PendingConfirmation, ReasoningBackend, Transcriber,
    };
    use crate::tools::{ToolInvocation, ToolKind};
    use crate::Error;
    use crate::Result as CrateResult;
    use std::sync::mpsc::channel;

    struct NullTranscriber;

    impl Transcriber for NullTranscriber {
        fn transcribe(&self, _samples: &[f32], _strip: bool) -> CrateResult<String> {
            Ok(String::new())
        }
    }

    enum Script {
        Reply(String),
        Confirm(String),
        Fail,
    }

    struct ScriptedBackend(Script);

    impl ReasoningBackend for ScriptedBackend {
        fn invoke(
            &self,
            text: &str,
            mut history: Vec<ChatMessage>,
            _thread_id: Option<String>,
        ) -> CrateResult<AgentTurn> {
            history.push(ChatMessage::user(text));
            let outcome = match &self.0 {
                Script::Reply(reply) => AgentOutcome::Reply(reply.clone()),
                Script::Confirm(prompt) => {
                    AgentOutcome::NeedsConfirmation(PendingConfirmation {
                        invocation: ToolInvocation::new(
                            ToolKind::CreateReminder,
                            serde_json::json!({}),
                        ),
                        prompt: prompt.clone(),
                        thread_id: "t".to_string(),
                    })
                }
                Script::Fail => return Err(Error::Agent("boom".to_string())),
            };
            Ok(AgentTurn {
                outcome,
                history,
                thread_id: "t".to_string(),
            })
        }

        fn confirm(
            &self,
            _pending: PendingConfirmation,
            _confirmed: bool,
        ) -> CrateResult<(String, Vec<ChatMessage>)> {
            Ok((String::new(), Vec::new()))
        }
    }

    fn ctx(script: Script) -> AppContext {
        let (_tx_a, rx_a) = channel();
        let (_tx_b, rx_b) = channel();
        AppContext::detached(
            Box::new(ScriptedBackend(script)),
            Box::new(NullTranscriber),
            (rx_a, rx_b),
        )
    }

    #[test]
    fn test_reply_becomes_speech_and_updates_history() {
        let mut ctx = ctx(Script::Reply("hello there".to_string()));
        let next = handle(&mut ctx, "hi".to_string()).unwrap();
        match next {
            Transition::Speak { response, force_end } => {
                assert_eq!(response, "hello there");
                assert!(!force_end);
            }
            _ => panic!("expected speak"),
        }
        assert_eq!(ctx.history.len(), 1);
        assert_eq!(ctx.thread_id.as_deref(), Some("t"));
    }

    #[test]
    fn test_confirmation_request_enters_confirming() {
        let mut ctx = ctx(Script::Confirm("Should I?".to_string()));
        let next = handle(&mut ctx, "remind me".to_string()).unwrap();
        match next {
            Transition::Confirm { pending } => assert_eq!(pending.prompt, "Should I?"),
            _ => panic!("expected confirm"),
        }
    }

    #[test]
    fn test_backend_error_apologizes_and_ends() {
        let mut ctx = ctx(Script::Fail);
        let next = handle(&mut ctx, "hi".to_string()).unwrap();
        match next {
            Transition::Speak { response, force_end } => {
                assert_eq!(
                    response,
                    "Sorry, I encountered an error processing your request."
                );
                assert!(force_end);
            }
            _ => panic!("expected speak"),
        }
    }
}
