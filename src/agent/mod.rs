//! Reasoning backend, transcription, and speech synthesis seams
//!
//! The conversation engine talks to three traits: [`Transcriber`] turns
//! captured audio into text, [`ReasoningBackend`] turns text into replies
//! and tool calls, and [`Voice`] turns replies into audio. The bundled
//! implementations are the rule-based backend and the console fallbacks;
//! hosted services slot in behind the same traits.

pub mod console;
pub mod rule;

use crate::tools::ToolInvocation;
use crate::Result;

pub use console::{ConsoleTranscriber, ConsoleVoice};
pub use rule::RuleBackend;

/// Maximum messages retained per conversation thread
pub const HISTORY_LIMIT: usize = 20;

/// Who produced a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One entry in the conversation history
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
        }
    }
}

/// Drop the oldest messages once the history exceeds [`HISTORY_LIMIT`]
pub fn truncate_history(history: &mut Vec<ChatMessage>) {
    if history.len() > HISTORY_LIMIT {
        history.drain(..history.len() - HISTORY_LIMIT);
    }
}

/// A tool call held back until the user approves it
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub invocation: ToolInvocation,
    /// The question the assistant asks before running the tool
    pub prompt: String,
    pub thread_id: String,
}

/// What a backend turn produced
pub enum AgentOutcome {
    /// A reply to speak
    Reply(String),
    /// A gated tool call awaiting the user's yes or no
    NeedsConfirmation(PendingConfirmation),
}

/// A completed backend turn with the updated history
pub struct AgentTurn {
    pub outcome: AgentOutcome,
    pub history: Vec<ChatMessage>,
    pub thread_id: String,
}

/// Turns user utterances into replies and tool calls
pub trait ReasoningBackend: Send {
    /// Run one turn; `thread_id` is `None` at the start of a conversation
    fn invoke(
        &self,
        text: &str,
        history: Vec<ChatMessage>,
        thread_id: Option<String>,
    ) -> Result<AgentTurn>;

    /// Resolve a gated tool call
    ///
    /// Returns the reply to speak and the messages to append to the
    /// history.
    fn confirm(
        &self,
        pending: PendingConfirmation,
        confirmed: bool,
    ) -> Result<(String, Vec<ChatMessage>)>;
}

/// Turns captured audio into text
pub trait Transcriber: Send {
    /// Transcribe 16 kHz mono samples
    ///
    /// With `strip_wake_phrase` set, a leading wake phrase is removed from
    /// the transcription so it never reaches the backend.
    fn transcribe(&self, samples: &[f32], strip_wake_phrase: bool) -> Result<String>;
}

/// Synthesized speech, delivered as playable chunks
pub struct SpeechStream {
    sample_rate: u32,
    chunks: Box<dyn Iterator<Item = Vec<f32>> + Send>,
}

impl SpeechStream {
    #[must_use]
    pub fn new(sample_rate: u32, chunks: Box<dyn Iterator<Item = Vec<f32>> + Send>) -> Self {
        Self { sample_rate, chunks }
    }

    /// A stream holding a single pre-rendered clip
    #[must_use]
    pub fn from_clip(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, Box::new(std::iter::once(samples)))
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Iterator for SpeechStream {
    type Item = Vec<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next()
    }
}

/// Turns reply text into audio
pub trait Voice: Send {
    fn synthesize(&self, text: &str) -> Result<SpeechStream>;
}
