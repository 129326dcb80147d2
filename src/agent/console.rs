//! Console fallbacks for transcription and speech
//!
//! Used when no hosted speech service is configured: transcription reads a
//! line from stdin and synthesis logs the reply while playing a short cue
//! so the conversation loop still has audio to pace itself against.

use std::io::BufRead;

use crate::agent::{SpeechStream, Transcriber, Voice};
use crate::audio::{tones, OUTPUT_SAMPLE_RATE};
use crate::{Error, Result};

/// Reads "transcriptions" from standard input
pub struct ConsoleTranscriber {
    wake_phrase: String,
}

impl ConsoleTranscriber {
    #[must_use]
    pub fn new(wake_phrase: impl Into<String>) -> Self {
        Self {
            wake_phrase: wake_phrase.into().to_lowercase(),
        }
    }
}

impl Transcriber for ConsoleTranscriber {
    fn transcribe(&self, _samples: &[f32], strip_wake_phrase: bool) -> Result<String> {
        eprint!("you> ");
        let mut line = String::new();
        // EOF reads as an empty utterance
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| Error::Stt(e.to_string()))?;
        let mut text = line.trim().to_string();

        if strip_wake_phrase {
            let lowered = text.to_lowercase();
            if let Some(rest) = lowered.strip_prefix(&self.wake_phrase) {
                text = rest.trim_start_matches([',', ' ']).to_string();
            }
        }
        Ok(text)
    }
}

/// Logs replies and emits a short cue in place of synthesized speech
pub struct ConsoleVoice;

impl Voice for ConsoleVoice {
    fn synthesize(&self, text: &str) -> Result<SpeechStream> {
        tracing::info!(%text, "assistant reply");
        let cue = tones::generate_tone(523.25, 0.15, 0.2, 0.02);
        Ok(SpeechStream::from_clip(OUTPUT_SAMPLE_RATE, cue))
    }
}
