//! Ember - Wake-word voice assistant with timers and reminders
//!
//! This library provides the core functionality for the Ember assistant:
//! - Audio capture and mixed playback (cpal)
//! - Wake-phrase detection and VAD end-pointed speech capture
//! - Named countdown timers with alarm playback
//! - Persistent reminders with proactive delivery
//! - A conversation state machine tying it all together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 Microphone (16 kHz)              │
//! │        capture fan-out → listener / monitor      │
//! └────────────────────┬─────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────┐
//! │            Conversation state machine            │
//! │  Waiting │ Listening │ Processing │ Speaking ... │
//! └────────────────────┬─────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────┐
//! │        Output mixer (44.1 kHz, one stream)       │
//! │     tones │ speech │ alarm loop │ silence        │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod audio;
pub mod config;
pub mod detect;
pub mod error;
pub mod schedule;
pub mod state;
pub mod store;
pub mod tools;

pub use audio::{CaptureSource, MixerHandle, OutputMixer, RollingBuffer};
pub use config::Settings;
pub use detect::{SpeechListener, WakeMonitor};
pub use error::{Error, Result};
pub use schedule::{ReminderScheduler, TimerManager};
pub use state::{AppContext, ConversationState};
pub use store::{Reminder, ReminderRepo, ReminderStatus};
