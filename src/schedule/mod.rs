//! Timers and reminder scheduling

pub mod duration;
pub mod reminders;
pub mod timer;

pub use duration::{format_duration, parse_duration};
pub use reminders::ReminderScheduler;
pub use timer::TimerManager;
