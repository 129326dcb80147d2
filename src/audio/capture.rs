//! Microphone capture with fan-out to multiple consumers
//!
//! One cpal input stream at 16 kHz mono; the callback pushes each buffer to
//! every subscriber's channel so the speech listener and the wake monitor
//! never contend for the device.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::audio::INPUT_SAMPLE_RATE;
use crate::{Error, Result};

type Subscribers = Arc<Mutex<Vec<Sender<Vec<f32>>>>>;

/// Captures audio from the default input device and fans it out
pub struct CaptureSource {
    config: StreamConfig,
    subscribers: Subscribers,
    stream: Option<Stream>,
}

impl CaptureSource {
    /// Open the default input device at 16 kHz mono
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(INPUT_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(INPUT_SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(INPUT_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = INPUT_SAMPLE_RATE,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Get a channel receiving every captured buffer
    ///
    /// Subscribe before calling [`start`](Self::start); dropped receivers
    /// are pruned automatically.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<Vec<f32>> {
        let (tx, rx) = channel();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Start capturing; a no-op if already running
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let subscribers = Arc::clone(&self.subscribers);
        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut subs) = subscribers.lock() {
                        subs.retain(|tx| tx.send(data.to_vec()).is_ok());
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing and release the device
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the capture sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        INPUT_SAMPLE_RATE
    }
}
