//! Wake detection and end-pointing driven by synthetic audio

use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::time::Duration;

use ember::audio::INPUT_SAMPLE_RATE;
use ember::detect::{EnergyVad, EnergyWakeScorer};
use ember::{SpeechListener, WakeMonitor};

fn sine(duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let n = (f64::from(INPUT_SAMPLE_RATE) * f64::from(duration_secs)) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / INPUT_SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

fn silence(duration_secs: f32) -> Vec<f32> {
    vec![0.0; (f64::from(INPUT_SAMPLE_RATE) * f64::from(duration_secs)) as usize]
}

fn listener() -> (SpeechListener, Sender<Vec<f32>>) {
    let (tx, rx) = channel();
    let listener = SpeechListener::new(
        rx,
        Box::new(EnergyWakeScorer::default()),
        Box::new(EnergyVad::default()),
        0.5,
        Arc::new(AtomicBool::new(false)),
    );
    (listener, tx)
}

#[test]
fn test_wake_then_silence_yields_one_utterance() {
    let (mut listener, tx) = listener();
    tx.send(sine(1.0, 0.3)).unwrap();
    tx.send(silence(2.0)).unwrap();

    let mut wakes = 0;
    let audio = listener
        .wait_for_wake_and_speech(|| wakes += 1)
        .unwrap()
        .expect("loud audio should trigger the wake scorer");

    assert_eq!(wakes, 1);
    assert!(!audio.is_empty());
}

#[test]
fn test_quiet_audio_never_wakes() {
    let (mut listener, tx) = listener();
    let flag = listener.interrupt_flag();

    // Feed only near-silence, then interrupt from another thread
    tx.send(sine(1.0, 0.002)).unwrap();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(300));
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    });

    let result = listener.wait_for_wake_and_speech(|| {}).unwrap();
    assert!(result.is_none());
    canceller.join().unwrap();
}

#[test]
fn test_follow_up_listening_endpoints_on_silence() {
    let (mut listener, tx) = listener();
    tx.send(sine(0.6, 0.3)).unwrap();
    tx.send(silence(2.0)).unwrap();

    let audio = listener
        .listen_for_speech(Duration::from_secs(5))
        .unwrap()
        .expect("speech should be captured");
    // Capture spans the speech and the trailing silence before cut-off
    assert!(audio.len() >= sine(0.6, 0.3).len());
}

#[test]
fn test_follow_up_timeout_without_speech() {
    let (mut listener, tx) = listener();
    tx.send(silence(0.5)).unwrap();

    let audio = listener
        .listen_for_speech(Duration::from_millis(300))
        .unwrap();
    assert!(audio.is_none());
}

#[test]
fn test_monitor_detects_during_playback() {
    let (listener, tx) = listener();
    let mut monitor = WakeMonitor::new(listener);

    monitor.start();
    assert!(!monitor.was_detected());

    tx.send(sine(1.0, 0.3)).unwrap();
    tx.send(silence(2.0)).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !monitor.was_detected() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(monitor.was_detected());
    assert!(monitor.stop().is_some());
}
