//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use beacon_voice::voice::{PlaybackIndicator, PlaybackSignals, SpeechRequest, SpeechSynthesizer, Voice};
use beacon_voice::{Settings, VoiceController, VoiceHandle, VoiceStatus};

/// Synthesizer that records requests and lets tests drive lifecycle signals
#[derive(Default)]
pub struct RecordingSynth {
    pub requests: Mutex<Vec<SpeechRequest>>,
    pub signals: Mutex<Vec<PlaybackSignals>>,
    pub cancels: Mutex<usize>,
}

impl RecordingSynth {
    /// Texts handed to the engine, in order
    pub fn spoken(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.sanitized_text.clone())
            .collect()
    }

    /// Signal handle for the `n`th request
    pub fn signals_for(&self, n: usize) -> PlaybackSignals {
        self.signals.lock().unwrap()[n].clone()
    }

    pub fn cancel_count(&self) -> usize {
        *self.cancels.lock().unwrap()
    }
}

impl SpeechSynthesizer for RecordingSynth {
    fn voices(&self) -> Vec<Voice> {
        vec![
            Voice::new("v0", "Test Female", "en-US"),
            Voice::new("v1", "Test Male", "en-US"),
        ]
    }

    fn synthesize(&self, request: &SpeechRequest, signals: PlaybackSignals) {
        self.requests.lock().unwrap().push(request.clone());
        self.signals.lock().unwrap().push(signals);
    }

    fn cancel(&self) {
        *self.cancels.lock().unwrap() += 1;
    }
}

/// Indicator that counts show/hide calls
#[derive(Default)]
pub struct CountingIndicator {
    pub started: Mutex<usize>,
    pub stopped: Mutex<usize>,
}

impl PlaybackIndicator for CountingIndicator {
    fn speaking_started(&self, _request: &SpeechRequest) {
        *self.started.lock().unwrap() += 1;
    }

    fn speaking_stopped(&self) {
        *self.stopped.lock().unwrap() += 1;
    }
}

/// A running controller with recording collaborators
pub struct Harness {
    pub handle: VoiceHandle,
    pub sent: mpsc::UnboundedReceiver<String>,
    pub synth: Arc<RecordingSynth>,
    pub indicator: Arc<CountingIndicator>,
}

impl Harness {
    /// Wait until the published status satisfies `predicate`
    pub async fn wait_for(&self, predicate: impl FnMut(&VoiceStatus) -> bool) -> VoiceStatus {
        let mut status = self.handle.subscribe();
        let current = status.wait_for(predicate).await.unwrap();
        current.clone()
    }
}

/// Spawn a controller with `settings`
pub fn spawn_controller(settings: Settings) -> Harness {
    let (sink, sent) = mpsc::unbounded_channel::<String>();
    let synth = Arc::new(RecordingSynth::default());
    let indicator = Arc::new(CountingIndicator::default());

    let (handle, _task) = VoiceController::spawn(
        settings,
        Arc::new(sink),
        Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
        Arc::clone(&indicator) as Arc<dyn PlaybackIndicator>,
    );

    Harness {
        handle,
        sent,
        synth,
        indicator,
    }
}

/// Settings with persistent listening on
pub fn persistent_settings() -> Settings {
    Settings {
        wake_word_enabled: true,
        persistent_listening_enabled: true,
        ..Settings::default()
    }
}
