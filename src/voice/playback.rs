//! Speech playback
//!
//! [`SpeechPipeline`] prepares text, hands it to a [`SpeechSynthesizer`] and
//! tracks the utterance through its lifecycle. Only one utterance is ever
//! current: a new request cancels the one in flight before it is issued.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Settings;

use super::speech::{self, Voice, VoiceParams};

/// A prepared utterance
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    /// Request identifier, echoed back in lifecycle signals
    pub id: Uuid,
    /// Text as supplied by the caller
    pub raw_text: String,
    /// Text after sanitization; this is what gets spoken
    pub sanitized_text: String,
    /// Voice parameters for the engine
    pub voice_params: VoiceParams,
}

/// Playback lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// Nothing has been requested yet
    Idle,
    /// Handed to the engine, waiting for the start signal
    Pending,
    /// Engine reported start
    Playing,
    /// Finished or cancelled
    Ended,
    /// Engine reported an error
    Errored,
}

impl PlaybackPhase {
    /// Whether an utterance is in flight
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Playing)
    }
}

/// Lifecycle signal reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Audio started
    Started,
    /// Audio finished
    Ended,
    /// Synthesis or output failed
    Failed(String),
}

/// Lifecycle signal tagged with its request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSignal {
    /// Request the signal belongs to
    pub request_id: Uuid,
    /// What happened
    pub event: PlaybackEvent,
}

/// Delivers playback signals into the owner's event queue
#[derive(Clone)]
pub struct SignalSender(Arc<dyn Fn(PlaybackSignal) -> bool + Send + Sync>);

impl SignalSender {
    /// Wrap a channel sender whose item can be built from a [`PlaybackSignal`]
    #[must_use]
    pub fn new<T>(tx: mpsc::UnboundedSender<T>) -> Self
    where
        T: From<PlaybackSignal> + Send + 'static,
    {
        Self(Arc::new(move |signal| tx.send(T::from(signal)).is_ok()))
    }

    /// Deliver a signal; false if the receiver is gone
    pub fn send(&self, signal: PlaybackSignal) -> bool {
        (self.0)(signal)
    }
}

impl std::fmt::Debug for SignalSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSender").finish_non_exhaustive()
    }
}

/// Handle an engine uses to report lifecycle signals for one request
#[derive(Debug, Clone)]
pub struct PlaybackSignals {
    request_id: Uuid,
    tx: SignalSender,
}

impl PlaybackSignals {
    /// Create a handle for `request_id`
    #[must_use]
    pub const fn new(request_id: Uuid, tx: SignalSender) -> Self {
        Self { request_id, tx }
    }

    /// Request this handle reports for
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Report that audio started
    pub fn started(&self) {
        self.emit(PlaybackEvent::Started);
    }

    /// Report that audio finished
    pub fn ended(&self) {
        self.emit(PlaybackEvent::Ended);
    }

    /// Report a failure
    pub fn failed(&self, error: impl Into<String>) {
        self.emit(PlaybackEvent::Failed(error.into()));
    }

    fn emit(&self, event: PlaybackEvent) {
        let signal = PlaybackSignal {
            request_id: self.request_id,
            event,
        };
        if !self.tx.send(signal) {
            tracing::debug!(request_id = %self.request_id, "playback signal receiver dropped");
        }
    }
}

/// Speech synthesis engine
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether synthesis works in this environment
    fn is_available(&self) -> bool {
        true
    }

    /// Voices the engine offers, in its own order
    fn voices(&self) -> Vec<Voice>;

    /// Begin speaking; report progress through `signals`
    fn synthesize(&self, request: &SpeechRequest, signals: PlaybackSignals);

    /// Stop whatever is being spoken
    fn cancel(&self);
}

/// Visual "speaking" indicator
pub trait PlaybackIndicator: Send + Sync {
    /// Audio for `request` started
    fn speaking_started(&self, request: &SpeechRequest);

    /// Nothing is being spoken any more
    fn speaking_stopped(&self);
}

/// Indicator that renders nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl PlaybackIndicator for NoIndicator {
    fn speaking_started(&self, _request: &SpeechRequest) {}

    fn speaking_stopped(&self) {}
}

/// Playback state machine
///
/// At most one request is current, and only the current request's signals
/// move the phase.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    phase: PlaybackPhase,
    current: Option<SpeechRequest>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackState {
    /// Idle state
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            current: None,
        }
    }

    /// Make `request` current
    ///
    /// Returns false, leaving state untouched, if another request is in flight.
    pub fn begin(&mut self, request: SpeechRequest) -> bool {
        if self.phase.is_active() {
            return false;
        }
        self.phase = PlaybackPhase::Pending;
        self.current = Some(request);
        true
    }

    /// Engine started the current request
    pub fn start(&mut self, id: Uuid) -> bool {
        if self.phase != PlaybackPhase::Pending || !self.is_current(id) {
            return false;
        }
        self.phase = PlaybackPhase::Playing;
        true
    }

    /// Engine finished the current request
    pub fn finish(&mut self, id: Uuid) -> bool {
        self.terminate(id, PlaybackPhase::Ended)
    }

    /// Engine failed the current request
    pub fn fail(&mut self, id: Uuid) -> bool {
        self.terminate(id, PlaybackPhase::Errored)
    }

    /// Cancel whatever is in flight
    ///
    /// Returns the cancelled request, if any.
    pub fn cancel(&mut self) -> Option<SpeechRequest> {
        if !self.phase.is_active() {
            return None;
        }
        self.phase = PlaybackPhase::Ended;
        self.current.take()
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Whether audio is audibly playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.phase == PlaybackPhase::Playing
    }

    /// Current request, if any
    #[must_use]
    pub const fn current_request(&self) -> Option<&SpeechRequest> {
        self.current.as_ref()
    }

    fn is_current(&self, id: Uuid) -> bool {
        self.current.as_ref().is_some_and(|r| r.id == id)
    }

    fn terminate(&mut self, id: Uuid, phase: PlaybackPhase) -> bool {
        if !self.phase.is_active() || !self.is_current(id) {
            return false;
        }
        self.phase = phase;
        self.current = None;
        true
    }
}

/// What happened to a speak request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Handed to the engine
    Queued(Uuid),
    /// Nothing left to say after sanitization
    Empty,
    /// Sanitized text exceeded the length ceiling
    TooLong {
        /// Sanitized length in characters
        chars: usize,
    },
    /// No synthesis engine in this environment
    Unavailable,
}

/// Sanitizes text and drives single-flight playback
pub struct SpeechPipeline {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    indicator: Arc<dyn PlaybackIndicator>,
    signal_tx: SignalSender,
    state: PlaybackState,
    voices: Vec<Voice>,
    available: bool,
}

impl std::fmt::Debug for SpeechPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechPipeline")
            .field("state", &self.state)
            .field("voices", &self.voices.len())
            .field("available", &self.available)
            .finish_non_exhaustive()
    }
}

impl SpeechPipeline {
    /// Create a pipeline; engine signals are delivered on `signal_tx`
    ///
    /// If the engine is unavailable the pipeline still works but never speaks.
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        indicator: Arc<dyn PlaybackIndicator>,
        signal_tx: SignalSender,
    ) -> Self {
        let available = synthesizer.is_available();
        let voices = if available {
            synthesizer.voices()
        } else {
            tracing::warn!("speech synthesis not supported here, responses will not be spoken");
            Vec::new()
        };

        tracing::debug!(voices = voices.len(), available, "speech pipeline initialized");

        Self {
            synthesizer,
            indicator,
            signal_tx,
            state: PlaybackState::new(),
            voices,
            available,
        }
    }

    /// Speak `text`, preempting anything in flight
    pub fn speak(&mut self, text: &str, settings: &Settings) -> SpeakOutcome {
        if !self.available {
            tracing::debug!("speech synthesis unavailable, skipping");
            return SpeakOutcome::Unavailable;
        }

        self.stop();

        let sanitized = speech::sanitize_text(text);
        if sanitized.is_empty() {
            return SpeakOutcome::Empty;
        }
        if !speech::is_speakable(&sanitized) {
            let chars = sanitized.chars().count();
            tracing::info!(chars, max = speech::MAX_SPOKEN_CHARS, "text too long to speak, skipping");
            return SpeakOutcome::TooLong { chars };
        }

        let request = SpeechRequest {
            id: Uuid::new_v4(),
            raw_text: text.to_string(),
            sanitized_text: sanitized,
            voice_params: VoiceParams::resolve(&settings.voice, &self.voices),
        };
        let id = request.id;
        let signals = PlaybackSignals::new(id, self.signal_tx.clone());

        tracing::debug!(
            request_id = %id,
            chars = request.sanitized_text.chars().count(),
            tone = ?request.voice_params.tone,
            voice_index = ?request.voice_params.voice_index,
            "speaking"
        );

        if self.state.begin(request.clone()) {
            self.synthesizer.synthesize(&request, signals);
        }
        SpeakOutcome::Queued(id)
    }

    /// Cancel playback and clear state; safe when idle
    pub fn stop(&mut self) {
        let was_playing = self.state.is_playing();
        if let Some(request) = self.state.cancel() {
            self.synthesizer.cancel();
            tracing::debug!(request_id = %request.id, "playback cancelled");
        }
        if was_playing {
            self.indicator.speaking_stopped();
        }
    }

    /// Apply a lifecycle signal from the engine
    ///
    /// Signals for anything but the current request are ignored. Returns true
    /// if the signal changed state.
    pub fn on_signal(&mut self, signal: PlaybackSignal) -> bool {
        let id = signal.request_id;
        match signal.event {
            PlaybackEvent::Started => {
                if !self.state.start(id) {
                    tracing::debug!(request_id = %id, "ignoring start for stale request");
                    return false;
                }
                if let Some(request) = self.state.current_request() {
                    self.indicator.speaking_started(request);
                }
                tracing::debug!(request_id = %id, "playback started");
                true
            }
            PlaybackEvent::Ended => {
                let was_playing = self.state.is_playing();
                if !self.state.finish(id) {
                    return false;
                }
                if was_playing {
                    self.indicator.speaking_stopped();
                }
                tracing::debug!(request_id = %id, "playback finished");
                true
            }
            PlaybackEvent::Failed(error) => {
                let was_playing = self.state.is_playing();
                if !self.state.fail(id) {
                    tracing::debug!(request_id = %id, error = %error, "ignoring failure for stale request");
                    return false;
                }
                if was_playing {
                    self.indicator.speaking_stopped();
                }
                tracing::warn!(request_id = %id, error = %error, "speech synthesis failed");
                true
            }
        }
    }

    /// Re-read the engine's voice list
    ///
    /// Engines often load voices lazily, so the list may grow after startup.
    pub fn refresh_voices(&mut self) {
        if self.available {
            self.voices = self.synthesizer.voices();
            tracing::debug!(voices = self.voices.len(), "voice list refreshed");
        }
    }

    /// Voices as last enumerated
    #[must_use]
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Whether audio is playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Whether an utterance is requested or playing
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.state.phase().is_active()
    }

    /// Playback state
    #[must_use]
    pub const fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Whether synthesis is available
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.available
    }
}
