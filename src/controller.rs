//! Voice controller actor
//!
//! Owns a [`ConversationSession`] and a [`SpeechPipeline`] and drives both from
//! a single event queue. Host commands, timer firings and playback signals all
//! land on that queue, so they are handled strictly in arrival order.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::voice::{
    ConversationSession, Decision, DispatchSink, PlaybackIndicator, PlaybackPhase, PlaybackSignal,
    SessionMode, SignalSender, SpeakOutcome, SpeechPipeline, SpeechSynthesizer, TimerFired,
    TimerOutcome, TimerSender,
};

/// Command sent to a running controller
#[derive(Debug, Clone)]
pub enum VoiceCommand {
    /// A finalized transcript from the recognizer
    Transcript(String),
    /// Begin an active conversation
    Start,
    /// End the active conversation
    End,
    /// Reply from the backend; spoken when `auto_start_response` is set
    Respond(String),
    /// Speak text regardless of `auto_start_response`
    Speak(String),
    /// Cancel playback
    StopSpeaking,
    /// Re-read the synthesizer's voice list
    RefreshVoices,
    /// Replace settings
    UpdateSettings(Box<Settings>),
    /// Stop the controller
    Shutdown,
}

/// Everything the controller reacts to
#[derive(Debug)]
enum ControllerEvent {
    Command(VoiceCommand),
    Timer(TimerFired),
    Playback(PlaybackSignal),
}

impl From<TimerFired> for ControllerEvent {
    fn from(fired: TimerFired) -> Self {
        Self::Timer(fired)
    }
}

impl From<PlaybackSignal> for ControllerEvent {
    fn from(signal: PlaybackSignal) -> Self {
        Self::Playback(signal)
    }
}

/// Snapshot of controller state, published after every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceStatus {
    /// Conversation mode
    pub mode: SessionMode,
    /// Text buffered but not yet sent
    pub buffered_text: String,
    /// Sentences buffered since the last dispatch
    pub sentence_count: usize,
    /// Whether an auto-send is pending
    pub pause_pending: bool,
    /// Whether the wake word timeout is pending
    pub wake_timeout_pending: bool,
    /// Playback phase
    pub playback: PlaybackPhase,
}

impl Default for VoiceStatus {
    fn default() -> Self {
        Self {
            mode: SessionMode::Idle,
            buffered_text: String::new(),
            sentence_count: 0,
            pause_pending: false,
            wake_timeout_pending: false,
            playback: PlaybackPhase::Idle,
        }
    }
}

impl VoiceStatus {
    /// Whether audio is audibly playing
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.playback == PlaybackPhase::Playing
    }
}

/// Cloneable handle to a running controller
#[derive(Debug, Clone)]
pub struct VoiceHandle {
    tx: mpsc::UnboundedSender<ControllerEvent>,
    status: watch::Receiver<VoiceStatus>,
}

impl VoiceHandle {
    /// Send a command
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerClosed`] if the controller has stopped
    pub fn send(&self, command: VoiceCommand) -> Result<()> {
        self.tx
            .send(ControllerEvent::Command(command))
            .map_err(|_| Error::ControllerClosed)
    }

    /// Feed a finalized transcript
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerClosed`] if the controller has stopped
    pub fn transcript(&self, text: impl Into<String>) -> Result<()> {
        self.send(VoiceCommand::Transcript(text.into()))
    }

    /// Begin an active conversation
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerClosed`] if the controller has stopped
    pub fn start(&self) -> Result<()> {
        self.send(VoiceCommand::Start)
    }

    /// End the active conversation
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerClosed`] if the controller has stopped
    pub fn end(&self) -> Result<()> {
        self.send(VoiceCommand::End)
    }

    /// Deliver a backend reply
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerClosed`] if the controller has stopped
    pub fn respond(&self, text: impl Into<String>) -> Result<()> {
        self.send(VoiceCommand::Respond(text.into()))
    }

    /// Speak text now
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerClosed`] if the controller has stopped
    pub fn speak(&self, text: impl Into<String>) -> Result<()> {
        self.send(VoiceCommand::Speak(text.into()))
    }

    /// Cancel playback
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerClosed`] if the controller has stopped
    pub fn stop_speaking(&self) -> Result<()> {
        self.send(VoiceCommand::StopSpeaking)
    }

    /// Replace settings
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerClosed`] if the controller has stopped
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        self.send(VoiceCommand::UpdateSettings(Box::new(settings)))
    }

    /// Latest published status
    #[must_use]
    pub fn status(&self) -> VoiceStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VoiceStatus> {
        self.status.clone()
    }

    /// Stop the controller and wait for it to drop its queue
    ///
    /// # Errors
    ///
    /// Returns [`Error::ControllerClosed`] if the controller had already stopped
    pub async fn shutdown(&self) -> Result<()> {
        self.send(VoiceCommand::Shutdown)?;
        self.tx.closed().await;
        Ok(())
    }
}

/// Turn-taking and speech output behind one event loop
pub struct VoiceController {
    settings: Settings,
    session: ConversationSession,
    pipeline: SpeechPipeline,
    sink: Arc<dyn DispatchSink>,
    events: mpsc::UnboundedReceiver<ControllerEvent>,
    status: watch::Sender<VoiceStatus>,
}

impl std::fmt::Debug for VoiceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceController")
            .field("session", &self.session)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl VoiceController {
    /// Build a controller and its handle
    ///
    /// Messages for the backend go to `sink`. Call [`Self::run`] (or use
    /// [`Self::spawn`]) to start processing.
    #[must_use]
    pub fn new(
        settings: Settings,
        sink: Arc<dyn DispatchSink>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        indicator: Arc<dyn PlaybackIndicator>,
    ) -> (Self, VoiceHandle) {
        let (tx, events) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(VoiceStatus::default());

        let session = ConversationSession::new(Arc::clone(&sink), TimerSender::new(tx.clone()));
        let pipeline = SpeechPipeline::new(synthesizer, indicator, SignalSender::new(tx.clone()));

        let controller = Self {
            settings: settings.sanitized(),
            session,
            pipeline,
            sink,
            events,
            status,
        };
        let handle = VoiceHandle {
            tx,
            status: status_rx,
        };
        (controller, handle)
    }

    /// Build a controller and run it on the tokio runtime
    #[must_use]
    pub fn spawn(
        settings: Settings,
        sink: Arc<dyn DispatchSink>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        indicator: Arc<dyn PlaybackIndicator>,
    ) -> (VoiceHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(settings, sink, synthesizer, indicator);
        let task = tokio::spawn(controller.run());
        (handle, task)
    }

    /// Process events until shutdown
    ///
    /// Returns when a [`VoiceCommand::Shutdown`] arrives or every handle is
    /// dropped.
    pub async fn run(mut self) {
        if self.settings.wake_word_enabled {
            self.session.start_passive_listening(&self.settings);
        }
        self.publish();
        tracing::info!(
            wake_word = self.settings.wake_word_enabled,
            persistent = self.settings.persistent_listening_enabled,
            "voice controller started"
        );

        // The session and pipeline hold senders into the queue, so it never
        // drains on its own; every handle owns a status receiver instead.
        loop {
            let event = tokio::select! {
                event = self.events.recv() => event,
                () = self.status.closed() => None,
            };
            let Some(event) = event else { break };

            match event {
                ControllerEvent::Command(VoiceCommand::Shutdown) => break,
                ControllerEvent::Command(command) => self.handle_command(command),
                ControllerEvent::Timer(fired) => self.handle_timer(fired),
                ControllerEvent::Playback(signal) => {
                    self.pipeline.on_signal(signal);
                }
            }
            self.publish();
        }

        self.pipeline.stop();
        self.session.end();
        self.session.stop_passive_listening();
        self.publish();
        tracing::info!("voice controller stopped");
    }

    fn handle_command(&mut self, command: VoiceCommand) {
        match command {
            VoiceCommand::Transcript(text) => self.handle_transcript(&text),
            VoiceCommand::Start => {
                self.session.start(&self.settings);
            }
            VoiceCommand::End => {
                self.session.end();
                if self.settings.persistent_listening_enabled {
                    self.session.start_passive_listening(&self.settings);
                }
            }
            VoiceCommand::Respond(text) => {
                if self.settings.auto_start_response {
                    self.speak(&text);
                } else {
                    tracing::debug!("auto response disabled, not speaking reply");
                }
            }
            VoiceCommand::Speak(text) => self.speak(&text),
            VoiceCommand::StopSpeaking => self.pipeline.stop(),
            VoiceCommand::RefreshVoices => self.pipeline.refresh_voices(),
            VoiceCommand::UpdateSettings(settings) => self.apply_settings(*settings),
            VoiceCommand::Shutdown => {}
        }
    }

    fn handle_transcript(&mut self, text: &str) {
        match self.session.mode() {
            SessionMode::PassiveListening => {
                if self.pipeline.is_busy() {
                    tracing::debug!("speaking, ignoring wake candidate");
                    return;
                }
                let wake = self.session.check_wake_word(text, &self.settings);
                if !wake.detected {
                    return;
                }
                self.session.start(&self.settings);
                if !wake.cleaned_transcript.is_empty() {
                    self.process(&wake.cleaned_transcript);
                }
            }
            SessionMode::Idle | SessionMode::ActiveConversation => self.process(text),
        }
    }

    fn process(&mut self, text: &str) {
        if let Decision::Dispatch(message) = self.session.process_transcript(text, &self.settings) {
            tracing::debug!(len = message.len(), "dispatching message");
            self.sink.send(message);
        }
    }

    fn handle_timer(&mut self, fired: TimerFired) {
        match self.session.on_timer(fired, &self.settings) {
            TimerOutcome::Ignored | TimerOutcome::Dispatched(_) => {}
            TimerOutcome::WakeTimedOut => {
                tracing::debug!("wake listening expired");
            }
        }
    }

    fn speak(&mut self, text: &str) {
        match self.pipeline.speak(text, &self.settings) {
            SpeakOutcome::Queued(id) => tracing::trace!(request_id = %id, "speech queued"),
            SpeakOutcome::Empty => tracing::debug!("nothing to speak after sanitization"),
            SpeakOutcome::TooLong { .. } | SpeakOutcome::Unavailable => {}
        }
    }

    fn apply_settings(&mut self, settings: Settings) {
        self.settings = settings.sanitized();
        tracing::info!(
            wake_word = self.settings.wake_word_enabled,
            persistent = self.settings.persistent_listening_enabled,
            multi_sentence = self.settings.multi_sentence_mode,
            "voice settings updated"
        );

        let wants_listening =
            self.settings.wake_word_enabled || self.settings.persistent_listening_enabled;
        match self.session.mode() {
            SessionMode::Idle if self.settings.wake_word_enabled => {
                self.session.start_passive_listening(&self.settings);
            }
            SessionMode::PassiveListening if wants_listening => {
                // Re-arm so a changed phrase or timeout takes effect
                self.session.start_passive_listening(&self.settings);
            }
            SessionMode::PassiveListening => self.session.stop_passive_listening(),
            SessionMode::Idle | SessionMode::ActiveConversation => {}
        }
    }

    fn publish(&self) {
        let next = VoiceStatus {
            mode: self.session.mode(),
            buffered_text: self.session.buffered_text().to_string(),
            sentence_count: self.session.sentence_count(),
            pause_pending: self.session.pause_pending(),
            wake_timeout_pending: self.session.wake_timeout_pending(),
            playback: self.pipeline.state().phase(),
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
