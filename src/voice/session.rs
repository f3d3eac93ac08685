//! Conversation turn-taking
//!
//! A [`ConversationSession`] decides when buffered speech becomes a message for
//! the backend. It owns the pause timer and the wake word detector, and is
//! driven by one caller at a time (see [`crate::controller`]).

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Settings;

use super::phrase;
use super::timer::{TimerFired, TimerKind, TimerSender, TimerSlot};
use super::wake_word::{WakeMatch, WakeWordDetector};

/// Conversation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// No conversation and no wake word listening
    Idle,
    /// Waiting for the wake phrase
    PassiveListening,
    /// Conversation in progress
    ActiveConversation,
}

/// Outcome of processing one transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// More input expected; nothing to send yet
    Hold,
    /// Send this message to the backend now
    Dispatch(String),
    /// End phrase heard; the conversation was closed (any flush went to the sink)
    Closed,
}

impl Decision {
    /// Whether the caller should send a message
    #[must_use]
    pub const fn dispatches(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    /// Message to send, if any
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Dispatch(message) => Some(message),
            Self::Hold | Self::Closed => None,
        }
    }
}

/// Outcome of a timer firing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Stale or no-op firing
    Ignored,
    /// Pause elapsed and the buffer was sent
    Dispatched(String),
    /// Wake word listening gave up
    WakeTimedOut,
}

/// Receives completed user messages
///
/// Fire-and-forget: delivery problems are the sink's to log.
pub trait DispatchSink: Send + Sync {
    /// Route a message to the conversational backend
    fn send(&self, message: String);
}

impl DispatchSink for mpsc::UnboundedSender<String> {
    fn send(&self, message: String) {
        if mpsc::UnboundedSender::send(self, message).is_err() {
            tracing::warn!("dispatch receiver dropped, message lost");
        }
    }
}

/// State of one user interaction
pub struct ConversationSession {
    mode: SessionMode,
    buffer: String,
    sentence_count: usize,
    pause: TimerSlot,
    wake: WakeWordDetector,
    timer_tx: TimerSender,
    sink: Arc<dyn DispatchSink>,
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("mode", &self.mode)
            .field("buffer", &self.buffer)
            .field("sentence_count", &self.sentence_count)
            .field("pause", &self.pause)
            .field("wake", &self.wake)
            .finish_non_exhaustive()
    }
}

impl ConversationSession {
    /// Create an idle session
    ///
    /// Timer firings are delivered on `timer_tx` and must be fed back through
    /// [`Self::on_timer`]; side-effect dispatches go to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn DispatchSink>, timer_tx: TimerSender) -> Self {
        Self {
            mode: SessionMode::Idle,
            buffer: String::new(),
            sentence_count: 0,
            pause: TimerSlot::new(TimerKind::Pause),
            wake: WakeWordDetector::new(timer_tx.clone()),
            timer_tx,
            sink,
        }
    }

    /// Begin an active conversation
    ///
    /// Returns false without touching state if one is already active.
    pub fn start(&mut self, settings: &Settings) -> bool {
        if self.mode == SessionMode::ActiveConversation {
            tracing::debug!("conversation already active, ignoring start");
            return false;
        }

        self.clear_conversation();
        self.mode = SessionMode::ActiveConversation;
        tracing::info!(
            multi_sentence = settings.multi_sentence_mode,
            go_word = %settings.go_word,
            "conversation started"
        );
        true
    }

    /// End the active conversation and go idle
    ///
    /// Returns false if no conversation was active.
    pub fn end(&mut self) -> bool {
        if self.mode != SessionMode::ActiveConversation {
            return false;
        }

        self.clear_conversation();
        self.mode = SessionMode::Idle;
        tracing::info!("conversation ended");
        true
    }

    /// Clear the conversation like [`Self::end`], then return to wake listening
    ///
    /// Returns true if an active conversation was closed by this call.
    pub fn restart_passive_listening(&mut self, settings: &Settings) -> bool {
        let was_active = self.mode == SessionMode::ActiveConversation;

        self.clear_conversation();
        self.wake.start_passive_listening(settings);
        self.mode = SessionMode::PassiveListening;
        tracing::debug!(was_active, "restarted passive listening");
        was_active
    }

    /// Arm wake word listening from idle
    ///
    /// Returns false if a conversation is active.
    pub fn start_passive_listening(&mut self, settings: &Settings) -> bool {
        if self.mode == SessionMode::ActiveConversation {
            tracing::debug!("conversation active, not arming wake word listening");
            return false;
        }

        self.wake.start_passive_listening(settings);
        self.mode = SessionMode::PassiveListening;
        true
    }

    /// Disarm wake word listening; idempotent
    pub fn stop_passive_listening(&mut self) {
        self.wake.stop_passive_listening();
        if self.mode == SessionMode::PassiveListening {
            self.mode = SessionMode::Idle;
        }
    }

    /// Evaluate a transcript against the wake phrase
    ///
    /// Detection only disarms the detector; the caller decides whether to
    /// [`Self::start`] a conversation.
    pub fn check_wake_word(&mut self, transcript: &str, settings: &Settings) -> WakeMatch {
        self.wake.process_candidate(transcript, settings)
    }

    /// Decide what to do with one recognized transcript
    pub fn process_transcript(&mut self, transcript: &str, settings: &Settings) -> Decision {
        if self.mode != SessionMode::ActiveConversation {
            tracing::debug!(mode = ?self.mode, "no active conversation, sending standalone");
            return Decision::Dispatch(transcript.to_string());
        }

        if phrase::contains_phrase(transcript, &settings.end_phrase) {
            self.pause.cancel();
            if let Some(message) = self.take_buffer() {
                tracing::info!(len = message.len(), "end phrase heard, flushing buffer");
                self.sink.send(message);
            } else {
                tracing::info!("end phrase heard");
            }
            self.conclude(settings);
            return Decision::Closed;
        }

        if transcript.trim().is_empty() {
            return Decision::Hold;
        }

        if !settings.multi_sentence_mode {
            self.buffer = transcript.to_string();
            let message = std::mem::take(&mut self.buffer);
            self.conclude(settings);
            return Decision::Dispatch(message);
        }

        if let Some(remainder) = phrase::strip_go_word(transcript, &settings.go_word) {
            self.pause.cancel();
            self.append(&remainder);

            let Some(message) = self.take_buffer() else {
                tracing::debug!("go-word with nothing buffered");
                return Decision::Hold;
            };
            tracing::info!(len = message.len(), sentences = self.sentence_count, "go-word heard");
            self.conclude(settings);
            return Decision::Dispatch(message);
        }

        self.append(transcript);
        self.sentence_count += 1;
        self.pause.arm(settings.pause_length(), &self.timer_tx);
        tracing::debug!(
            sentences = self.sentence_count,
            pause_ms = settings.pause_length_ms,
            "buffered transcript"
        );
        Decision::Hold
    }

    /// Handle a timer firing delivered on the session's timer channel
    pub fn on_timer(&mut self, fired: TimerFired, settings: &Settings) -> TimerOutcome {
        match fired.kind {
            TimerKind::Pause => {
                if !self.pause.accept(fired) {
                    return TimerOutcome::Ignored;
                }
                let Some(message) = self.take_buffer() else {
                    tracing::debug!("pause elapsed with empty buffer");
                    return TimerOutcome::Ignored;
                };

                tracing::info!(len = message.len(), "pause elapsed, sending buffer");
                self.sink.send(message.clone());
                self.conclude(settings);
                TimerOutcome::Dispatched(message)
            }
            TimerKind::WakeTimeout => {
                if !self.wake.on_timeout(fired) {
                    return TimerOutcome::Ignored;
                }
                if self.mode == SessionMode::PassiveListening {
                    self.mode = SessionMode::Idle;
                }
                TimerOutcome::WakeTimedOut
            }
        }
    }

    /// Current mode
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Text buffered but not yet sent
    #[must_use]
    pub fn buffered_text(&self) -> &str {
        &self.buffer
    }

    /// Sentences buffered since the last dispatch
    #[must_use]
    pub const fn sentence_count(&self) -> usize {
        self.sentence_count
    }

    /// Whether an auto-send is pending
    #[must_use]
    pub const fn pause_pending(&self) -> bool {
        self.pause.is_pending()
    }

    /// Whether the wake word timeout is pending
    #[must_use]
    pub const fn wake_timeout_pending(&self) -> bool {
        self.wake.timeout_pending()
    }

    /// Drop all conversation state and every timer tied to it
    fn clear_conversation(&mut self) {
        self.pause.cancel();
        self.wake.stop_passive_listening();
        self.buffer.clear();
        self.sentence_count = 0;
    }

    /// Leave the conversation after a dispatch or end phrase
    fn conclude(&mut self, settings: &Settings) {
        if settings.persistent_listening_enabled {
            self.restart_passive_listening(settings);
        } else {
            self.end();
        }
    }

    fn append(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.buffer.push_str(text);
        self.buffer.push(' ');
    }

    fn take_buffer(&mut self) -> Option<String> {
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }
}
