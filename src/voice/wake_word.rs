//! Wake word detection
//!
//! Matches the configured wake phrase against recognized transcripts while
//! passive listening is armed. Listening optionally gives up after a timeout.

use crate::config::Settings;

use super::phrase;
use super::timer::{TimerFired, TimerKind, TimerSender, TimerSlot};

/// State of the wake word detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Not listening
    Idle,
    /// Passive listening armed, waiting for the wake phrase
    Listening,
    /// Wake phrase detected; listening disarmed until restarted
    Activated,
}

/// Result of evaluating a transcript against the wake phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeMatch {
    /// Whether the wake phrase was found
    pub detected: bool,
    /// Transcript with the wake phrase removed (unchanged when not detected)
    pub cleaned_transcript: String,
}

/// Detects the wake phrase in transcripts during passive listening
#[derive(Debug)]
pub struct WakeWordDetector {
    state: DetectorState,
    timeout: TimerSlot,
    timer_tx: TimerSender,
}

impl WakeWordDetector {
    /// Create a detector that reports its timeout on `timer_tx`
    #[must_use]
    pub const fn new(timer_tx: TimerSender) -> Self {
        Self {
            state: DetectorState::Idle,
            timeout: TimerSlot::new(TimerKind::WakeTimeout),
            timer_tx,
        }
    }

    /// Arm passive listening
    ///
    /// Outside persistent mode a timeout of `wake_timeout_seconds` is armed;
    /// when it fires listening is disarmed (see [`Self::on_timeout`]).
    pub fn start_passive_listening(&mut self, settings: &Settings) {
        self.timeout.cancel();
        self.state = DetectorState::Listening;

        if settings.persistent_listening_enabled {
            tracing::info!(wake_phrase = %settings.wake_phrase, "listening for wake word");
        } else {
            self.timeout.arm(settings.wake_timeout(), &self.timer_tx);
            tracing::info!(
                wake_phrase = %settings.wake_phrase,
                timeout_secs = settings.wake_timeout_seconds,
                "listening for wake word"
            );
        }
    }

    /// Disarm passive listening and cancel any pending timeout
    ///
    /// Safe to call when not listening.
    pub fn stop_passive_listening(&mut self) {
        self.timeout.cancel();
        if self.state == DetectorState::Listening {
            tracing::debug!("wake word listening stopped");
        }
        self.state = DetectorState::Idle;
    }

    /// Check a transcript for the wake phrase
    ///
    /// Only evaluated while listening; otherwise reports no detection.
    pub fn process_candidate(&mut self, transcript: &str, settings: &Settings) -> WakeMatch {
        if self.state != DetectorState::Listening {
            return WakeMatch {
                detected: false,
                cleaned_transcript: transcript.to_string(),
            };
        }

        if !phrase::contains_phrase(transcript, &settings.wake_phrase) {
            tracing::trace!(transcript, "no wake word");
            return WakeMatch {
                detected: false,
                cleaned_transcript: transcript.to_string(),
            };
        }

        self.timeout.cancel();
        self.state = DetectorState::Activated;

        let cleaned = phrase::strip_phrase(transcript, &settings.wake_phrase);
        tracing::info!(wake_phrase = %settings.wake_phrase, transcript, "wake word detected");

        WakeMatch {
            detected: true,
            cleaned_transcript: cleaned,
        }
    }

    /// Handle a wake timeout firing
    ///
    /// Returns true if listening was disarmed by this firing.
    pub fn on_timeout(&mut self, fired: TimerFired) -> bool {
        if !self.timeout.accept(fired) {
            return false;
        }
        if self.state != DetectorState::Listening {
            return false;
        }

        self.state = DetectorState::Idle;
        tracing::info!("wake word listening timed out");
        true
    }

    /// Check if passive listening is armed
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == DetectorState::Listening
    }

    /// Check if a timeout is pending
    #[must_use]
    pub const fn timeout_pending(&self) -> bool {
        self.timeout.is_pending()
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn channel() -> (TimerSender, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TimerSender::new(tx), rx)
    }

    fn settings() -> Settings {
        Settings::default()
    }

    #[tokio::test]
    async fn test_wake_word_detection() {
        let (tx, _rx) = channel();
        let mut detector = WakeWordDetector::new(tx);
        detector.start_passive_listening(&settings());

        let miss = detector.process_candidate("hello world", &settings());
        assert!(!miss.detected);
        assert_eq!(miss.cleaned_transcript, "hello world");
        assert_eq!(detector.state(), DetectorState::Listening);

        let hit = detector.process_candidate("Hey Bot please", &settings());
        assert!(hit.detected);
        assert_eq!(hit.cleaned_transcript, "please");
        assert_eq!(detector.state(), DetectorState::Activated);
        assert!(!detector.timeout_pending());
    }

    #[test]
    fn test_not_listening_is_noop() {
        let (tx, _rx) = channel();
        let mut detector = WakeWordDetector::new(tx);

        let result = detector.process_candidate("hey bot", &settings());
        assert!(!result.detected);
        assert_eq!(result.cleaned_transcript, "hey bot");
        assert_eq!(detector.state(), DetectorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_disarms() {
        let (tx, mut rx) = channel();
        let mut detector = WakeWordDetector::new(tx);
        detector.start_passive_listening(&settings());
        assert!(detector.timeout_pending());

        let start = tokio::time::Instant::now();
        let fired = rx.recv().await.unwrap();
        let elapsed = start.elapsed().as_millis();
        assert!((10000..10005).contains(&elapsed), "fired after {elapsed}ms");

        assert!(detector.on_timeout(fired));
        assert!(!detector.is_listening());
        assert!(!detector.process_candidate("hey bot", &settings()).detected);
    }

    #[tokio::test]
    async fn test_persistent_mode_has_no_timeout() {
        let (tx, _rx) = channel();
        let mut detector = WakeWordDetector::new(tx);
        let persistent = Settings {
            persistent_listening_enabled: true,
            ..Settings::default()
        };

        detector.start_passive_listening(&persistent);
        assert!(detector.is_listening());
        assert!(!detector.timeout_pending());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (tx, _rx) = channel();
        let mut detector = WakeWordDetector::new(tx);

        detector.stop_passive_listening();
        detector.start_passive_listening(&settings());
        detector.stop_passive_listening();
        detector.stop_passive_listening();

        assert_eq!(detector.state(), DetectorState::Idle);
        assert!(!detector.timeout_pending());
    }
}
