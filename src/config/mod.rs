//! Configuration management for Beacon voice
//!
//! Settings resolve as `env > toml > default`, one field at a time. A missing,
//! empty or malformed value never aborts loading; it falls back to its default.

pub mod file;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;
use file::VoiceConfigFile;

/// Default go-word
pub const DEFAULT_GO_WORD: &str = "go";

/// Default silence before buffered text is sent
pub const DEFAULT_PAUSE_LENGTH_MS: u64 = 2000;

/// Default phrase that closes a conversation
pub const DEFAULT_END_PHRASE: &str = "end conversation";

/// Default wake phrase
pub const DEFAULT_WAKE_PHRASE: &str = "hey bot";

/// Default passive listening timeout
pub const DEFAULT_WAKE_TIMEOUT_SECONDS: u64 = 10;

/// Resolved turn-taking and speech settings
///
/// Immutable for the duration of a call; the controller re-reads it whenever
/// the host pushes an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Token that sends the buffered utterance
    pub go_word: String,

    /// Silence before buffered text is sent automatically
    pub pause_length_ms: u64,

    /// Phrase that closes the conversation
    pub end_phrase: String,

    /// Buffer several sentences until the go-word or a pause
    pub multi_sentence_mode: bool,

    /// Speak backend responses as soon as they arrive
    pub auto_start_response: bool,

    /// Listen for the wake phrase when no conversation is active
    pub wake_word_enabled: bool,

    /// Phrase that starts a conversation
    pub wake_phrase: String,

    /// Seconds of passive listening before giving up
    pub wake_timeout_seconds: u64,

    /// Return to wake listening after every dispatch instead of stopping
    pub persistent_listening_enabled: bool,

    /// Speech output settings
    pub voice: VoiceSettings,
}

/// Speech output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Index into the synthesizer's voice list; `None` uses the engine default
    pub voice_index: Option<usize>,

    /// Tone identifier (see [`crate::voice::Tone`])
    pub tone: String,

    /// Speaking rate multiplier
    pub rate: f32,

    /// Pitch multiplier
    pub pitch: f32,

    /// Output volume (0.0 to 1.0)
    pub volume: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            go_word: DEFAULT_GO_WORD.to_string(),
            pause_length_ms: DEFAULT_PAUSE_LENGTH_MS,
            end_phrase: DEFAULT_END_PHRASE.to_string(),
            multi_sentence_mode: true,
            auto_start_response: true,
            wake_word_enabled: false,
            wake_phrase: DEFAULT_WAKE_PHRASE.to_string(),
            wake_timeout_seconds: DEFAULT_WAKE_TIMEOUT_SECONDS,
            persistent_listening_enabled: false,
            voice: VoiceSettings::default(),
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_index: None,
            tone: "neutral".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl Settings {
    /// Load settings from the standard config file and environment
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Load settings from an explicit config file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid TOML
    pub fn load_from(path: &Path) -> Result<Self> {
        let fc = file::load_config_file_from(path)?;
        Ok(Self::resolve(fc, |key| std::env::var(key).ok()))
    }

    /// Resolve settings from a file overlay and an environment lookup
    ///
    /// Each field falls back independently to its default when absent or invalid.
    pub fn resolve(fc: VoiceConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let conversation = fc.conversation;
        let wake = fc.wake;
        let speech = fc.speech;

        let voice = VoiceSettings {
            voice_index: env("BEACON_VOICE_INDEX")
                .and_then(|s| s.trim().parse().ok())
                .or(speech.voice_index),
            tone: non_empty(env("BEACON_VOICE_TONE"))
                .or_else(|| non_empty(speech.tone))
                .unwrap_or(defaults.voice.tone),
            rate: finite(env("BEACON_VOICE_RATE").and_then(|s| s.trim().parse().ok()))
                .or_else(|| finite(speech.rate))
                .unwrap_or(defaults.voice.rate),
            pitch: finite(env("BEACON_VOICE_PITCH").and_then(|s| s.trim().parse().ok()))
                .or_else(|| finite(speech.pitch))
                .unwrap_or(defaults.voice.pitch),
            volume: finite(env("BEACON_VOICE_VOLUME").and_then(|s| s.trim().parse().ok()))
                .or_else(|| finite(speech.volume))
                .unwrap_or(defaults.voice.volume),
        };

        let settings = Self {
            go_word: non_empty(env("BEACON_GO_WORD"))
                .or_else(|| non_empty(conversation.go_word))
                .unwrap_or(defaults.go_word),
            pause_length_ms: positive(env("BEACON_PAUSE_LENGTH_MS"))
                .or(conversation.pause_length_ms)
                .unwrap_or(defaults.pause_length_ms),
            end_phrase: non_empty(env("BEACON_END_PHRASE"))
                .or_else(|| non_empty(conversation.end_phrase))
                .unwrap_or(defaults.end_phrase),
            multi_sentence_mode: flag(env("BEACON_MULTI_SENTENCE"))
                .or(conversation.multi_sentence_mode)
                .unwrap_or(defaults.multi_sentence_mode),
            auto_start_response: flag(env("BEACON_AUTO_START_RESPONSE"))
                .or(conversation.auto_start_response)
                .unwrap_or(defaults.auto_start_response),
            wake_word_enabled: flag(env("BEACON_WAKE_WORD_ENABLED"))
                .or(wake.enabled)
                .unwrap_or(defaults.wake_word_enabled),
            wake_phrase: non_empty(env("BEACON_WAKE_PHRASE"))
                .or_else(|| non_empty(wake.phrase))
                .unwrap_or(defaults.wake_phrase),
            wake_timeout_seconds: positive(env("BEACON_WAKE_TIMEOUT_SECONDS"))
                .or(wake.timeout_seconds)
                .unwrap_or(defaults.wake_timeout_seconds),
            persistent_listening_enabled: flag(env("BEACON_PERSISTENT_LISTENING"))
                .or(wake.persistent)
                .unwrap_or(defaults.persistent_listening_enabled),
            voice,
        };

        tracing::debug!(?settings, "resolved voice settings");
        settings
    }

    /// Repair values that bypassed [`Settings::resolve`] (e.g. hand-built or deserialized)
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.go_word.trim().is_empty() {
            self.go_word = defaults.go_word;
        }
        if self.end_phrase.trim().is_empty() {
            self.end_phrase = defaults.end_phrase;
        }
        if self.wake_phrase.trim().is_empty() {
            self.wake_phrase = defaults.wake_phrase;
        }
        if self.pause_length_ms == 0 {
            self.pause_length_ms = defaults.pause_length_ms;
        }
        if self.wake_timeout_seconds == 0 {
            self.wake_timeout_seconds = defaults.wake_timeout_seconds;
        }
        self
    }

    /// Silence interval before buffered text is sent
    #[must_use]
    pub const fn pause_length(&self) -> Duration {
        Duration::from_millis(self.pause_length_ms)
    }

    /// Passive listening timeout
    #[must_use]
    pub const fn wake_timeout(&self) -> Duration {
        Duration::from_secs(self.wake_timeout_seconds)
    }

    /// Render settings as TOML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn positive(value: Option<String>) -> Option<u64> {
    value
        .and_then(|s| s.trim().parse().ok())
        .filter(|n: &u64| *n > 0)
}

fn flag(value: Option<String>) -> Option<bool> {
    value.map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}
