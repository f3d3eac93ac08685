//! TOML configuration file loading
//!
//! Supports `~/.config/omni/beacon/voice.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.
//! Fields are parsed one at a time, so a malformed value only loses itself.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoiceConfigFile {
    /// Turn-taking configuration
    #[serde(default)]
    pub conversation: ConversationFileConfig,

    /// Wake word configuration
    #[serde(default)]
    pub wake: WakeFileConfig,

    /// Speech output configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,
}

/// Turn-taking configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Token that sends the buffered utterance (e.g. "go")
    #[serde(default, deserialize_with = "lenient")]
    pub go_word: Option<String>,

    /// Silence before buffered text is sent automatically
    #[serde(default, deserialize_with = "lenient_positive")]
    pub pause_length_ms: Option<u64>,

    /// Phrase that closes the conversation
    #[serde(default, deserialize_with = "lenient")]
    pub end_phrase: Option<String>,

    /// Buffer several sentences before sending
    #[serde(default, deserialize_with = "lenient")]
    pub multi_sentence_mode: Option<bool>,

    /// Speak backend responses as soon as they arrive
    #[serde(default, deserialize_with = "lenient")]
    pub auto_start_response: Option<bool>,
}

/// Wake word configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    /// Listen for the wake phrase when idle
    #[serde(default, deserialize_with = "lenient")]
    pub enabled: Option<bool>,

    /// Phrase that starts a conversation (e.g. "hey bot")
    #[serde(default, deserialize_with = "lenient")]
    pub phrase: Option<String>,

    /// Seconds of passive listening before giving up
    #[serde(default, deserialize_with = "lenient_positive")]
    pub timeout_seconds: Option<u64>,

    /// Return to wake listening after every dispatch
    #[serde(default, deserialize_with = "lenient")]
    pub persistent: Option<bool>,
}

/// Speech output configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// Index into the synthesizer's voice list
    #[serde(default, deserialize_with = "lenient")]
    pub voice_index: Option<usize>,

    /// Tone identifier (e.g. "friendly")
    #[serde(default, deserialize_with = "lenient")]
    pub tone: Option<String>,

    /// Speaking rate multiplier
    #[serde(default, deserialize_with = "lenient")]
    pub rate: Option<f32>,

    /// Pitch multiplier
    #[serde(default, deserialize_with = "lenient")]
    pub pitch: Option<f32>,

    /// Output volume (0.0 to 1.0)
    #[serde(default, deserialize_with = "lenient")]
    pub volume: Option<f32>,
}

/// Accept the field if it has the right type, otherwise drop it with a warning
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = toml::Value::deserialize(deserializer)?;
    match T::deserialize(value.clone()) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            tracing::warn!(%value, error = %e, "ignoring malformed config value");
            Ok(None)
        }
    }
}

/// Accept a positive integer, written either as a number or a numeric string
fn lenient_positive<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = toml::Value::deserialize(deserializer)?;
    let parsed = match &value {
        toml::Value::Integer(n) => u64::try_from(*n).ok(),
        toml::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n| *n > 0);

    if parsed.is_none() {
        tracing::warn!(%value, "ignoring non-positive or non-numeric duration");
    }
    Ok(parsed)
}

/// Load the TOML config file from the standard path
///
/// Returns `VoiceConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoiceConfigFile {
    let Some(path) = config_file_path() else {
        return VoiceConfigFile::default();
    };

    if !path.exists() {
        return VoiceConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            VoiceConfigFile::default()
        }
    }
}

/// Load a TOML config file from an explicit path
///
/// # Errors
///
/// Returns error if the file is missing, cannot be read or is not valid TOML
pub fn load_config_file_from(path: &Path) -> Result<VoiceConfigFile> {
    if !path.is_file() {
        return Err(Error::Config(format!("config file not found: {}", path.display())));
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse TOML config content
///
/// # Errors
///
/// Returns error if the content is not valid TOML
pub fn parse_config(content: &str) -> Result<VoiceConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/omni/beacon/voice.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("beacon")
            .join("voice.toml")
    })
}
