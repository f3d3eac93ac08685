//! Speech text preparation and voice selection
//!
//! Everything here is pure: sanitizing text for synthesis, mapping tones to
//! prosody, and picking or grouping voices.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Longest sanitized text that will be synthesized, in characters
pub const MAX_SPOKEN_CHARS: usize = 500;

/// Markup-style tags (`<b>`, `</speak>`, `<br/>`)
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("valid regex"));

/// Emoji and pictographs, plus the joiners and modifiers that glue them together
static EMOJI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Extended_Pictographic}\x{FE0E}\x{FE0F}\x{200D}\x{20E3}\x{1F1E6}-\x{1F1FF}\x{1F3FB}-\x{1F3FF}]")
        .expect("valid regex")
});

/// Runs of whitespace
static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Prepare text for synthesis
///
/// Strips markup tags and emoji, collapses whitespace and trims.
#[must_use]
pub fn sanitize_text(text: &str) -> String {
    let without_tags = TAG_REGEX.replace_all(text, "");
    let without_emoji = EMOJI_REGEX.replace_all(&without_tags, "");
    WHITESPACE_REGEX
        .replace_all(&without_emoji, " ")
        .trim()
        .to_string()
}

/// Whether sanitized text is short enough to speak
#[must_use]
pub fn is_speakable(sanitized: &str) -> bool {
    sanitized.chars().count() <= MAX_SPOKEN_CHARS
}

/// Speaking tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Plain delivery
    #[default]
    Neutral,
    /// Warm and slightly brighter
    Friendly,
    /// Slower and lower
    Calm,
    /// Fast and high
    Excited,
    /// Measured and low
    Serious,
    /// Bouncy
    Playful,
}

impl Tone {
    /// Every tone, in table order
    pub const ALL: [Self; 6] = [
        Self::Neutral,
        Self::Friendly,
        Self::Calm,
        Self::Excited,
        Self::Serious,
        Self::Playful,
    ];

    /// Parse a tone identifier, falling back to neutral
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_lowercase().as_str() {
            "friendly" => Self::Friendly,
            "calm" => Self::Calm,
            "excited" => Self::Excited,
            "serious" => Self::Serious,
            "playful" => Self::Playful,
            "neutral" | "" => Self::Neutral,
            other => {
                tracing::debug!(tone = other, "unknown tone, using neutral");
                Self::Neutral
            }
        }
    }

    /// Identifier used in settings
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Friendly => "friendly",
            Self::Calm => "calm",
            Self::Excited => "excited",
            Self::Serious => "serious",
            Self::Playful => "playful",
        }
    }

    /// `(pitch, rate)` for this tone
    #[must_use]
    pub const fn prosody(self) -> (f32, f32) {
        match self {
            Self::Neutral => (1.0, 1.0),
            Self::Friendly => (1.1, 1.05),
            Self::Calm => (0.95, 0.9),
            Self::Excited => (1.2, 1.15),
            Self::Serious => (0.9, 0.95),
            Self::Playful => (1.25, 1.1),
        }
    }
}

/// A voice offered by the synthesis engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    /// Engine identifier
    pub id: String,
    /// Display name (used for labelling)
    pub name: String,
    /// BCP 47 language tag
    pub lang: String,
}

impl Voice {
    /// Create a voice description
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Parameters handed to the synthesis engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceParams {
    /// Speaking rate
    pub rate: f32,
    /// Pitch
    pub pitch: f32,
    /// Volume (0.0 to 1.0)
    pub volume: f32,
    /// Tone the rate and pitch were derived from
    pub tone: Tone,
    /// Selected voice index; `None` means the engine default
    pub voice_index: Option<usize>,
}

impl VoiceParams {
    /// Derive parameters from settings and the available voices
    ///
    /// Tone prosody is scaled by the user's rate and pitch multipliers, then
    /// clamped to the ranges engines accept.
    #[must_use]
    pub fn resolve(voice: &crate::config::VoiceSettings, voices: &[Voice]) -> Self {
        let tone = Tone::from_id(&voice.tone);
        let (pitch, rate) = tone.prosody();

        Self {
            rate: (rate * voice.rate).clamp(0.1, 10.0),
            pitch: (pitch * voice.pitch).clamp(0.0, 2.0),
            volume: voice.volume.clamp(0.0, 1.0),
            tone,
            voice_index: select_voice(voices, voice.voice_index),
        }
    }
}

/// Validate a voice index against the enumerated voices
///
/// Out-of-range indices fall back to the engine default (`None`).
#[must_use]
pub fn select_voice(voices: &[Voice], index: Option<usize>) -> Option<usize> {
    let index = index?;
    if index < voices.len() {
        Some(index)
    } else {
        tracing::debug!(index, available = voices.len(), "voice index out of range, using default");
        None
    }
}

/// Voice paired with its index in the engine's list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedVoice {
    /// Position in the original list
    pub index: usize,
    /// The voice
    pub voice: Voice,
}

/// Voices partitioned by apparent gender of the display name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoiceGroups {
    /// Names containing FEMALE, WOMAN or GIRL
    pub female: Vec<IndexedVoice>,
    /// Names containing MALE, MAN or BOY
    pub male: Vec<IndexedVoice>,
    /// Everything else
    pub neutral: Vec<IndexedVoice>,
}

/// Partition voices into female, male and neutral buckets
///
/// Matching is case-insensitive on the display name; female keywords are
/// checked first since "female" and "woman" contain the male keywords.
/// Order within each bucket follows the input order.
#[must_use]
pub fn group_voices_by_label(voices: &[Voice]) -> VoiceGroups {
    const FEMALE: [&str; 3] = ["FEMALE", "WOMAN", "GIRL"];
    const MALE: [&str; 3] = ["MALE", "MAN", "BOY"];

    let mut groups = VoiceGroups::default();
    for (index, voice) in voices.iter().enumerate() {
        let name = voice.name.to_uppercase();
        let entry = IndexedVoice {
            index,
            voice: voice.clone(),
        };

        if FEMALE.iter().any(|k| name.contains(k)) {
            groups.female.push(entry);
        } else if MALE.iter().any(|k| name.contains(k)) {
            groups.male.push(entry);
        } else {
            groups.neutral.push(entry);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoiceSettings;

    #[test]
    fn test_sanitize_strips_tags_and_emoji() {
        assert_eq!(
            sanitize_text("<p>Hello <b>there</b>! 👋😀</p>"),
            "Hello there!"
        );
        assert_eq!(sanitize_text("<b>un</b>believable"), "unbelievable");
        assert_eq!(sanitize_text("one<br/>two"), "onetwo");
        assert_eq!(sanitize_text("<p>first</p> <p>second</p>"), "first second");
        assert_eq!(sanitize_text("Thumbs 👍🏽 up ❤️"), "Thumbs up");
        assert_eq!(sanitize_text("Family 👨‍👩‍👧 time"), "Family time");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_text("  one\n\n two\t three  "), "one two three");
    }

    #[test]
    fn test_sanitize_keeps_plain_text_and_digits() {
        assert_eq!(sanitize_text("Preheat to 350 # degrees"), "Preheat to 350 # degrees");
        assert_eq!(sanitize_text("a < b and c > d"), "a < b and c > d");
    }

    #[test]
    fn test_length_ceiling() {
        assert!(is_speakable(&"a".repeat(MAX_SPOKEN_CHARS)));
        assert!(!is_speakable(&"a".repeat(MAX_SPOKEN_CHARS + 1)));
        // Counted in characters, not bytes
        assert!(is_speakable(&"é".repeat(MAX_SPOKEN_CHARS)));
    }

    #[test]
    fn test_tone_lookup() {
        assert_eq!(Tone::from_id("Calm"), Tone::Calm);
        assert_eq!(Tone::from_id("grumpy"), Tone::Neutral);
        assert_eq!(Tone::Neutral.prosody(), (1.0, 1.0));
        for tone in Tone::ALL {
            assert_eq!(Tone::from_id(tone.id()), tone);
        }
    }

    #[test]
    fn test_voice_params_from_settings() {
        let voices = vec![Voice::new("a", "Alice", "en-US")];
        let settings = VoiceSettings {
            voice_index: Some(3),
            tone: "excited".to_string(),
            rate: 2.0,
            pitch: 1.0,
            volume: 1.5,
        };

        let params = VoiceParams::resolve(&settings, &voices);
        assert_eq!(params.tone, Tone::Excited);
        assert!((params.rate - 2.3).abs() < 1e-5);
        assert!((params.pitch - 1.2).abs() < 1e-5);
        assert!((params.volume - 1.0).abs() < f32::EPSILON);
        assert_eq!(params.voice_index, None);
    }

    #[test]
    fn test_select_voice() {
        let voices = vec![Voice::new("a", "A", "en"), Voice::new("b", "B", "en")];
        assert_eq!(select_voice(&voices, Some(1)), Some(1));
        assert_eq!(select_voice(&voices, Some(2)), None);
        assert_eq!(select_voice(&voices, None), None);
        assert_eq!(select_voice(&[], Some(0)), None);
    }

    #[test]
    fn test_group_voices_by_label() {
        let voices = vec![
            Voice::new("1", "Google UK English Female", "en-GB"),
            Voice::new("2", "Google UK English Male", "en-GB"),
            Voice::new("3", "Alex", "en-US"),
            Voice::new("4", "Microsoft Woman Voice", "en-US"),
            Voice::new("5", "little boy", "en-US"),
            Voice::new("6", "Cheerful girl", "en-US"),
            // Plain substring match: "saMANtha" lands with the male voices
            Voice::new("7", "Samantha", "en-US"),
        ];

        let groups = group_voices_by_label(&voices);
        let ids = |bucket: &[IndexedVoice]| -> Vec<usize> { bucket.iter().map(|v| v.index).collect() };

        assert_eq!(ids(&groups.female), vec![0, 3, 5]);
        assert_eq!(ids(&groups.male), vec![1, 4, 6]);
        assert_eq!(ids(&groups.neutral), vec![2]);
    }
}
