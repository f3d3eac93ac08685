//! Voice turn-taking and speech output
//!
//! Handles wake word listening, conversation turn-taking and playback.
//! Recognition and synthesis engines live outside this crate.

pub mod phrase;
mod playback;
mod session;
mod speech;
mod timer;
mod wake_word;

pub use playback::{
    NoIndicator, PlaybackEvent, PlaybackIndicator, PlaybackPhase, PlaybackSignal,
    PlaybackSignals, PlaybackState, SignalSender, SpeakOutcome, SpeechPipeline, SpeechRequest,
    SpeechSynthesizer,
};
pub use session::{ConversationSession, Decision, DispatchSink, SessionMode, TimerOutcome};
pub use speech::{
    IndexedVoice, MAX_SPOKEN_CHARS, Tone, Voice, VoiceGroups, VoiceParams, group_voices_by_label,
    is_speakable, sanitize_text, select_voice,
};
pub use timer::{TimerFired, TimerKind, TimerSender, TimerSlot};
pub use wake_word::{DetectorState, WakeMatch, WakeWordDetector};
