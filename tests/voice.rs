//! Voice turn-taking integration tests
//!
//! Exercises the session, wake word and speech helpers through the public API
//! without a running controller

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use beacon_voice::Settings;
use beacon_voice::voice::{
    ConversationSession, Decision, DetectorState, SessionMode, TimerFired, TimerOutcome,
    TimerSender, Tone, Voice, VoiceParams, WakeWordDetector, group_voices_by_label, is_speakable,
    phrase, sanitize_text,
};

mod common;

struct Session {
    session: ConversationSession,
    timers: mpsc::UnboundedReceiver<TimerFired>,
    sent: mpsc::UnboundedReceiver<String>,
}

fn session() -> Session {
    let (timer_tx, timers) = mpsc::unbounded_channel();
    let (sink, sent) = mpsc::unbounded_channel::<String>();
    Session {
        session: ConversationSession::new(Arc::new(sink), TimerSender::new(timer_tx)),
        timers,
        sent,
    }
}

#[tokio::test]
async fn test_wake_word_case_insensitive() {
    let (tx, _rx) = mpsc::unbounded_channel::<TimerFired>();
    let mut detector = WakeWordDetector::new(TimerSender::new(tx));
    let settings = Settings::default();

    detector.start_passive_listening(&settings);
    let result = detector.process_candidate("HEY BOT what's up", &settings);

    assert!(result.detected);
    assert_eq!(result.cleaned_transcript, "what's up");
    assert_eq!(detector.state(), DetectorState::Activated);
}

#[tokio::test]
async fn test_wake_word_inside_sentence() {
    let (tx, _rx) = mpsc::unbounded_channel::<TimerFired>();
    let mut detector = WakeWordDetector::new(TimerSender::new(tx));
    let settings = Settings {
        wake_phrase: "computer".to_string(),
        ..Settings::default()
    };

    detector.start_passive_listening(&settings);
    let result = detector.process_candidate("ok Computer lights on", &settings);

    assert!(result.detected);
    assert_eq!(result.cleaned_transcript, "ok  lights on");
}

#[tokio::test]
async fn test_lights_scenario_with_go_word() {
    let mut s = session();
    let settings = Settings::default();
    s.session.start(&settings);

    assert_eq!(s.session.process_transcript("turn off the lights ", &settings), Decision::Hold);
    assert!(s.session.pause_pending());

    let decision = s.session.process_transcript("go", &settings);
    assert_eq!(decision, Decision::Dispatch("turn off the lights ".to_string()));
    assert_eq!(s.session.mode(), SessionMode::Idle);
    assert!(!s.session.pause_pending());
}

#[tokio::test]
async fn test_multi_word_go_word() {
    let mut s = session();
    let settings = Settings {
        go_word: "send it".to_string(),
        ..Settings::default()
    };
    s.session.start(&settings);

    s.session.process_transcript("order more coffee", &settings);
    let decision = s.session.process_transcript("please Send It now", &settings);

    assert_eq!(decision.message(), Some("order more coffee please now "));
}

#[tokio::test(start_paused = true)]
async fn test_fragments_resetting_pause() {
    let mut s = session();
    let settings = Settings {
        pause_length_ms: 1000,
        ..Settings::default()
    };
    s.session.start(&settings);

    for fragment in ["one", "two", "three"] {
        s.session.process_transcript(fragment, &settings);
        tokio::time::sleep(Duration::from_millis(900)).await;
    }
    assert!(s.timers.try_recv().is_err());

    let fired = s.timers.recv().await.unwrap();
    assert_eq!(
        s.session.on_timer(fired, &settings),
        TimerOutcome::Dispatched("one two three ".to_string())
    );
    assert_eq!(s.sent.recv().await.unwrap(), "one two three ");
}

#[tokio::test]
async fn test_end_phrase_with_empty_buffer_sends_nothing() {
    let mut s = session();
    let settings = Settings::default();
    s.session.start(&settings);

    assert_eq!(s.session.process_transcript("end conversation", &settings), Decision::Closed);
    assert!(s.sent.try_recv().is_err());
    assert_eq!(s.session.mode(), SessionMode::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_wake_timeout_then_no_detection() {
    let mut s = session();
    let settings = Settings {
        wake_timeout_seconds: 3,
        ..Settings::default()
    };

    s.session.start_passive_listening(&settings);
    let fired = s.timers.recv().await.unwrap();
    assert_eq!(s.session.on_timer(fired, &settings), TimerOutcome::WakeTimedOut);

    let late = s.session.check_wake_word("hey bot", &settings);
    assert!(!late.detected);
}

#[test]
fn test_phrase_helpers() {
    assert_eq!(phrase::normalize("  Hey BOT "), "hey bot");
    assert!(phrase::contains_phrase("well HEY bot there", "hey bot"));
    assert!(phrase::contains_go_word("ready, go", "go"));
    assert!(!phrase::contains_go_word("gopher", "go"));
}

#[test]
fn test_sanitize_for_speech() {
    assert_eq!(sanitize_text("<p>Hello   <em>world</em></p> 👋🏽"), "Hello world");
    assert_eq!(sanitize_text("🎉🎉"), "");
    assert_eq!(sanitize_text("a < b and c > d"), "a < b and c > d");

    let exact = "x".repeat(500);
    assert!(is_speakable(&sanitize_text(&exact)));
    assert!(!is_speakable(&format!("{exact}y")));
}

#[test]
fn test_tone_and_voice_params() {
    let mut settings = Settings::default();
    settings.voice.tone = "excited".to_string();
    settings.voice.rate = 2.0;

    let voices = vec![Voice::new("a", "Alex", "en-US")];
    settings.voice.voice_index = Some(0);
    let params = VoiceParams::resolve(&settings.voice, &voices);

    assert_eq!(params.tone, Tone::Excited);
    assert!((params.rate - 2.3).abs() < 1e-6);
    assert!((params.pitch - 1.2).abs() < 1e-6);
    assert_eq!(params.voice_index, Some(0));

    settings.voice.tone = "grumpy".to_string();
    assert_eq!(VoiceParams::resolve(&settings.voice, &voices).tone, Tone::Neutral);
}

#[test]
fn test_voice_grouping() {
    let voices = vec![
        Voice::new("1", "Google UK English Female", "en-GB"),
        Voice::new("2", "Google UK English Male", "en-GB"),
        Voice::new("3", "Daniel", "en-GB"),
    ];
    let groups = group_voices_by_label(&voices);

    assert_eq!(groups.female.len(), 1);
    assert_eq!(groups.male[0].index, 1);
    assert_eq!(groups.neutral[0].voice.name, "Daniel");
}
