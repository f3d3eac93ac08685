//! Beacon Voice - turn-taking and speech output for voice assistants
//!
//! This library sits between a speech recognizer, a conversational backend
//! and a speech synthesizer:
//! - Wake word listening with an optional timeout
//! - Multi-sentence buffering with a go-word, a pause timer and an end phrase
//! - Persistent listening that loops back to the wake word after each turn
//! - Sanitized, single-flight speech output with tones and voice selection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Host                            │
//! │   Recognizer  │  Backend  │  Synthesizer  │  UI     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ commands / status
//! ┌────────────────────▼────────────────────────────────┐
//! │                 VoiceController                      │
//! │   ConversationSession  │  SpeechPipeline            │
//! │   WakeWordDetector     │  Timers                    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod voice;

pub use config::{Settings, VoiceSettings};
pub use controller::{VoiceCommand, VoiceController, VoiceHandle, VoiceStatus};
pub use error::{Error, Result};
