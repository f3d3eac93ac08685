use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use beacon_voice::voice::{
    self, PlaybackIndicator, PlaybackSignals, SpeechRequest, SpeechSynthesizer, Voice,
};
use beacon_voice::{Settings, VoiceController, VoiceHandle};

/// Beacon Voice - turn-taking and speech output for voice assistants
#[derive(Parser)]
#[command(name = "beacon-voice", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/omni/beacon/voice.toml)
    #[arg(short, long, env = "BEACON_VOICE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Drive a conversation from transcripts on stdin
    Run {
        /// Answer every dispatched message with a canned reply
        #[arg(long)]
        echo: bool,
    },
    /// Show how text would be cleaned up before speaking
    Sanitize {
        /// Text to sanitize
        text: String,
    },
    /// List the demo voice catalogue grouped by label
    Voices,
    /// Print the effective settings as TOML
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,beacon_voice=info",
        1 => "info,beacon_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so stdout carries only conversation output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };

    match cli.command.unwrap_or(Command::Run { echo: false }) {
        Command::Run { echo } => run_conversation(settings, echo).await,
        Command::Sanitize { text } => {
            cmd_sanitize(&text);
            Ok(())
        }
        Command::Voices => cmd_voices(),
        Command::Config => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}

/// Read transcripts from stdin and print what would reach the backend
///
/// Lines starting with `/` are controller commands; everything else is a
/// finalized transcript.
async fn run_conversation(settings: Settings, echo: bool) -> anyhow::Result<()> {
    let (sink, mut dispatched) = mpsc::unbounded_channel::<String>();
    let (handle, task) = VoiceController::spawn(
        settings,
        Arc::new(sink),
        Arc::new(ConsoleSynthesizer::default()),
        Arc::new(ConsoleIndicator),
    );

    let replies = handle.clone();
    let printer = tokio::spawn(async move {
        while let Some(message) = dispatched.recv().await {
            println!("> {}", message.trim_end());
            if echo {
                let reply = format!("You said: {}", message.trim());
                if let Err(e) = replies.respond(reply) {
                    tracing::warn!(error = %e, "could not deliver reply");
                    break;
                }
            }
        }
    });

    println!("Type transcripts, or /start /end /say <text> /stop /status /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !handle_line(&handle, line.trim())? {
            break;
        }
    }

    handle.shutdown().await?;
    task.await?;
    printer.abort();
    Ok(())
}

/// Apply one input line; false when the user asked to quit
fn handle_line(handle: &VoiceHandle, line: &str) -> anyhow::Result<bool> {
    let Some(command) = line.strip_prefix('/') else {
        if !line.is_empty() {
            handle.transcript(line)?;
        }
        return Ok(true);
    };

    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    match name {
        "start" => handle.start()?,
        "end" => handle.end()?,
        "say" => handle.speak(rest)?,
        "stop" => handle.stop_speaking()?,
        "status" => println!("{}", serde_json::to_string_pretty(&handle.status())?),
        "quit" | "exit" => return Ok(false),
        other => println!("unknown command: /{other}"),
    }
    Ok(true)
}

fn cmd_sanitize(text: &str) {
    let sanitized = voice::sanitize_text(text);
    let chars = sanitized.chars().count();
    println!("{sanitized}");
    println!("---");
    println!(
        "{chars} chars, {}",
        if voice::is_speakable(&sanitized) {
            "speakable"
        } else {
            "would be skipped"
        }
    );
}

fn cmd_voices() -> anyhow::Result<()> {
    let groups = voice::group_voices_by_label(&demo_voices());
    println!("{}", serde_json::to_string_pretty(&groups)?);
    println!("---");
    for tone in voice::Tone::ALL {
        let (pitch, rate) = tone.prosody();
        println!("{:<10} pitch {pitch:.2}  rate {rate:.2}", tone.id());
    }
    Ok(())
}

fn demo_voices() -> Vec<Voice> {
    vec![
        Voice::new("en-us-1", "English Female", "en-US"),
        Voice::new("en-us-2", "English Male", "en-US"),
        Voice::new("en-gb-1", "British Woman", "en-GB"),
        Voice::new("en-gb-2", "British Man", "en-GB"),
        Voice::new("en-au-1", "Aussie Boy", "en-AU"),
        Voice::new("en-us-3", "Alex", "en-US"),
    ]
}

/// Synthesizer that prints instead of producing audio
///
/// Playback takes a little time per word so interruptions can be tried out.
#[derive(Default)]
struct ConsoleSynthesizer {
    current: Mutex<Option<JoinHandle<()>>>,
}

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        demo_voices()
    }

    fn synthesize(&self, request: &SpeechRequest, signals: PlaybackSignals) {
        let text = request.sanitized_text.clone();
        let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
        let task = tokio::spawn(async move {
            signals.started();
            println!("(speaking) {text}");
            tokio::time::sleep(Duration::from_millis(250).saturating_mul(words)).await;
            signals.ended();
        });

        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(task) {
                previous.abort();
            }
        }
    }

    fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(task) = current.take() {
                task.abort();
            }
        }
    }
}

struct ConsoleIndicator;

impl PlaybackIndicator for ConsoleIndicator {
    fn speaking_started(&self, request: &SpeechRequest) {
        tracing::debug!(request_id = %request.id, "speaking indicator on");
    }

    fn speaking_stopped(&self) {
        tracing::debug!("speaking indicator off");
    }
}
