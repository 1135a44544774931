use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dialoguer::Select;
use tracing_subscriber::EnvFilter;

use voice_assistant::chat::{ChatError, ChatModel, ChatRequest, OpenAiChat};
use voice_assistant::console::ConsoleView;
use voice_assistant::voice::{
    AudioCapture, AudioInput, AudioOutput, AudioPlayback, PLAYBACK_SAMPLE_RATE, SpeechSynthesis,
    TextToSpeech, calculate_energy,
};
use voice_assistant::{Assistant, Config, Credential, load_credential};

/// Voice Assistant - talk to a chat model through your microphone
#[derive(Parser)]
#[command(name = "voice-assistant", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Check that the API key authenticates against the chat endpoint
    CheckKey,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,voice_assistant=info",
        1 => "info,voice_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => tracing::debug!("no .env file"),
        Err(e) => tracing::warn!(error = %e, "failed to read .env"),
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::CheckKey => check_key().await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let mut view = ConsoleView::stdout();
    view.banner();

    let mut assistant = Assistant::from_config(&config).map_err(|e| {
        report_missing_credential(&config);
        e
    })?;

    view.instructions();
    tracing::info!(model = %config.llm.model, "voice assistant ready");

    while prompt_trigger().await? {
        assistant.run_turn(&mut view).await;
    }

    tracing::info!(turns = assistant.log().len(), "session ended");
    Ok(())
}

/// Resolve the API key or report why it is missing
fn require_credential(config: &Config) -> anyhow::Result<Credential> {
    load_credential(&config.credentials).map_err(|e| {
        report_missing_credential(config);
        e.into()
    })
}

fn report_missing_credential(config: &Config) {
    println!(
        "❌ OpenAI API key not found. Please set the {} environment variable.",
        config.credentials.env_var
    );
}

/// Ask whether to run another turn; `false` on quit or Esc
async fn prompt_trigger() -> anyhow::Result<bool> {
    let choice = tokio::task::spawn_blocking(|| {
        Select::new()
            .with_prompt("Ready")
            .items(&["🎤 Start Speaking", "Quit"])
            .default(0)
            .interact_opt()
    })
    .await??;

    Ok(choice == Some(0))
}

/// Send a minimal chat request to verify the key
async fn check_key() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    println!("Current working directory: {}", cwd.display());
    println!("Looking for .env in: {}", cwd.display());

    let config = Config::load()?;
    let credential = match load_credential(&config.credentials) {
        Ok(credential) => credential,
        Err(e) => {
            println!("❌ No API key found in environment!");
            return Err(e.into());
        }
    };
    println!("Found API key starting with: {}", credential.redacted());

    let chat = OpenAiChat::new(config.llm.base_url.as_str());
    match chat
        .complete(&ChatRequest::key_check(&config.llm.model), &credential)
        .await
    {
        Ok(content) => {
            println!("✅ API test successful!");
            println!("Response: {content}");
            Ok(())
        }
        Err(e) => {
            match &e {
                ChatError::Auth(_) => println!("❌ Authentication Error: Your API key is invalid"),
                ChatError::RateLimit(_) => {
                    println!("❌ Rate Limit Error: You've hit your rate limit");
                }
                ChatError::Service(m) => println!("❌ Other Error: {m}"),
            }
            Err(e.into())
        }
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new();
    capture.start()?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If the meter moved, your microphone is working.");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in and selected as the default input?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Play a two second 440 Hz tone
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let rate = PLAYBACK_SAMPLE_RATE as f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (rate * 2.0) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / rate).sin() * 0.3)
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());
    playback.play_samples(samples)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working.");
    println!("If not, check the default output device and its volume.");

    Ok(())
}

/// Synthesize `text` with the configured backend and play it
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let credential = require_credential(&config)?;

    let synthesis = SpeechSynthesis::new(Box::new(TextToSpeech::new(
        config.voice.tts.clone(),
        config.llm.base_url.as_str(),
    )));

    println!("Synthesizing speech...");
    let artifact = synthesis.synthesize(text, &credential).await?;
    let (path, mp3_data) = artifact.consume()?;
    println!("Got {} bytes of audio data ({})", mp3_data.len(), path.display());

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play_mp3(&mp3_data)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
