use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use techbot::daemon::{self, Daemon};
use techbot::voice::{AudioCapture, AudioPlayback, ConsoleListener, SAMPLE_RATE, TextToSpeech, rms};
use techbot::{Config, Router};

/// techbot - voice assistant for Linux commands and development
#[derive(Parser)]
#[command(name = "techbot", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (typed input, printed output)
    #[arg(long, env = "TECHBOT_DISABLE_VOICE")]
    disable_voice: bool,

    /// Read utterances from stdin but keep spoken responses
    #[arg(long)]
    text: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Route one utterance and print the response
    Ask {
        /// The utterance, as it would be spoken
        #[arg(required = true, num_args = 1..)]
        utterance: Vec<String>,
    },
    /// Show how an utterance would be routed without running it
    Route {
        /// The utterance, as it would be spoken
        #[arg(required = true, num_args = 1..)]
        utterance: Vec<String>,
    },
    /// List cached responses, newest first
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
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
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,techbot=info",
        1 => "info,techbot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

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
            Command::Ask { utterance } => ask(&utterance.join(" ")).await,
            Command::Route { utterance } => route(&utterance.join(" ")),
            Command::History { limit } => history(limit),
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    tracing::info!(
        disable_voice = cli.disable_voice,
        text = cli.text,
        "starting techbot"
    );

    let config = Config::load_with_options(cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    let daemon = Daemon::new(&config, cli.text)?;
    daemon.run().await?;

    Ok(())
}

/// Route a single utterance and print the response
#[allow(clippy::future_not_send)]
async fn ask(utterance: &str) -> anyhow::Result<()> {
    let config = Config::load_with_options(true)?;
    let mut router: Router = daemon::build_router(&config, Box::new(ConsoleListener::new()))?;

    let response = router.handle(utterance).await?;
    println!("{response}");
    Ok(())
}

/// Print the routing decision for an utterance
fn route(utterance: &str) -> anyhow::Result<()> {
    let config = Config::load_with_options(true)?;
    let cache = daemon::open_cache(&config)?;

    let decision = techbot::router::classify_with(&cache, utterance)?;
    println!("kind:    {}", decision.kind);
    println!("payload: {}", decision.payload);
    Ok(())
}

/// List cached entries
fn history(limit: usize) -> anyhow::Result<()> {
    let config = Config::load_with_options(true)?;
    let cache = daemon::open_cache(&config)?;

    let total = cache.len()?;
    for entry in cache.recent(limit)? {
        println!(
            "#{} [{}] {}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.query
        );
        for line in entry.response.lines() {
            println!("    {line}");
        }
    }
    println!("---");
    println!("{total} cached responses in {}", config.db_path.display());
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);
    playback.play(&samples, sample_rate)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::new(
        config.openai_key()?.to_string(),
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
        config.llm.base_url.clone(),
    )?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let playback = AudioPlayback::new()?;
    playback.play_mp3(&mp3_data)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
