use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use astromech::config::Overrides;
use astromech::voice::{
    AudioCapture, AudioPlayback, CpalAudioDevice, PhraseWakeDetector, SpeechToText, Transcriber,
    WakeDetector, calculate_rms,
};
use astromech::{
    Config, CycleSettings, EmotionCategory, EmotionClassifier, Orchestrator, SoundLibrary, llm,
};

/// Astromech - a droid that answers voice commands with beeps and whistles
#[derive(Parser)]
#[command(name = "astromech", version, about)]
struct Cli {
    /// Config file (default: ~/.config/astromech/config.toml)
    #[arg(short, long, env = "ASTROMECH_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Wake phrase (repeatable)
    #[arg(short, long = "wake-phrase")]
    wake_phrases: Vec<String>,

    /// Wake word model (.rpw), replaces phrase detection
    #[arg(long)]
    wake_model: Option<PathBuf>,

    /// Seconds to record after the wake word
    #[arg(short, long)]
    record_secs: Option<f64>,

    /// Directory with one sub-directory of clips per emotion
    #[arg(short, long)]
    sounds: Option<PathBuf>,

    /// Language model used for classification
    #[arg(long)]
    llm_model: Option<String>,

    /// Transcription model
    #[arg(long)]
    stt_model: Option<String>,

    /// Input device name
    #[arg(long)]
    input_device: Option<String>,

    /// Output device name
    #[arg(long)]
    output_device: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    fn overrides(&mut self) -> Overrides {
        Overrides {
            wake_phrases: std::mem::take(&mut self.wake_phrases),
            wake_model: self.wake_model.take(),
            record_secs: self.record_secs,
            sounds_dir: self.sounds.take(),
            llm_model: self.llm_model.take(),
            stt_model: self.stt_model.take(),
            input_device: self.input_device.take(),
            output_device: self.output_device.take(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Classify typed commands (interactive unless --text is given)
    Classify {
        /// Classify this text once and exit
        #[arg(short, long)]
        text: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Play a random clip for a category
    TestSpeaker {
        /// Emotion category
        #[arg(short, long, default_value = "happy")]
        category: EmotionCategory,
    },
    /// List the sound library
    Sounds,
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,astromech=info",
        1 => "info,astromech=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let result = load_config(&mut cli);
    let result = match result {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &mut Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply(cli.overrides())?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

#[allow(clippy::future_not_send)]
async fn run(command: Option<Command>, config: Config) -> anyhow::Result<()> {
    if let Some(cmd) = command {
        return match cmd {
            Command::Classify { text } => classify(&config, text).await,
            Command::TestMic { duration } => test_mic(&config, duration).await,
            Command::TestSpeaker { category } => test_speaker(&config, category),
            Command::Sounds => list_sounds(&config),
        };
    }

    config.validate()?;

    // Asset problems are fatal before any audio device is opened
    let sounds = SoundLibrary::load(&config.sounds.dir)?.with_avoid_repeat(config.sounds.avoid_repeat);

    let transcriber: Arc<dyn Transcriber> = Arc::new(SpeechToText::from_config(&config.stt));
    let classifier = EmotionClassifier::new(llm::from_config(&config.llm), config.llm.timeout);
    let wake = wake_detector(&config, Arc::clone(&transcriber))?;
    let device = CpalAudioDevice::new(&config.audio)?;

    let mut orchestrator = Orchestrator::new(
        Box::new(device),
        wake,
        transcriber,
        classifier,
        sounds,
        CycleSettings::from(&config),
    );

    // Set up shutdown signal
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for ctrl-c, running until killed");
            }
        }
    });

    match (&config.wake.model_path, config.wake.phrases.first()) {
        (Some(model), _) => tracing::info!("astromech ready - wake model {}", model.display()),
        (None, Some(phrase)) => tracing::info!("astromech ready - say \"{phrase}\""),
        (None, None) => {}
    }

    orchestrator.run(&mut shutdown_rx).await;

    tracing::info!("astromech stopped");
    Ok(())
}

fn wake_detector(
    config: &Config,
    transcriber: Arc<dyn Transcriber>,
) -> anyhow::Result<Box<dyn WakeDetector>> {
    match &config.wake.model_path {
        #[cfg(feature = "wake-model")]
        Some(path) => Ok(Box::new(astromech::voice::ModelWakeDetector::new(
            path,
            config.wake.threshold,
        )?)),
        #[cfg(not(feature = "wake-model"))]
        Some(path) => anyhow::bail!(
            "wake model {} requires building with --features wake-model",
            path.display()
        ),
        None => Ok(Box::new(PhraseWakeDetector::new(
            config.wake.phrases.clone(),
            transcriber,
            config.stt.timeout,
        ))),
    }
}

/// Classify typed commands
async fn classify(config: &Config, text: Option<String>) -> anyhow::Result<()> {
    let classifier = EmotionClassifier::new(llm::from_config(&config.llm), config.llm.timeout);

    if let Some(text) = text {
        let result = classifier.classify(&text).await;
        println!("Classification: {}", result.category);
        return Ok(());
    }

    println!("Type a command to classify ('quit' to exit)\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let result = classifier.classify(line).await;
        match result.fallback {
            Some(reason) => println!("Classification: {} ({reason})", result.category),
            None => println!("Classification: {}", result.category),
        }
    }

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new(config.audio.input_device.as_deref())?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

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
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Play a random clip for a category
fn test_speaker(config: &Config, category: EmotionCategory) -> anyhow::Result<()> {
    let sounds = SoundLibrary::load(&config.sounds.dir)?;
    let playback = AudioPlayback::new(config.audio.output_device.as_deref())?;

    let clip = sounds.pick(category);
    println!(
        "Playing {clip} ({:.1}s at {} Hz, output {} Hz)...",
        clip.duration().as_secs_f32(),
        clip.sample_rate(),
        playback.sample_rate()
    );

    playback.play(clip.samples(), clip.sample_rate())?;

    println!("\n---");
    println!("If you heard the droid, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl list sinks short");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// List the sound library
fn list_sounds(config: &Config) -> anyhow::Result<()> {
    let sounds = SoundLibrary::load(&config.sounds.dir)?;

    println!("Sound library: {}", config.sounds.dir.display());
    for (category, clips) in sounds.iter() {
        println!("\n{category} ({} clips)", clips.len());
        for clip in clips {
            println!("  {:<40} {:>5.1}s", clip.id(), clip.duration().as_secs_f32());
        }
    }

    Ok(())
}
