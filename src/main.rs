use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recital::player::HandleTracker;
use recital::text::{self, prepare_for_speech};
use recital::voice::{
    AudioSink, CommandSpeaker, CpalSink, DisabledSpeaker, LocalSynthesizer, RemoteSynthesizer,
};
use recital::{Config, Document, PlaybackContext, PlaybackCoordinator, SectionId, VoiceContext};

/// Recital - Read long markdown documents aloud, section by section
#[derive(Parser)]
#[command(name = "recital", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/recital/config.toml)
    #[arg(short, long, env = "RECITAL_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the sections of a document
    Sections {
        /// Markdown or plain-text file
        file: PathBuf,
    },
    /// Show how a document or one section would be chunked
    Chunks {
        file: PathBuf,
        /// Section header (case-insensitive substring)
        #[arg(short, long)]
        section: Option<String>,
        /// Chunk size limit in bytes
        #[arg(long)]
        max_bytes: Option<usize>,
    },
    /// Print the text exactly as it would be spoken
    Normalize { file: PathBuf },
    /// Check that the remote TTS endpoint is reachable
    Check,
    /// Read a document aloud
    Read {
        file: PathBuf,
        /// Only read the section whose header matches
        #[arg(short, long)]
        section: Option<String>,
        /// Voice context: debate, analysis, general, judge
        #[arg(long, default_value = "general")]
        context: VoiceContext,
        /// Document title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info",
        1 => "info,recital=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Sections { file } => cmd_sections(&file),
        Command::Chunks {
            file,
            section,
            max_bytes,
        } => cmd_chunks(
            &file,
            section.as_deref(),
            max_bytes.unwrap_or(config.playback.max_chunk_bytes),
        ),
        Command::Normalize { file } => cmd_normalize(&file),
        Command::Check => cmd_check(&config).await,
        Command::Read {
            file,
            section,
            context,
            title,
        } => cmd_read(&config, &file, section.as_deref(), context, title).await,
    }
}

fn cmd_sections(file: &Path) -> anyhow::Result<()> {
    let document = Document::from_path(file, None)?;
    for section in document.sections() {
        let words = section.raw_text.split_whitespace().count();
        println!("{:>3}. {} ({words} words)", section.order_index + 1, section.header);
    }
    Ok(())
}

fn cmd_chunks(file: &Path, header: Option<&str>, max_bytes: usize) -> anyhow::Result<()> {
    let document = Document::from_path(file, None)?;
    let sections = document.sections();

    let selected: Vec<_> = match header {
        Some(query) => {
            let section = text::find_by_header(&sections, query)
                .ok_or_else(|| anyhow::anyhow!("no section matching \"{query}\""))?;
            vec![section.clone()]
        }
        None => sections,
    };

    for section in selected {
        let chunks = text::plan(&prepare_for_speech(&section.spoken_text()), max_bytes);
        println!("## {} ({} chunks)", section.header, chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            println!("--- chunk {} ({} bytes)", i + 1, chunk.byte_len());
            println!("{}", chunk.text());
        }
        println!();
    }
    Ok(())
}

fn cmd_normalize(file: &Path) -> anyhow::Result<()> {
    let document = Document::from_path(file, None)?;
    for section in document.sections() {
        println!("{}\n", prepare_for_speech(&section.spoken_text()));
    }
    Ok(())
}

async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let client = RemoteSynthesizer::from_config(&config.tts);
    println!("Checking {} ...", client.base_url());

    if !client.probe().await {
        anyhow::bail!("remote TTS at {} is unavailable", client.base_url());
    }

    let voices = client.list_voices().await?;
    println!("Remote TTS is available with {} voices", voices.len());
    for voice in voices.iter().take(20) {
        println!("  {voice}");
    }
    Ok(())
}

async fn cmd_read(
    config: &Config,
    file: &Path,
    header: Option<&str>,
    context: VoiceContext,
    title: Option<String>,
) -> anyhow::Result<()> {
    let document = Document::from_path(file, title)?;

    let synthesizer = RemoteSynthesizer::from_config(&config.tts);
    synthesizer.probe().await;

    let sink: Arc<dyn AudioSink> = Arc::new(CpalSink::new()?);
    let fallback: Arc<dyn LocalSynthesizer> = if config.fallback.enabled {
        Arc::new(CommandSpeaker::new(
            config.fallback.program.clone(),
            config.fallback.voice.clone(),
            Arc::clone(&sink),
        ))
    } else {
        Arc::new(DisabledSpeaker)
    };

    let coordinator = PlaybackCoordinator::new(PlaybackContext {
        synthesizer: Arc::new(synthesizer),
        fallback,
        sink,
        profile: config.voices.get(context),
        settings: config.playback.clone(),
        handles: HandleTracker::new(),
    });
    coordinator.load(&document);

    tracing::info!(title = document.title(), %context, "reading document");

    match header {
        Some(query) => {
            let section = coordinator
                .section_by_header(query)
                .ok_or_else(|| anyhow::anyhow!("no section matching \"{query}\""))?;
            read_section(&coordinator, section.id).await
        }
        None => read_all(&coordinator).await,
    }
}

async fn read_section(coordinator: &PlaybackCoordinator, id: SectionId) -> anyhow::Result<()> {
    coordinator.play(id)?;

    tokio::select! {
        status = coordinator.wait_until_idle(id) => match status.error {
            Some(e) => Err(recital::Error::from(e).into()),
            None => Ok(()),
        },
        _ = tokio::signal::ctrl_c() => {
            coordinator.stop_all();
            println!("\nStopped");
            Ok(())
        }
    }
}

async fn read_all(coordinator: &PlaybackCoordinator) -> anyhow::Result<()> {
    tokio::select! {
        failures = coordinator.play_all_in_order() => {
            for (section, error) in &failures {
                println!("Could not read \"{}\": {error}", section.header);
            }
            if failures.is_empty() {
                Ok(())
            } else {
                anyhow::bail!("{} section(s) could not be read", failures.len())
            }
        }
        _ = tokio::signal::ctrl_c() => {
            coordinator.stop_all();
            println!("\nStopped");
            Ok(())
        }
    }
}
