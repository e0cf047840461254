//! Unity creative suite command-line entry point.
//!
//! Each subcommand maps onto one tool handler in [`commands`]; handler errors
//! are printed inline and turn into a non-zero exit code.

mod commands;
mod session;
mod settings;
mod state;
mod storage;
mod tools;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use settings::{apply_runtime_env_from_settings, default_settings_path, load_settings};
use state::AppState;
use storage::{LocalStore, MediaKind};
use tokio::sync::broadcast::error::RecvError;
use tools::{ChatTool, CopyFramework, ImageMode, ScriptMode};
use tracing::{debug, info, warn};
use unity_core::{AspectRatio, ClientConfig, GenerationClient};

const EXPORT_CONFIRMATION: &str = "EXPORT";

/// Unity creative suite
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show backend availability and the model roster
    Status,

    /// Talk to the neural assistant or the copywriter
    Chat {
        /// brain or copywriter
        #[arg(short, long, default_value = "brain")]
        tool: ChatTool,

        /// Message to send
        message: Option<String>,

        /// Brain quick action (ocr, brief, vfx)
        #[arg(short, long)]
        action: Option<String>,

        /// Attach an image (repeatable)
        #[arg(short, long)]
        image: Vec<PathBuf>,

        /// Copywriting framework (hook-body-cta, aida, enquiry)
        #[arg(short, long)]
        framework: Option<CopyFramework>,

        /// Transcript file kept between invocations
        #[arg(short, long)]
        session: Option<PathBuf>,
    },

    /// Plain text generation
    Text {
        prompt: String,

        /// System instruction
        #[arg(long)]
        system: Option<String>,
    },

    /// Media studio: image, flyer or icon
    Image {
        prompt: String,

        #[arg(short, long, default_value = "image")]
        mode: ImageMode,

        /// Reference image to build on
        #[arg(short, long)]
        reference: Option<PathBuf>,

        #[arg(long)]
        aspect: Option<AspectRatio>,
    },

    /// Smart editor: apply a preset or a custom edit to an image
    Edit {
        image: PathBuf,

        /// remove-watermark, remove-background, enhance-4k, resize-16x9, resize-9x16, resize-1x1
        #[arg(short, long)]
        preset: Option<String>,

        #[arg(long)]
        prompt: Option<String>,

        #[arg(long)]
        aspect: Option<AspectRatio>,
    },

    /// Turn a script into a visual
    Script {
        /// Script text, or @path to read it from a file
        script: String,

        #[arg(short, long, default_value = "image")]
        mode: ScriptMode,

        #[arg(long)]
        aspect: Option<AspectRatio>,
    },

    /// Media studio: start a video
    Video {
        prompt: String,

        #[arg(long)]
        aspect: Option<AspectRatio>,
    },

    /// Check on a video that was still rendering
    VideoStatus {
        #[arg(short, long)]
        operation: String,
    },

    /// Voice over from a preset voice or a reference recording
    Voice {
        text: String,

        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        persona: Option<String>,

        /// 0 to 100
        #[arg(long)]
        speed: Option<u8>,

        /// 0 to 100
        #[arg(long)]
        pitch: Option<u8>,

        /// Reference recording to match (max 10 MB)
        #[arg(long)]
        reference: Option<PathBuf>,
    },

    /// Extract a brand kit from a logo or asset
    Brand { image: PathBuf },

    /// List generation history
    History {
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        page_size: usize,

        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long)]
        kind: Option<MediaKind>,
    },

    /// Delete history items by id
    HistoryDelete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Export decrypted history to a JSON file
    Export {
        out: PathBuf,

        /// Skip the typed confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Show settings, or change them with --set key=value
    Settings {
        #[arg(long = "set")]
        assignments: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("unity=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ── Settings + client ─────────────────────────────────────────────────
    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let app_settings = load_settings(&settings_path);
    apply_runtime_env_from_settings(&app_settings);

    let client = Arc::new(
        GenerationClient::new(ClientConfig::from_env())
            .context("failed to initialize generation client")?,
    );

    // ── Storage ───────────────────────────────────────────────────────────
    let store = Arc::new(
        LocalStore::new(LocalStore::default_db_path())
            .map_err(anyhow::Error::msg)
            .context("failed to initialize local encrypted storage")?,
    );
    if app_settings.history_enabled {
        match store.prune_history(app_settings.retention_days) {
            Ok(0) => {}
            Ok(n) => info!(pruned = n, "expired history removed"),
            Err(e) => warn!("history prune failed at startup: {e}"),
        }
    }

    spawn_event_forwarder(&client);

    let state = AppState::new(client, app_settings, settings_path, store);

    if let Err(message) = run(&state, cli.command).await {
        eprintln!("error: {message}");
        std::process::exit(1);
    }
    Ok(())
}

/// Mirror generation status events into the log.
fn spawn_event_forwarder(client: &GenerationClient) {
    let mut rx = client.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => debug!(
                    seq = event.seq,
                    request_id = event.request_id,
                    capability = %event.capability,
                    status = ?event.status,
                    detail = event.detail.as_deref().unwrap_or(""),
                    "generation event"
                ),
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "event forwarder lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn run(state: &AppState, command: Command) -> Result<(), String> {
    match command {
        Command::Status => print_json(&commands::get_status(state)),
        Command::Chat {
            tool,
            message,
            action,
            image,
            framework,
            session,
        } => {
            let output = commands::chat(
                state,
                commands::ChatRequest {
                    tool,
                    message,
                    action,
                    images: image,
                    framework,
                    session,
                },
            )
            .await?;
            println!("{output}");
            Ok(())
        }
        Command::Text { prompt, system } => {
            let output = commands::generate_text(state, &prompt, system.as_deref()).await?;
            println!("{output}");
            Ok(())
        }
        Command::Image {
            prompt,
            mode,
            reference,
            aspect,
        } => {
            let output =
                commands::generate_image(state, &prompt, mode, reference.as_deref(), aspect).await?;
            println!("{output}");
            Ok(())
        }
        Command::Edit {
            image,
            preset,
            prompt,
            aspect,
        } => {
            let output = commands::edit_image(
                state,
                &image,
                preset.as_deref(),
                prompt.as_deref(),
                aspect,
            )
            .await?;
            println!("{output}");
            Ok(())
        }
        Command::Script {
            script,
            mode,
            aspect,
        } => {
            let script = read_script(&script)?;
            let output = commands::script_to_media(state, &script, mode, aspect).await?;
            println!("{output}");
            Ok(())
        }
        Command::Video { prompt, aspect } => {
            let output = commands::generate_video(state, &prompt, aspect).await?;
            println!("{output}");
            Ok(())
        }
        Command::VideoStatus { operation } => {
            let output = commands::video_status(state, &operation).await?;
            println!("{output}");
            Ok(())
        }
        Command::Voice {
            text,
            region,
            persona,
            speed,
            pitch,
            reference,
        } => {
            let output = commands::voice_over(
                state,
                commands::VoiceRequest {
                    text,
                    region,
                    persona,
                    speed,
                    pitch,
                    reference,
                },
            )
            .await?;
            println!("{output}");
            Ok(())
        }
        Command::Brand { image } => {
            let output = commands::brand_kit(state, &image).await?;
            println!("{output}");
            Ok(())
        }
        Command::History {
            page,
            page_size,
            query,
            kind,
        } => print_json(&commands::get_history(state, page, page_size, query, kind)?),
        Command::HistoryDelete { ids } => {
            let deleted = commands::delete_history(state, &ids)?;
            println!("deleted {deleted} item(s)");
            Ok(())
        }
        Command::Export { out, yes } => {
            let confirmed = yes || confirm_export(&out)?;
            let count = commands::export_history(state, &out, confirmed)?;
            println!("exported {count} item(s) to {}", out.display());
            Ok(())
        }
        Command::Settings { assignments } => {
            if assignments.is_empty() {
                print_json(&commands::get_runtime_settings(state))
            } else {
                print_json(&commands::update_settings(state, &assignments)?)
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

/// `@path` reads the script from a file.
fn read_script(arg: &str) -> Result<String, String> {
    match arg.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).map_err(|e| format!("cannot read script {path}: {e}"))
        }
        None => Ok(arg.to_string()),
    }
}

/// Exported history is decrypted; the user has to type the confirmation word.
fn confirm_export(out: &std::path::Path) -> Result<bool, String> {
    eprint!(
        "History will be written to {} without encryption. Type {EXPORT_CONFIRMATION} to continue: ",
        out.display()
    );
    std::io::stderr().flush().map_err(|e| e.to_string())?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| e.to_string())?;
    Ok(line.trim() == EXPORT_CONFIRMATION)
}
