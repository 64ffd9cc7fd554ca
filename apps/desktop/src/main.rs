use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    Notifier, PageSurface, StudioClient, ThemeController, EDIT_AUDIO, TTS_AUDIO, VC_AUDIO,
};
use playback::{AudioPlayer, NullPlayer, RodioPlayer};
use shared::{
    domain::AudioTargetId,
    protocol::{
        CrossfadeRequest, DeleteSegmentRequest, FileUpload, InsertRequest, SpliceRequest,
        TrimRequest, TtsRequest, VoiceConvertRequest,
    },
};
use storage::Storage;
use tracing::info;

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Parser, Debug)]
#[command(name = "studio", about = "Command-line front end for the speech service")]
struct Args {
    /// Base URL of the speech server.
    #[arg(long)]
    server_url: Option<String>,
    /// SQLite database holding persisted preferences.
    #[arg(long)]
    settings_db: Option<String>,
    /// Submit without playing the returned audio.
    #[arg(long)]
    no_play: bool,
    /// Also write the returned audio to this path.
    #[arg(long)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate speech from text.
    Tts {
        #[arg(long)]
        text: String,
        /// Server-side path of a prompt recording to condition on.
        #[arg(long)]
        audio_prompt_path: Option<String>,
        #[arg(long, default_value_t = 0.5)]
        exaggeration: f32,
        #[arg(long, default_value_t = 0.8)]
        temperature: f32,
        #[arg(long, default_value_t = 0)]
        seed: i64,
        #[arg(long, default_value_t = 0.5)]
        cfg_weight: f32,
        #[arg(long, default_value_t = 0.05)]
        min_p: f32,
        #[arg(long, default_value_t = 1.0)]
        top_p: f32,
        #[arg(long, default_value_t = 1.2)]
        repetition_penalty: f32,
    },
    /// Convert a recording toward a target voice.
    Vc {
        #[arg(long)]
        audio: PathBuf,
        #[arg(long)]
        target_voice: Option<PathBuf>,
    },
    /// Join two recordings back to back.
    Splice { audio1: PathBuf, audio2: PathBuf },
    /// Keep the span between two timestamps.
    Trim {
        #[arg(long)]
        audio: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        start: f32,
        #[arg(long, default_value_t = 0.0)]
        end: f32,
    },
    /// Insert one recording into another at a position.
    Insert {
        #[arg(long)]
        base: PathBuf,
        #[arg(long)]
        insert: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        position: f32,
    },
    /// Cut the span between two timestamps.
    Delete {
        #[arg(long)]
        audio: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        start: f32,
        #[arg(long, default_value_t = 0.0)]
        end: f32,
    },
    /// Blend the tail of one recording into the head of another.
    Crossfade {
        audio1: PathBuf,
        audio2: PathBuf,
        #[arg(long, default_value_t = 0.01)]
        duration: f32,
    },
    /// Show or flip the persisted UI theme.
    Theme {
        #[arg(long)]
        toggle: bool,
    },
}

struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let Args {
        server_url,
        settings_db,
        no_play,
        output,
        command,
    } = Args::parse();
    let settings = load_settings();

    if let Command::Theme { toggle } = command {
        let raw_url = settings_db.as_deref().unwrap_or(&settings.settings_db);
        return run_theme(raw_url, toggle).await;
    }

    let server_url = server_url.unwrap_or(settings.server_url);
    let player: Arc<dyn AudioPlayer> = if no_play {
        Arc::new(NullPlayer)
    } else {
        Arc::new(RodioPlayer::try_default()?)
    };
    let mut client =
        StudioClient::new_with_dependencies(server_url.as_str(), player, Arc::new(StderrNotifier));
    client.bind_default_page(&PageSurface::full());
    info!(%server_url, "submitting to speech server");

    let target = match &command {
        Command::Tts { .. } => TTS_AUDIO,
        Command::Vc { .. } => VC_AUDIO,
        _ => EDIT_AUDIO,
    };

    match command {
        Command::Tts {
            text,
            audio_prompt_path,
            exaggeration,
            temperature,
            seed,
            cfg_weight,
            min_p,
            top_p,
            repetition_penalty,
        } => {
            client
                .synthesize(TtsRequest {
                    text,
                    audio_prompt_path,
                    exaggeration,
                    temperature,
                    seed,
                    cfg_weight,
                    min_p,
                    top_p,
                    repetition_penalty,
                })
                .await?;
        }
        Command::Vc {
            audio,
            target_voice,
        } => {
            client
                .convert_voice(VoiceConvertRequest {
                    audio: read_upload(&audio)?,
                    target_voice: target_voice.as_deref().map(read_upload).transpose()?,
                })
                .await?;
        }
        Command::Splice { audio1, audio2 } => {
            client
                .splice(SpliceRequest {
                    audio1: read_upload(&audio1)?,
                    audio2: read_upload(&audio2)?,
                })
                .await?;
        }
        Command::Trim { audio, start, end } => {
            client
                .trim(TrimRequest {
                    audio: read_upload(&audio)?,
                    start,
                    end,
                })
                .await?;
        }
        Command::Insert {
            base,
            insert,
            position,
        } => {
            client
                .insert(InsertRequest {
                    base: read_upload(&base)?,
                    insert: read_upload(&insert)?,
                    position,
                })
                .await?;
        }
        Command::Delete { audio, start, end } => {
            client
                .delete_segment(DeleteSegmentRequest {
                    audio: read_upload(&audio)?,
                    start,
                    end,
                })
                .await?;
        }
        Command::Crossfade {
            audio1,
            audio2,
            duration,
        } => {
            client
                .crossfade(CrossfadeRequest {
                    audio1: read_upload(&audio1)?,
                    audio2: read_upload(&audio2)?,
                    duration,
                })
                .await?;
        }
        // dispatched before the submission path
        Command::Theme { .. } => return Ok(()),
    }

    if let Some(path) = output {
        let target = AudioTargetId::from(target);
        let clip = match client.output(&target) {
            Some(output) => output.current_clip().await,
            None => None,
        };
        let clip = clip.context("no audio result to write")?;
        fs::write(&path, clip.data())
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        info!(path = %path.display(), bytes = clip.len(), "saved returned audio");
    }

    Ok(())
}

async fn run_theme(raw_database_url: &str, toggle: bool) -> Result<()> {
    let database_url = prepare_database_url(raw_database_url)?;
    let store = Storage::new(&database_url).await?;
    let controller = ThemeController::new(Arc::new(store));
    controller.load().await?;
    let theme = if toggle {
        controller.toggle().await?
    } else {
        controller.active().await
    };
    println!("{}", theme.as_str());
    Ok(())
}

fn read_upload(path: &Path) -> Result<FileUpload> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("audio.wav")
        .to_string();
    Ok(FileUpload::wav(filename, bytes))
}
