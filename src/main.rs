//! lk-tts: синтез речи из текстового файла в командной строке
//!
//! Коды выхода: 0 готово, 2 неверные входные данные или настройки,
//! 3 прочие ошибки, 130 задача отменена (Ctrl+C).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use local_korean_tts::config::{FailurePolicy, OutputFormat, Settings, SynthJobConfig};
use local_korean_tts::notification::ProgressBarHooks;
use local_korean_tts::pipeline::{spawn_job, JobFailure, JobOutcome, NoopHooks, PipelineHooks};
use local_korean_tts::synth::ProcessSynthesizer;
use local_korean_tts::transcode::{ffmpeg, FfmpegTranscoder};
use local_korean_tts::{logging, SynthesisPipeline, TtsError};

const EXIT_INVALID: u8 = 2;
const EXIT_FAILED: u8 = 3;
const EXIT_CANCELLED: u8 = 130;

/// Local Korean TTS
#[derive(Parser, Debug)]
#[command(name = "lk-tts", author, version, about, long_about = None)]
struct Cli {
    /// Input text or Markdown file
    #[arg(long = "in", value_name = "FILE")]
    input: PathBuf,

    /// Output audio file; the extension selects the format unless --format is given
    #[arg(long = "out", value_name = "FILE")]
    output: PathBuf,

    /// Output format (wav, ogg, mp3)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Speech speed multiplier (falls back to LK_TTS_SPEED)
    #[arg(long)]
    speed: Option<f32>,

    /// Output sample rate (falls back to LK_TTS_SAMPLE_RATE)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Cache directory (falls back to LK_TTS_CACHE_DIR)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Model directory (falls back to LK_TTS_MODEL_PATH)
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Model runner executable (falls back to LK_TTS_RUNNER)
    #[arg(long)]
    runner: Option<PathBuf>,

    /// FFmpeg executable (falls back to LK_TTS_FFMPEG_BIN, then PATH)
    #[arg(long)]
    ffmpeg_bin: Option<String>,

    /// Silence between chunks, in seconds
    #[arg(long, value_name = "SECONDS")]
    silence: Option<f64>,

    /// Maximum chunk length in graphemes (user-perceived characters)
    #[arg(long)]
    max_chars: Option<usize>,

    /// Replace chunks that fail temporarily with silence instead of aborting
    #[arg(long)]
    best_effort: bool,

    /// Do not draw the progress bar
    #[arg(long, short)]
    quiet: bool,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn split_output(path: &Path) -> Result<(PathBuf, String), TtsError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TtsError::InvalidInput(format!("--out must name a file: {}", path.display())))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((dir, stem))
}

fn build_config(cli: &Cli, settings: &Settings) -> Result<SynthJobConfig, TtsError> {
    let format = cli
        .format
        .or_else(|| OutputFormat::from_path(&cli.output))
        .unwrap_or_default();
    let (output_dir, output_name) = split_output(&cli.output)?;

    let mut builder = SynthJobConfig::builder(settings)
        .input_file(&cli.input)
        .output_dir(output_dir)
        .output_name(output_name)
        .output_format(format);

    if let Some(speed) = cli.speed {
        builder = builder.speed(speed);
    }
    if let Some(rate) = cli.sample_rate {
        builder = builder.sample_rate(rate);
    }
    if let Some(dir) = &cli.cache_dir {
        builder = builder.cache_dir(dir);
    }
    if let Some(path) = &cli.model_path {
        builder = builder.model_path(path);
    }
    if let Some(bin) = &cli.ffmpeg_bin {
        builder = builder.ffmpeg_bin(bin.as_str());
    }
    if let Some(seconds) = cli.silence {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(TtsError::InvalidInput(format!(
                "--silence must be a non-negative number of seconds, got {}",
                seconds
            )));
        }
        builder = builder.silence_ms((seconds * 1000.0).round() as u32);
    }
    if let Some(max_chars) = cli.max_chars {
        builder = builder.max_chunk_chars(max_chars);
    }
    if cli.best_effort {
        builder = builder.failure_policy(FailurePolicy::BestEffort);
    }
    builder.build()
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = Settings::from_env()?;
    let config = build_config(&cli, &settings)?;

    let runner = cli
        .runner
        .clone()
        .or_else(|| settings.runner.clone())
        .ok_or_else(|| {
            TtsError::Configuration("no model runner configured: pass --runner or set LK_TTS_RUNNER".to_string())
        })?;
    let synthesizer = ProcessSynthesizer::new(runner, &config.model_path)?;

    if config.output_format != OutputFormat::Wav && !ffmpeg::check_installed(&config.ffmpeg_bin) {
        return Err(TtsError::Configuration(format!(
            "FFmpeg not found at {:?}, required for {} output",
            config.ffmpeg_bin, config.output_format
        ))
        .into());
    }
    if config.output_format != OutputFormat::Wav {
        match ffmpeg::version(&config.ffmpeg_bin) {
            Ok(version) => log::debug!("Using {}", version),
            Err(e) => log::debug!("Could not read FFmpeg version: {}", e),
        }
    }
    let transcoder = FfmpegTranscoder::new(config.ffmpeg_bin.clone());

    let observer: Box<dyn PipelineHooks> = if cli.quiet {
        Box::new(NoopHooks)
    } else {
        Box::new(ProgressBarHooks::default())
    };

    let job_id = config.job_id;
    let mut handle = spawn_job(SynthesisPipeline::new(synthesizer, transcoder), config, observer)
        .context("failed to start synthesis job")?;
    log::info!("Started job {}", job_id);

    if let Some(mut events) = handle.events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                log::debug!("Event: {:?}", event);
            }
        });
    }

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping after the current chunk");
            token.cancel();
        }
    });

    match handle.wait().await {
        Ok(JobOutcome::Completed(result)) => {
            if !result.degraded_chunks.is_empty() {
                log::warn!(
                    "{} chunks were replaced with silence: {:?}",
                    result.degraded_chunks.len(),
                    result.degraded_chunks
                );
            }
            println!("{}", result.output_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Ok(JobOutcome::Cancelled { chunks_done }) => {
            eprintln!("Cancelled after {} chunks", chunks_done);
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(failure) => Err(failure.into()),
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    let tts = err
        .downcast_ref::<JobFailure>()
        .map(|failure| &failure.error)
        .or_else(|| err.downcast_ref::<TtsError>());
    match tts {
        Some(TtsError::InvalidInput(_)) | Some(TtsError::Configuration(_)) => EXIT_INVALID,
        _ => EXIT_FAILED,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = logging::parse_level(&cli.log_level).unwrap_or(LevelFilter::Info);
    logging::init_logger(level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}
