//! Основной файл библиотеки local-korean-tts
//!
//! Локальный синтез корейской речи для длинных текстов: текст разбивается на
//! чанки, каждый чанк синтезируется моделью или берется из кэша, аудио
//! склеивается с паузами, транскодируется и записывается вместе с файлом
//! метаданных. Задачу можно отменить на границе чанков и наблюдать за ней
//! через `PipelineHooks`.
//!
//! ```no_run
//! use local_korean_tts::{
//!     config::{Settings, SynthJobConfig},
//!     notification::ConsoleHooks,
//!     synth::ProcessSynthesizer,
//!     transcode::FfmpegTranscoder,
//!     SynthesisPipeline,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = Settings::from_env()?;
//! let config = SynthJobConfig::builder(&settings)
//!     .text("안녕하세요. 반갑습니다.")
//!     .output_dir("out")
//!     .build()?;
//!
//! let synth = ProcessSynthesizer::new("lk-tts-runner", &settings.model_path)?;
//! let mut pipeline = SynthesisPipeline::new(synth, FfmpegTranscoder::new(&settings.ffmpeg_bin));
//! let outcome = pipeline.run(&config, &ConsoleHooks::new())?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod notification;
pub mod pipeline;
pub mod progress;
pub mod synth;
pub mod text;
pub mod transcode;
pub mod utils;

pub use config::{FailurePolicy, OutputFormat, Settings, SynthJobConfig, TextSource};
pub use error::{Result, SynthesisError, TranscodeError, TtsError};
pub use pipeline::{
    spawn_job, CancellationToken, JobFailure, JobHandle, JobOutcome, JobResult, PipelineHooks,
    Stage, SynthesisPipeline,
};
