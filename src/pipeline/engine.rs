//! Движок задачи синтеза
//!
//! Задача проходит этапы `loading_input → chunking → chunk_synth → finalising`
//! строго последовательно. Чанки обрабатываются в порядке индексов, отмена
//! проверяется на каждой границе чанков и перед записью результата.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::audio::ChunkConcatenator;
use crate::cache::{config_digest, fingerprint, ChunkCache};
use crate::config::{FailurePolicy, SynthJobConfig};
use crate::error::{Result, TtsError};
use crate::pipeline::hooks::{ChunkSource, PipelineHooks};
use crate::pipeline::output::{write_outputs, ChunkStats};
use crate::pipeline::state::{JobState, Stage};
use crate::synth::{SynthRequest, Synthesizer};
use crate::text::{chunk_text, mask, read_source, Chunk};
use crate::transcode::{TranscodeRequest, Transcoder};

/// Оценка длительности речи на один символ при скорости 1.0
const MS_PER_CHAR: f64 = 80.0;
const MIN_SUBSTITUTE_MS: f64 = 200.0;
/// Длина фрагмента входного текста в журнале задачи
const PREVIEW_CHARS: usize = 160;

/// Результат успешной задачи
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub output_path: PathBuf,
    pub meta_path: PathBuf,
    pub duration: Duration,
    pub chunk_count: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Индексы чанков, замененных тишиной
    pub degraded_chunks: Vec<usize>,
    pub sample_rate: u32,
}

/// Завершение задачи без ошибки
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed(JobResult),
    /// Отмена на границе чанков; результат не записан
    Cancelled { chunks_done: usize },
}

impl JobOutcome {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Completed(_) => Stage::Completed,
            Self::Cancelled { .. } => Stage::Cancelled,
        }
    }
}

/// Ошибка задачи с этапом, на котором она произошла
#[derive(Debug, Error)]
#[error("job failed at {stage}: {error}")]
pub struct JobFailure {
    pub stage: Stage,
    #[source]
    pub error: TtsError,
}

/// Оценочная длительность чанка для замены тишиной
pub fn estimate_duration(chars: usize, speed: f32) -> Duration {
    let ms = (chars as f64 * MS_PER_CHAR / speed as f64).max(MIN_SUBSTITUTE_MS);
    Duration::from_millis(ms.round() as u64)
}

enum Flow {
    Done(JobResult),
    Cancelled { chunks_done: usize },
}

/// Конвейер синтеза: синтезатор и транскодер, используемые задачами
pub struct SynthesisPipeline<S, T> {
    synthesizer: S,
    transcoder: T,
}

impl<S: Synthesizer, T: Transcoder> SynthesisPipeline<S, T> {
    pub fn new(synthesizer: S, transcoder: T) -> Self {
        Self {
            synthesizer,
            transcoder,
        }
    }

    pub fn synthesizer(&self) -> &S {
        &self.synthesizer
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// Выполнить задачу
    ///
    /// Конфигурация не изменяется; хуки не удерживаются после возврата.
    pub fn run(
        &mut self,
        config: &SynthJobConfig,
        hooks: &dyn PipelineHooks,
    ) -> std::result::Result<JobOutcome, JobFailure> {
        let started = Instant::now();
        let mut state = JobState::new();
        log::info!("Job {} started", config.job_id.short());

        match self.execute(config, hooks, &mut state) {
            Ok(Flow::Done(result)) => {
                let stage = state.stage();
                enter(&mut state, hooks, Stage::Completed)
                    .map_err(|error| JobFailure { stage, error })?;
                log::info!(
                    "Job {} completed in {:.1}s: {} chunks, {} cache hits",
                    config.job_id.short(),
                    started.elapsed().as_secs_f64(),
                    result.chunk_count,
                    result.cache_hits
                );
                Ok(JobOutcome::Completed(result))
            }
            Ok(Flow::Cancelled { chunks_done }) => {
                let stage = state.stage();
                enter(&mut state, hooks, Stage::Cancelled)
                    .map_err(|error| JobFailure { stage, error })?;
                log::info!(
                    "Job {} cancelled after {} chunks",
                    config.job_id.short(),
                    chunks_done
                );
                Ok(JobOutcome::Cancelled { chunks_done })
            }
            Err(error) => {
                let stage = state.stage();
                log::error!(
                    "Job {} failed at {} ({}): {}",
                    config.job_id.short(),
                    stage,
                    error.classification(),
                    error
                );
                if stage.can_transition_to(Stage::Failed) {
                    // Переход заведомо допустим
                    let _ = enter(&mut state, hooks, Stage::Failed);
                }
                Err(JobFailure { stage, error })
            }
        }
    }

    fn execute(
        &mut self,
        config: &SynthJobConfig,
        hooks: &dyn PipelineHooks,
        state: &mut JobState,
    ) -> Result<Flow> {
        enter(state, hooks, Stage::LoadingInput)?;
        config.validate()?;
        self.check_model(config)?;
        let text = read_source(&config.source)?;
        report(hooks, log::Level::Info, &format!("Input length: {} chars", text.chars().count()));
        report(hooks, log::Level::Debug, &format!("Input preview: {}", mask::preview(&text, PREVIEW_CHARS)));
        if hooks.should_cancel() {
            return Ok(Flow::Cancelled { chunks_done: 0 });
        }

        enter(state, hooks, Stage::Chunking)?;
        let chunks = chunk_text(&text, config.max_chunk_chars)?;
        report(
            hooks,
            log::Level::Info,
            &format!("Chunks: {} (max {} graphemes)", chunks.len(), config.max_chunk_chars),
        );

        enter(state, hooks, Stage::ChunkSynth)?;
        let cache = match ChunkCache::open(&config.cache_dir) {
            Ok(cache) => Some(cache),
            Err(e) => {
                report(
                    hooks,
                    log::Level::Warn,
                    &format!("Chunk cache unavailable, continuing without it: {}", e),
                );
                None
            }
        };
        let model_id = self.synthesizer.model_id().to_string();
        let total = chunks.len();
        let mut audio = ChunkConcatenator::new(Duration::from_millis(config.silence_ms as u64));
        let mut stats = ChunkStats {
            chunk_count: total,
            ..ChunkStats::default()
        };

        for chunk in &chunks {
            if hooks.should_cancel() {
                return Ok(Flow::Cancelled {
                    chunks_done: chunk.index,
                });
            }
            let source = self.process_chunk(chunk, config, &model_id, cache.as_ref(), hooks, &mut audio, &mut stats)?;
            report(
                hooks,
                log::Level::Debug,
                &format!("Chunk {}/{}: {}", chunk.index + 1, total, source_label(source)),
            );
            hooks.on_progress(chunk.index + 1, total);
            hooks.on_chunk_done(chunk.index, total, source);
        }

        enter(state, hooks, Stage::Finalising)?;
        if hooks.should_cancel() {
            return Ok(Flow::Cancelled { chunks_done: total });
        }

        let pcm = audio.finish(config.sample_rate);
        let duration = pcm.duration();
        let wav = pcm.to_wav_bytes()?;
        let request = TranscodeRequest {
            format: config.output_format,
            sample_rate: config.sample_rate,
            speed: config.speed,
        };
        let encoded = self.transcoder.transcode(&wav, &request)?;
        let (output_path, meta_path) = write_outputs(
            config,
            &encoded,
            duration,
            &stats,
            &model_id,
            config_digest(config, &model_id)?,
        )?;
        report(hooks, log::Level::Info, &format!("Output file: {}", output_path.display()));

        Ok(Flow::Done(JobResult {
            output_path,
            meta_path,
            duration,
            chunk_count: stats.chunk_count,
            cache_hits: stats.cache_hits,
            cache_misses: stats.cache_misses,
            degraded_chunks: stats.degraded_chunks,
            sample_rate: config.sample_rate,
        }))
    }

    fn process_chunk(
        &mut self,
        chunk: &Chunk,
        config: &SynthJobConfig,
        model_id: &str,
        cache: Option<&ChunkCache>,
        hooks: &dyn PipelineHooks,
        audio: &mut ChunkConcatenator,
        stats: &mut ChunkStats,
    ) -> Result<ChunkSource> {
        let key = fingerprint(&chunk.text, model_id, config.speed, config.sample_rate)?;

        if let Some(cache) = cache {
            match cache.get(&key) {
                Ok(Some(entry)) => {
                    audio.push_wav(&entry.bytes)?;
                    stats.cache_hits += 1;
                    return Ok(ChunkSource::Cache);
                }
                Ok(None) => {}
                Err(e) => report(
                    hooks,
                    log::Level::Warn,
                    &format!("Cache read failed for chunk {}, treating as miss: {}", chunk.index, e),
                ),
            }
        }

        stats.cache_misses += 1;
        let request = SynthRequest {
            text: &chunk.text,
            speed: config.speed,
            sample_rate: config.sample_rate,
        };
        match self.synthesizer.synthesize(&request) {
            Ok(bytes) => {
                audio.push_wav(&bytes)?;
                if let Some(cache) = cache {
                    if let Err(e) = cache.put(&key, &bytes) {
                        report(
                            hooks,
                            log::Level::Warn,
                            &format!("Failed to cache chunk {}, using it in memory only: {}", chunk.index, e),
                        );
                    }
                }
                Ok(ChunkSource::Synthesized)
            }
            Err(e) if e.is_transient() && config.failure_policy == FailurePolicy::BestEffort => {
                let substitute = estimate_duration(chunk.grapheme_len(), config.speed);
                report(
                    hooks,
                    log::Level::Warn,
                    &format!(
                        "Chunk {} replaced with {} ms of silence: {}",
                        chunk.index,
                        substitute.as_millis(),
                        e
                    ),
                );
                audio.push_silence(substitute);
                stats.degraded_chunks.push(chunk.index);
                Ok(ChunkSource::Silence)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Модель задачи должна совпадать с моделью, загруженной синтезатором
    fn check_model(&self, config: &SynthJobConfig) -> Result<()> {
        let Some(loaded) = self.synthesizer.model_path() else {
            return Ok(());
        };
        let requested = canonical_or_raw(&config.model_path);
        if requested != canonical_or_raw(loaded) {
            return Err(TtsError::Configuration(format!(
                "job requests model {} but the synthesizer runs {}",
                config.model_path.display(),
                loaded.display()
            )));
        }
        Ok(())
    }
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn source_label(source: ChunkSource) -> &'static str {
    match source {
        ChunkSource::Cache => "cache hit",
        ChunkSource::Synthesized => "synthesized",
        ChunkSource::Silence => "silence",
    }
}

/// Записать строку в журнал и передать наблюдателю очищенную копию
fn report(hooks: &dyn PipelineHooks, level: log::Level, line: &str) {
    log::log!(level, "{}", line);
    hooks.on_log(&mask::scrub_record(line));
}

fn enter(state: &mut JobState, hooks: &dyn PipelineHooks, stage: Stage) -> Result<()> {
    state.transition(stage)?;
    log::debug!("Stage: {}", stage);
    hooks.on_stage(stage);
    Ok(())
}
