//! Итоговый файл задачи и его метаданные

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{SynthJobConfig, TextSource};
use crate::error::{Result, TtsError};
use crate::utils::temp::PendingFiles;

/// Суффикс файла метаданных рядом с итоговым файлом
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Содержимое файла метаданных
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputMetadata {
    pub job_id: String,
    pub output: PathBuf,
    pub format: String,
    pub duration_secs: f64,
    pub chunk_count: usize,
    pub cache_hit_count: usize,
    pub cache_miss_count: usize,
    pub degraded_chunks: Vec<usize>,
    pub sample_rate: u32,
    pub speed: f32,
    pub silence_ms: u32,
    pub model_id: String,
    pub config_digest: String,
    pub output_md5: String,
    pub generated_at: DateTime<Utc>,
}

impl OutputMetadata {
    /// Прочитать метаданные из файла
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Статистика по чанкам, накопленная за задачу
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStats {
    pub chunk_count: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub degraded_chunks: Vec<usize>,
}

/// Путь к файлу метаданных для итогового файла
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Имя итогового файла без расширения
///
/// Явное имя используется как есть; иначе берется имя входного файла или
/// `text`, к которому добавляются время запуска и короткий id задачи.
pub fn output_stem(config: &SynthJobConfig, now: DateTime<Utc>) -> String {
    if let Some(name) = &config.output_name {
        return name.clone();
    }
    let base = match &config.source {
        TextSource::File(path) => path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "text".to_string()),
        TextSource::Inline(_) => "text".to_string(),
    };
    format!(
        "{}_{}_{}",
        base,
        now.format("%Y%m%d_%H%M%S"),
        config.job_id.short()
    )
}

/// Записать итоговый файл и метаданные
///
/// Если запись метаданных не удалась, итоговый файл тоже удаляется.
pub fn write_outputs(
    config: &SynthJobConfig,
    audio: &[u8],
    duration: Duration,
    stats: &ChunkStats,
    model_id: &str,
    config_digest: String,
) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(&config.output_dir).map_err(|e| {
        TtsError::Output(format!(
            "Failed to create output dir {}: {}",
            config.output_dir.display(),
            e
        ))
    })?;

    let now = Utc::now();
    let artifact = config.output_dir.join(format!(
        "{}.{}",
        output_stem(config, now),
        config.output_format.extension()
    ));
    let meta_path = sidecar_path(&artifact);

    let metadata = OutputMetadata {
        job_id: config.job_id.to_string(),
        output: artifact.clone(),
        format: config.output_format.to_string(),
        duration_secs: duration.as_secs_f64(),
        chunk_count: stats.chunk_count,
        cache_hit_count: stats.cache_hits,
        cache_miss_count: stats.cache_misses,
        degraded_chunks: stats.degraded_chunks.clone(),
        sample_rate: config.sample_rate,
        speed: config.speed,
        silence_ms: config.silence_ms,
        model_id: model_id.to_string(),
        config_digest,
        output_md5: format!("{:x}", md5::compute(audio)),
        generated_at: now,
    };

    let mut pending = PendingFiles::new();
    pending.write(&artifact, audio)?;
    pending.write(&meta_path, &serde_json::to_vec_pretty(&metadata)?)?;
    pending.commit();

    log::info!(
        "Wrote {} ({} bytes, {:.1}s)",
        artifact.display(),
        audio.len(),
        metadata.duration_secs
    );
    Ok((artifact, meta_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn settings(dir: &Path) -> Settings {
        Settings {
            cache_dir: dir.join("cache"),
            ..Settings::default()
        }
    }

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(Path::new("/out/book.mp3")),
            PathBuf::from("/out/book.mp3.meta.json")
        );
    }

    #[test]
    fn test_output_stem() {
        let dir = tempdir().unwrap();
        let settings = settings(dir.path());
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();

        let config = SynthJobConfig::builder(&settings)
            .input_file("/books/chapter01.md")
            .build()
            .unwrap();
        assert_eq!(
            output_stem(&config, now),
            format!("chapter01_20240301_123005_{}", config.job_id.short())
        );

        let config = SynthJobConfig::builder(&settings).text("가").build().unwrap();
        assert_eq!(
            output_stem(&config, now),
            format!("text_20240301_123005_{}", config.job_id.short())
        );

        let config = SynthJobConfig::builder(&settings)
            .text("가")
            .output_name("greeting")
            .build()
            .unwrap();
        assert_eq!(output_stem(&config, now), "greeting");
    }

    #[test]
    fn test_same_second_jobs_get_distinct_stems() {
        let dir = tempdir().unwrap();
        let settings = settings(dir.path());
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let first = SynthJobConfig::builder(&settings)
            .input_file("/books/chapter01.md")
            .build()
            .unwrap();
        let second = SynthJobConfig::builder(&settings)
            .input_file("/books/chapter01.md")
            .build()
            .unwrap();

        assert_ne!(output_stem(&first, now), output_stem(&second, now));
    }

    #[test]
    fn test_write_outputs_round_trip() {
        let dir = tempdir().unwrap();
        let config = SynthJobConfig::builder(&settings(dir.path()))
            .text("가")
            .output_dir(dir.path().join("out"))
            .output_name("result")
            .build()
            .unwrap();
        let stats = ChunkStats {
            chunk_count: 2,
            cache_hits: 1,
            cache_misses: 1,
            degraded_chunks: vec![],
        };

        let (artifact, meta_path) = write_outputs(
            &config,
            b"audio-bytes",
            Duration::from_millis(1500),
            &stats,
            "kss",
            "digest".to_string(),
        )
        .unwrap();

        assert_eq!(artifact, dir.path().join("out").join("result.wav"));
        let meta = OutputMetadata::load(&meta_path).unwrap();
        assert_eq!(meta.chunk_count, 2);
        assert_eq!(meta.cache_hit_count, 1);
        assert_eq!(meta.duration_secs, 1.5);
        assert_eq!(meta.config_digest, "digest");
        assert_eq!(meta.output_md5, format!("{:x}", md5::compute(b"audio-bytes")));
    }
}
