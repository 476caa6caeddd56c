//! Модуль конфигурации библиотеки local-korean-tts
//!
//! Этот модуль содержит общие настройки процесса (`Settings`) и неизменяемое
//! описание одной задачи синтеза (`SynthJobConfig`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TtsError};
use crate::transcode::ffmpeg::resolve_ffmpeg_bin;

/// Имя пакета, используется для путей по умолчанию
pub const PACKAGE_NAME: &str = "localkoreantts";
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;
pub const DEFAULT_SPEED: f32 = 1.0;
pub const DEFAULT_SILENCE_MS: u32 = 120;
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 3500;

const ENV_MODEL_PATH: &str = "LK_TTS_MODEL_PATH";
const ENV_CACHE_DIR: &str = "LK_TTS_CACHE_DIR";
const ENV_FFMPEG_BIN: &str = "LK_TTS_FFMPEG_BIN";
const ENV_SAMPLE_RATE: &str = "LK_TTS_SAMPLE_RATE";
const ENV_SPEED: &str = "LK_TTS_SPEED";
const ENV_RUNNER: &str = "LK_TTS_RUNNER";

/// Формат итогового аудиофайла
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Ogg,
    Mp3,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Wav
    }
}

impl OutputFormat {
    /// Расширение файла
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
        }
    }

    /// Аудиокодек FFmpeg для формата
    pub fn codec(&self) -> &'static str {
        match self {
            Self::Wav => "pcm_s16le",
            Self::Ogg => "libvorbis",
            Self::Mp3 => "libmp3lame",
        }
    }

    /// Определить формат по расширению пути
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "ogg" => Ok(Self::Ogg),
            "mp3" => Ok(Self::Mp3),
            other => Err(TtsError::InvalidInput(format!(
                "unsupported output format: {}",
                other
            ))),
        }
    }
}

/// Реакция движка на ошибку синтеза чанка
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Любая ошибка синтеза прерывает задачу
    Abort,
    /// Временные ошибки заменяются тишиной, фатальные прерывают задачу
    BestEffort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Abort
    }
}

/// Идентификатор задачи, уникальный для каждого запуска
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Первые восемь символов идентификатора для имен файлов и логов
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Источник текста для синтеза
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Текст передан напрямую
    Inline(String),
    /// Текст читается из файла (UTF-8, допускается Markdown)
    File(PathBuf),
}

/// Общие настройки процесса, значения по умолчанию для задач
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Каталог модели
    pub model_path: PathBuf,
    /// Каталог кэша чанков
    pub cache_dir: PathBuf,
    /// Исполняемый файл FFmpeg
    pub ffmpeg_bin: String,
    /// Исполняемый файл, запускающий модель
    pub runner: Option<PathBuf>,
    /// Частота дискретизации по умолчанию
    pub sample_rate: u32,
    /// Множитель скорости речи по умолчанию
    pub speed: f32,
    /// Пауза между чанками в миллисекундах
    pub silence_ms: u32,
    /// Максимальная длина чанка в графемах
    pub max_chunk_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let cache_root = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        let data_root = dirs::data_dir().unwrap_or_else(std::env::temp_dir);

        Self {
            model_path: data_root.join(PACKAGE_NAME).join("model"),
            cache_dir: cache_root.join(PACKAGE_NAME),
            ffmpeg_bin: resolve_ffmpeg_bin(None),
            runner: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            speed: DEFAULT_SPEED,
            silence_ms: DEFAULT_SILENCE_MS,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

impl Settings {
    /// Настройки по умолчанию с переопределением из переменных окружения
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Настройки по умолчанию с переопределением через произвольный источник
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(path) = value(ENV_MODEL_PATH) {
            settings.model_path = PathBuf::from(path);
        }
        if let Some(path) = value(ENV_CACHE_DIR) {
            settings.cache_dir = PathBuf::from(path);
        }
        if let Some(bin) = value(ENV_FFMPEG_BIN) {
            settings.ffmpeg_bin = bin;
        }
        if let Some(runner) = value(ENV_RUNNER) {
            settings.runner = Some(PathBuf::from(runner));
        }
        if let Some(raw) = value(ENV_SAMPLE_RATE) {
            // Значение вида "22050.0" тоже допустимо
            let rate = raw.parse::<f64>().map_err(|_| {
                TtsError::Configuration(format!("{} must be a number, got {:?}", ENV_SAMPLE_RATE, raw))
            })?;
            settings.sample_rate = rate as u32;
        }
        if let Some(raw) = value(ENV_SPEED) {
            settings.speed = raw.parse::<f32>().map_err(|_| {
                TtsError::Configuration(format!("{} must be a number, got {:?}", ENV_SPEED, raw))
            })?;
        }

        log::debug!(
            "Resolved settings: model={}, cache={}, ffmpeg={}",
            settings.model_path.display(),
            settings.cache_dir.display(),
            settings.ffmpeg_bin
        );
        Ok(settings)
    }

    /// Загрузить настройки из JSON-файла
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&content).map_err(|e| {
            TtsError::Configuration(format!("Failed to parse settings {}: {}", path.display(), e))
        })?;
        Ok(settings)
    }

    /// Сохранить настройки в JSON-файл
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Неизменяемое описание одной задачи синтеза
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthJobConfig {
    pub job_id: JobId,
    pub source: TextSource,
    pub output_dir: PathBuf,
    /// Имя итогового файла без расширения
    pub output_name: Option<String>,
    pub output_format: OutputFormat,
    pub model_path: PathBuf,
    pub cache_dir: PathBuf,
    pub ffmpeg_bin: String,
    pub speed: f32,
    pub sample_rate: u32,
    pub silence_ms: u32,
    pub max_chunk_chars: usize,
    pub failure_policy: FailurePolicy,
}

impl SynthJobConfig {
    /// Начать сборку конфигурации со значениями из настроек
    pub fn builder(settings: &Settings) -> SynthJobConfigBuilder {
        SynthJobConfigBuilder {
            config: SynthJobConfig {
                job_id: JobId::new(),
                source: TextSource::Inline(String::new()),
                output_dir: PathBuf::from("."),
                output_name: None,
                output_format: OutputFormat::default(),
                model_path: settings.model_path.clone(),
                cache_dir: settings.cache_dir.clone(),
                ffmpeg_bin: settings.ffmpeg_bin.clone(),
                speed: settings.speed,
                sample_rate: settings.sample_rate,
                silence_ms: settings.silence_ms,
                max_chunk_chars: settings.max_chunk_chars,
                failure_policy: FailurePolicy::default(),
            },
        }
    }

    /// Проверить параметры, влияющие на синтез
    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(TtsError::InvalidInput(format!(
                "speed must be a finite number greater than zero, got {}",
                self.speed
            )));
        }
        if self.sample_rate == 0 {
            return Err(TtsError::InvalidInput(
                "sample_rate must be a positive integer".to_string(),
            ));
        }
        if self.max_chunk_chars == 0 {
            return Err(TtsError::InvalidInput(
                "max_chunk_chars must be positive".to_string(),
            ));
        }
        if let Some(name) = &self.output_name {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err(TtsError::InvalidInput(format!(
                    "output name must be a plain file stem, got {:?}",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Построитель `SynthJobConfig`
pub struct SynthJobConfigBuilder {
    config: SynthJobConfig,
}

impl SynthJobConfigBuilder {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.config.source = TextSource::Inline(text.into());
        self
    }

    pub fn input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source = TextSource::File(path.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.config.output_name = Some(name.into());
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = path.into();
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn ffmpeg_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.ffmpeg_bin = bin.into();
        self
    }

    pub fn speed(mut self, speed: f32) -> Self {
        self.config.speed = speed;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    pub fn silence_ms(mut self, silence_ms: u32) -> Self {
        self.config.silence_ms = silence_ms;
        self
    }

    pub fn max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.config.max_chunk_chars = max_chunk_chars;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn build(self) -> Result<SynthJobConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_settings_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("LK_TTS_MODEL_PATH", "/models/kss"),
            ("LK_TTS_CACHE_DIR", "/tmp/lk-cache"),
            ("LK_TTS_SAMPLE_RATE", "16000.0"),
            ("LK_TTS_SPEED", "1.25"),
            ("LK_TTS_FFMPEG_BIN", " /opt/ffmpeg "),
        ]
        .into_iter()
        .collect();

        let settings = Settings::from_lookup(|name| env.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(settings.model_path, PathBuf::from("/models/kss"));
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/lk-cache"));
        assert_eq!(settings.sample_rate, 16_000);
        assert_eq!(settings.speed, 1.25);
        assert_eq!(settings.ffmpeg_bin, "/opt/ffmpeg");
        assert!(settings.runner.is_none());
    }

    #[test]
    fn test_settings_rejects_bad_number() {
        let result = Settings::from_lookup(|name| {
            (name == "LK_TTS_SPEED").then(|| "fast".to_string())
        });
        assert!(matches!(result, Err(TtsError::Configuration(_))));
    }

    #[test]
    fn test_builder_validation() {
        let settings = Settings::default();
        assert!(SynthJobConfig::builder(&settings).speed(0.0).build().is_err());
        assert!(SynthJobConfig::builder(&settings).speed(f32::NAN).build().is_err());
        assert!(SynthJobConfig::builder(&settings).sample_rate(0).build().is_err());
        assert!(SynthJobConfig::builder(&settings).output_name("a/b").build().is_err());

        let config = SynthJobConfig::builder(&settings)
            .text("안녕하세요")
            .output_format(OutputFormat::Mp3)
            .build()
            .unwrap();
        assert_eq!(config.output_format.extension(), "mp3");
        assert_eq!(config.source, TextSource::Inline("안녕하세요".to_string()));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("OGG".parse::<OutputFormat>().unwrap(), OutputFormat::Ogg);
        assert!("flac".parse::<OutputFormat>().is_err());
        assert_eq!(
            OutputFormat::from_path(Path::new("out/book.mp3")),
            Some(OutputFormat::Mp3)
        );
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
    }
}
