//! Модуль обработки ошибок библиотеки local-korean-tts
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при синтезе.
//! Отмена задачи ошибкой не является и описывается `JobOutcome::Cancelled`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Класс ошибки синтеза
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisErrorKind {
    /// Повтор в следующем запуске может пройти успешно
    Transient,
    /// Модель не может синтезировать этот текст
    Fatal,
}

impl fmt::Display for SynthesisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Ошибка внешнего синтезатора
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} synthesis failure: {message}")]
pub struct SynthesisError {
    pub kind: SynthesisErrorKind,
    pub message: String,
}

impl SynthesisError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: SynthesisErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: SynthesisErrorKind::Fatal,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == SynthesisErrorKind::Transient
    }
}

/// Ошибка внешнего транскодера
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Transcode error: {0}")]
pub struct TranscodeError(pub String);

/// Ошибки библиотеки local-korean-tts
#[derive(Debug, Error)]
pub enum TtsError {
    /// Некорректный входной текст или параметры задачи
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ошибка синтеза чанка
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// Ошибка транскодирования итогового аудио
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// Ошибка хранилища кэша чанков
    #[error("Cache IO error: {0}")]
    CacheIo(String),

    /// Ошибка обработки аудио
    #[error("Audio processing error: {0}")]
    Audio(String),

    /// Ошибка записи итогового файла
    #[error("Output error: {0}")]
    Output(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Недопустимый переход состояния задачи
    #[error("Invalid job state: {0}")]
    InvalidState(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<hound::Error> for TtsError {
    fn from(err: hound::Error) -> Self {
        TtsError::Audio(err.to_string())
    }
}

impl TtsError {
    /// Короткое имя класса ошибки для пользовательских сообщений
    pub fn classification(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Synthesis(e) if e.is_transient() => "synthesis_transient",
            Self::Synthesis(_) => "synthesis_fatal",
            Self::Transcode(_) => "transcode",
            Self::CacheIo(_) => "cache_io",
            Self::Audio(_) => "audio",
            Self::Output(_) => "output",
            Self::Configuration(_) => "configuration",
            Self::InvalidState(_) => "invalid_state",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

/// Тип Result для библиотеки local-korean-tts
pub type Result<T> = std::result::Result<T, TtsError>;
