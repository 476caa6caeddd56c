//! Интерфейс синтеза речи для одного чанка

pub mod process;

use std::path::Path;

use crate::error::SynthesisError;

pub use process::ProcessSynthesizer;

/// Запрос на синтез одного чанка
#[derive(Debug, Clone, PartialEq)]
pub struct SynthRequest<'a> {
    pub text: &'a str,
    pub speed: f32,
    pub sample_rate: u32,
}

/// Синтезатор речи
///
/// Вызывается последовательно из рабочего потока задачи; реализация может
/// держать состояние модели между вызовами.
pub trait Synthesizer {
    /// Идентификатор модели, входит в ключ кэша
    fn model_id(&self) -> &str;

    /// Каталог загруженной модели, если синтезатор работает с файлами
    fn model_path(&self) -> Option<&Path> {
        None
    }

    /// Синтезировать текст и вернуть WAV
    fn synthesize(&mut self, request: &SynthRequest<'_>) -> Result<Vec<u8>, SynthesisError>;
}

impl<S: Synthesizer + ?Sized> Synthesizer for Box<S> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn model_path(&self) -> Option<&Path> {
        (**self).model_path()
    }

    fn synthesize(&mut self, request: &SynthRequest<'_>) -> Result<Vec<u8>, SynthesisError> {
        (**self).synthesize(request)
    }
}
