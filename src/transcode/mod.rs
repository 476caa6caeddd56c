//! Транскодирование итогового аудио

pub mod ffmpeg;

use crate::config::OutputFormat;
use crate::error::TranscodeError;

pub use ffmpeg::FfmpegTranscoder;

/// Параметры итогового файла
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeRequest {
    pub format: OutputFormat,
    pub sample_rate: u32,
    pub speed: f32,
}

/// Преобразование WAV в итоговый формат
pub trait Transcoder {
    fn transcode(&self, wav: &[u8], request: &TranscodeRequest) -> Result<Vec<u8>, TranscodeError>;
}

impl<T: Transcoder + ?Sized> Transcoder for Box<T> {
    fn transcode(&self, wav: &[u8], request: &TranscodeRequest) -> Result<Vec<u8>, TranscodeError> {
        (**self).transcode(wav, request)
    }
}
