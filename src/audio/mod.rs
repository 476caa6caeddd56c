//! Работа с PCM-аудио: WAV кодек и склейка чанков

pub mod concat;
pub mod wav;

pub use concat::ChunkConcatenator;
pub use wav::{validate_wav, wav_duration, PcmBuffer};
