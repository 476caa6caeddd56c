//! Склейка аудио чанков с паузами между ними

use std::time::Duration;

use crate::audio::wav::PcmBuffer;
use crate::error::{Result, TtsError};

#[derive(Debug)]
enum Segment {
    Audio(PcmBuffer),
    /// Тишина вместо чанка, формат определяется при сборке
    Placeholder(Duration),
}

/// Накопитель аудио чанков в порядке их индексов
#[derive(Debug)]
pub struct ChunkConcatenator {
    gap: Duration,
    segments: Vec<Segment>,
}

impl ChunkConcatenator {
    /// `gap` вставляется между соседними чанками
    pub fn new(gap: Duration) -> Self {
        Self {
            gap,
            segments: Vec::new(),
        }
    }

    /// Добавить аудио чанка в формате WAV
    pub fn push_wav(&mut self, wav: &[u8]) -> Result<Duration> {
        let buffer = PcmBuffer::from_wav_bytes(wav)?;
        if let Some(first) = self.first_audio() {
            if !first.same_format(&buffer) {
                return Err(TtsError::Audio(format!(
                    "chunk {} is {} Hz/{} ch, expected {} Hz/{} ch",
                    self.segments.len(),
                    buffer.sample_rate,
                    buffer.channels,
                    first.sample_rate,
                    first.channels
                )));
            }
        }
        let duration = buffer.duration();
        self.segments.push(Segment::Audio(buffer));
        Ok(duration)
    }

    /// Добавить тишину на месте чанка
    pub fn push_silence(&mut self, duration: Duration) {
        self.segments.push(Segment::Placeholder(duration));
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn first_audio(&self) -> Option<&PcmBuffer> {
        self.segments.iter().find_map(|s| match s {
            Segment::Audio(buffer) => Some(buffer),
            Segment::Placeholder(_) => None,
        })
    }

    /// Собрать итоговый буфер
    ///
    /// Формат берется из первого настоящего чанка; если таких нет, используется
    /// `fallback_rate` и моно.
    pub fn finish(self, fallback_rate: u32) -> PcmBuffer {
        let (sample_rate, channels) = self
            .first_audio()
            .map(|b| (b.sample_rate, b.channels))
            .unwrap_or((fallback_rate, 1));

        let mut out = PcmBuffer::new(sample_rate, channels);
        for (i, segment) in self.segments.into_iter().enumerate() {
            if i > 0 && !self.gap.is_zero() {
                out.append_silence(self.gap);
            }
            match segment {
                Segment::Audio(buffer) => out.samples.extend_from_slice(&buffer.samples),
                Segment::Placeholder(duration) => out.append_silence(duration),
            }
        }
        out
    }
}
