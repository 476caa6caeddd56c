//! Декодирование и кодирование WAV
//!
//! Внутри конвейера аудио хранится как 16-битный PCM с чередованием каналов.

use std::io::Cursor;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{Result, TtsError};

/// Буфер PCM-семплов
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    /// Семплы с чередованием каналов
    pub samples: Vec<i16>,
}

impl PcmBuffer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Vec::new(),
        }
    }

    /// Буфер тишины заданной длительности
    pub fn silence(sample_rate: u32, channels: u16, duration: Duration) -> Self {
        let mut buffer = Self::new(sample_rate, channels);
        buffer.append_silence(duration);
        buffer
    }

    /// Декодировать WAV (целые 8/16/24/32 бит или float 32 бит)
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 8) => reader
                .samples::<i8>()
                .map(|s| s.map(|v| (v as i16) << 8))
                .collect::<std::result::Result<_, _>>()?,
            (SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .collect::<std::result::Result<_, _>>()?,
            (SampleFormat::Int, bits @ (24 | 32)) => reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v >> (bits - 16)) as i16))
                .collect::<std::result::Result<_, _>>()?,
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(float_to_i16))
                .collect::<std::result::Result<_, _>>()?,
            (format, bits) => {
                return Err(TtsError::Audio(format!(
                    "unsupported WAV sample format: {:?}, {} bits",
                    format, bits
                )))
            }
        };

        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Закодировать в WAV 16 бит
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.samples.len() * 2));
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Количество кадров (семплов на канал)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        frames_to_duration(self.frames() as u64, self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Совпадают ли частота и число каналов
    pub fn same_format(&self, other: &PcmBuffer) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }

    /// Дописать другой буфер того же формата
    pub fn append(&mut self, other: &PcmBuffer) -> Result<()> {
        if !self.same_format(other) {
            return Err(TtsError::Audio(format!(
                "all chunks must share sample rate and channel count: {} Hz/{} ch vs {} Hz/{} ch",
                self.sample_rate, self.channels, other.sample_rate, other.channels
            )));
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    /// Дописать тишину
    pub fn append_silence(&mut self, duration: Duration) {
        let frames = (duration.as_secs_f64() * self.sample_rate as f64).round() as usize;
        self.samples
            .resize(self.samples.len() + frames * self.channels as usize, 0);
    }
}

fn float_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / sample_rate as f64)
}

/// Длительность WAV по заголовку, без декодирования семплов
pub fn wav_duration(bytes: &[u8]) -> Result<Duration> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    Ok(frames_to_duration(reader.duration() as u64, reader.spec().sample_rate))
}

/// Проверить, что байты являются корректным WAV до последнего семпла
pub fn validate_wav(bytes: &[u8]) -> Result<()> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let expected = reader.len() as usize * (spec.bits_per_sample as usize).div_ceil(8);
    let header_len = bytes.len().saturating_sub(expected);
    if header_len < 44 {
        return Err(TtsError::Audio(format!(
            "WAV payload truncated: {} bytes for {} samples",
            bytes.len(),
            reader.len()
        )));
    }
    Ok(())
}
