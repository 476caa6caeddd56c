//! Транскодирование через FFmpeg
//!
//! Аудио передается через stdin/stdout, временные файлы не создаются.

use std::io::Cursor;
use std::process::Command;

use crate::config::OutputFormat;
use crate::error::{Result, TranscodeError, TtsError};
use crate::transcode::{TranscodeRequest, Transcoder};
use crate::utils::process::{pipe_through, stderr_tail};

const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Найти FFmpeg: явный путь, затем поиск в PATH, иначе просто `ffmpeg`
pub fn resolve_ffmpeg_bin(candidate: Option<&str>) -> String {
    if let Some(bin) = candidate.map(str::trim).filter(|b| !b.is_empty()) {
        return bin.to_string();
    }
    match which::which(DEFAULT_FFMPEG) {
        Ok(path) => path.to_string_lossy().to_string(),
        Err(_) => DEFAULT_FFMPEG.to_string(),
    }
}

/// Проверка наличия FFmpeg
pub fn check_installed(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Получение версии FFmpeg (первая строка `-version`)
pub fn version(bin: &str) -> Result<String> {
    let output = Command::new(bin).arg("-version").output()?;
    if !output.status.success() {
        return Err(TtsError::Configuration(format!(
            "Failed to get FFmpeg version from {}",
            bin
        )));
    }
    let version_str = String::from_utf8_lossy(&output.stdout);
    Ok(version_str.lines().next().unwrap_or("").to_string())
}

/// Цепочка фильтров atempo; один фильтр принимает множитель от 0.5 до 2.0
fn atempo_chain(speed: f32) -> String {
    let mut remaining = speed as f64;
    let mut filters = Vec::new();
    while remaining > 2.0 {
        filters.push("atempo=2.0".to_string());
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        filters.push("atempo=0.5".to_string());
        remaining /= 0.5;
    }
    filters.push(format!("atempo={:.4}", remaining));
    filters.join(",")
}

fn container(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Wav => "wav",
        OutputFormat::Ogg => "ogg",
        OutputFormat::Mp3 => "mp3",
    }
}

fn wav_sample_rate(wav: &[u8]) -> Option<u32> {
    hound::WavReader::new(Cursor::new(wav))
        .ok()
        .map(|reader| reader.spec().sample_rate)
}

/// Транскодер на основе FFmpeg
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    bin: String,
    /// Применять скорость фильтром atempo
    tempo: bool,
}

impl FfmpegTranscoder {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            tempo: false,
        }
    }

    /// Применять скорость речи на этапе транскодирования
    ///
    /// По умолчанию скорость задается модели, и повторно ее применять не нужно.
    pub fn with_tempo(mut self, tempo: bool) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    fn needs_tempo(&self, request: &TranscodeRequest) -> bool {
        self.tempo && (request.speed - 1.0).abs() > f32::EPSILON
    }

    fn build_args(&self, request: &TranscodeRequest) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-f", "wav", "-i", "pipe:0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if self.needs_tempo(request) {
            args.push("-filter:a".to_string());
            args.push(atempo_chain(request.speed));
        }
        args.extend([
            "-ar".to_string(),
            request.sample_rate.to_string(),
            "-c:a".to_string(),
            request.format.codec().to_string(),
            "-f".to_string(),
            container(request.format).to_string(),
            "pipe:1".to_string(),
        ]);
        args
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, wav: &[u8], request: &TranscodeRequest) -> std::result::Result<Vec<u8>, TranscodeError> {
        if request.format == OutputFormat::Wav
            && !self.needs_tempo(request)
            && wav_sample_rate(wav) == Some(request.sample_rate)
        {
            log::debug!("WAV output at source rate, skipping FFmpeg");
            return Ok(wav.to_vec());
        }

        let args = self.build_args(request);
        log::debug!("Running {} {}", self.bin, args.join(" "));
        let output = pipe_through(Command::new(&self.bin).args(&args), wav)
            .map_err(|e| TranscodeError(format!("Failed to run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            return Err(TranscodeError(format!(
                "FFmpeg exited with {}: {}",
                output.status,
                stderr_tail(&output)
            )));
        }
        if output.stdout.is_empty() {
            return Err(TranscodeError("FFmpeg produced no output".to_string()));
        }
        Ok(output.stdout)
    }
}
