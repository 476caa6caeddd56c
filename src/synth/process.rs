//! Синтез через внешний процесс, запускающий модель
//!
//! Процесс получает текст в stdin и пишет WAV в stdout:
//!
//! ```text
//! <runner> --model <dir> --speed <s> --sample-rate <sr>
//! ```
//!
//! Код выхода 75 (EX_TEMPFAIL) означает временную ошибку.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::audio::validate_wav;
use crate::error::{Result, SynthesisError, TtsError};
use crate::synth::{SynthRequest, Synthesizer};
use crate::utils::process::{pipe_through, stderr_tail};

/// Код выхода, сообщающий о временной ошибке
pub const EXIT_TEMPFAIL: i32 = 75;

const MODEL_CONFIG: &str = "config.json";
const CHECKPOINT_EXTENSIONS: [&str; 2] = ["pth", "pt"];

/// Проверить каталог модели: `config.json` и хотя бы один чекпойнт
pub fn validate_model_dir(model_path: &Path) -> Result<()> {
    if !model_path.is_dir() {
        return Err(TtsError::Configuration(format!(
            "Model directory not found: {}",
            model_path.display()
        )));
    }
    if !model_path.join(MODEL_CONFIG).is_file() {
        return Err(TtsError::Configuration(format!(
            "Model directory {} has no {}",
            model_path.display(),
            MODEL_CONFIG
        )));
    }

    let has_checkpoint = fs::read_dir(model_path)?.filter_map(|e| e.ok()).any(|entry| {
        entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| CHECKPOINT_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    });
    if !has_checkpoint {
        return Err(TtsError::Configuration(format!(
            "Model directory {} has no checkpoint (*.pth or *.pt)",
            model_path.display()
        )));
    }
    Ok(())
}

/// Синтезатор, вызывающий внешний исполняемый файл на каждый чанк
#[derive(Debug, Clone)]
pub struct ProcessSynthesizer {
    runner: PathBuf,
    /// Аргументы перед `--model`, например скрипт для интерпретатора
    runner_args: Vec<String>,
    model_path: PathBuf,
    model_id: String,
}

impl ProcessSynthesizer {
    /// Создать синтезатор, проверив каталог модели
    ///
    /// Путь модели приводится к каноническому виду, так что разные записи
    /// одного каталога дают один идентификатор модели.
    pub fn new(runner: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Result<Self> {
        let model_path = model_path.into();
        validate_model_dir(&model_path)?;
        let model_path = fs::canonicalize(&model_path).map_err(|e| {
            TtsError::Configuration(format!(
                "Cannot resolve model directory {}: {}",
                model_path.display(),
                e
            ))
        })?;
        let runner = runner.into();
        log::info!(
            "Using model {} via {}",
            model_path.display(),
            runner.display()
        );
        Ok(Self {
            model_id: model_path.to_string_lossy().to_string(),
            runner,
            runner_args: Vec::new(),
            model_path,
        })
    }

    pub fn with_runner_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.runner_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self, request: &SynthRequest<'_>) -> Command {
        let mut cmd = Command::new(&self.runner);
        cmd.args(&self.runner_args)
            .arg("--model")
            .arg(&self.model_path)
            .args(["--speed", &request.speed.to_string()])
            .args(["--sample-rate", &request.sample_rate.to_string()]);
        cmd
    }
}

impl Synthesizer for ProcessSynthesizer {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn model_path(&self) -> Option<&Path> {
        Some(&self.model_path)
    }

    fn synthesize(&mut self, request: &SynthRequest<'_>) -> std::result::Result<Vec<u8>, SynthesisError> {
        let output = pipe_through(&mut self.command(request), request.text.as_bytes()).map_err(|e| {
            SynthesisError::fatal(format!("Failed to run {}: {}", self.runner.display(), e))
        })?;

        match output.status.code() {
            Some(0) => {}
            Some(EXIT_TEMPFAIL) => {
                return Err(SynthesisError::transient(format!(
                    "runner reported a temporary failure: {}",
                    stderr_tail(&output)
                )))
            }
            _ => {
                return Err(SynthesisError::fatal(format!(
                    "runner exited with {}: {}",
                    output.status,
                    stderr_tail(&output)
                )))
            }
        }

        validate_wav(&output.stdout)
            .map_err(|e| SynthesisError::fatal(format!("runner produced invalid audio: {}", e)))?;
        Ok(output.stdout)
    }
}
