//! Этапы задачи и допустимые переходы между ними

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsError};

/// Этап задачи синтеза
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Created,
    LoadingInput,
    Chunking,
    ChunkSynth,
    Finalising,
    Completed,
    Cancelled,
    Failed,
}

impl Stage {
    /// Имя этапа в виде строки
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::LoadingInput => "loading_input",
            Self::Chunking => "chunking",
            Self::ChunkSynth => "chunk_synth",
            Self::Finalising => "finalising",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Можно ли перейти из этого этапа в `next`
    pub fn can_transition_to(&self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Created, LoadingInput) => true,
            (LoadingInput, Chunking) => true,
            (Chunking, ChunkSynth) => true,
            (ChunkSynth, Finalising) => true,
            (Finalising, Completed) => true,
            (LoadingInput | Chunking | ChunkSynth | Finalising, Cancelled | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Текущее состояние задачи с историей пройденных этапов
#[derive(Debug, Clone)]
pub struct JobState {
    history: Vec<Stage>,
}

impl JobState {
    pub fn new() -> Self {
        Self {
            history: vec![Stage::Created],
        }
    }

    pub fn stage(&self) -> Stage {
        *self.history.last().unwrap_or(&Stage::Created)
    }

    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Перейти в следующий этап
    pub fn transition(&mut self, next: Stage) -> Result<()> {
        let current = self.stage();
        if !current.can_transition_to(next) {
            return Err(TtsError::InvalidState(format!("{} -> {}", current, next)));
        }
        self.history.push(next);
        Ok(())
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}
