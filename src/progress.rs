//! Модуль для расчета прогресса задачи
//!
//! По числу готовых чанков и прошедшему времени оценивает процент выполнения
//! и оставшееся время.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Снимок прогресса задачи
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub done: usize,
    pub total: usize,
    /// Процент выполнения (0.0 - 100.0)
    pub percent: f32,
    /// Сколько чанков осталось
    pub remaining: usize,
    pub elapsed: Duration,
    /// Оценка оставшегося времени, если готов хотя бы один чанк
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn compute(done: usize, total: usize, elapsed: Duration) -> Self {
        let done = done.min(total);
        let percent = if total == 0 {
            100.0
        } else {
            (done as f32 / total as f32 * 100.0).clamp(0.0, 100.0)
        };
        let eta = if done == 0 || total == 0 {
            None
        } else {
            let estimated_total = elapsed.as_secs_f64() / done as f64 * total as f64;
            Some(Duration::from_secs_f64(
                (estimated_total - elapsed.as_secs_f64()).max(0.0),
            ))
        };
        Self {
            done,
            total,
            percent,
            remaining: total - done,
            elapsed,
            eta,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }
}

/// Трекер прогресса, отсчитывающий время от создания
#[derive(Debug)]
pub struct ProgressTracker {
    started: Mutex<Instant>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(Instant::now()),
        }
    }

    /// Начать отсчет заново, например при старте задачи
    pub fn restart(&self) {
        if let Ok(mut started) = self.started.lock() {
            *started = Instant::now();
        }
    }

    pub fn snapshot(&self, done: usize, total: usize) -> ProgressSnapshot {
        let elapsed = self
            .started
            .lock()
            .map(|started| started.elapsed())
            .unwrap_or_default();
        ProgressSnapshot::compute(done, total, elapsed)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
