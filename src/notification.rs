//! Модуль с готовыми наблюдателями задачи
//!
//! Все наблюдатели реализуют `PipelineHooks` и могут объединяться через
//! `CompositeHooks`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::pipeline::hooks::{ChunkSource, PipelineHooks};
use crate::pipeline::state::Stage;
use crate::progress::ProgressTracker;

/// Событие задачи для асинхронных потребителей
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    Stage { stage: Stage },
    Progress { done: usize, total: usize },
    ChunkDone { index: usize, total: usize, source: ChunkSource },
    Log { message: String },
}

/// Наблюдатель, выводящий этапы и прогресс в консоль
pub struct ConsoleHooks {
    /// Префикс для вывода (опционально)
    prefix: Option<String>,
    tracker: ProgressTracker,
}

impl ConsoleHooks {
    pub fn new() -> Self {
        Self {
            prefix: None,
            tracker: ProgressTracker::new(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            tracker: ProgressTracker::new(),
        }
    }

    fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

impl Default for ConsoleHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineHooks for ConsoleHooks {
    fn on_stage(&self, stage: Stage) {
        if stage == Stage::LoadingInput {
            self.tracker.restart();
        }
        println!("{}[stage] {}", self.prefix(), stage);
    }

    fn on_progress(&self, done: usize, total: usize) {
        let snapshot = self.tracker.snapshot(done, total);
        let eta = snapshot
            .eta
            .map(|eta| format!(", eta {:.1}s", eta.as_secs_f64()))
            .unwrap_or_default();
        println!(
            "{}[progress] {}/{} ({:.0}%), remaining {}{}",
            self.prefix(),
            done,
            total,
            snapshot.percent,
            snapshot.remaining,
            eta
        );
    }

    fn on_log(&self, line: &str) {
        println!("{}{}", self.prefix(), line);
    }
}

/// Наблюдатель, рисующий прогресс-бар в stderr
pub struct ProgressBarHooks {
    width: usize,
    /// Последний отображенный процент
    last_percent: Mutex<f32>,
    tracker: ProgressTracker,
}

impl ProgressBarHooks {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            last_percent: Mutex::new(-1.0),
            tracker: ProgressTracker::new(),
        }
    }

    fn render(&self, done: usize, total: usize) -> String {
        let snapshot = self.tracker.snapshot(done, total);
        let filled = ((snapshot.percent / 100.0) * self.width as f32) as usize;
        let empty = self.width.saturating_sub(filled);
        let eta = snapshot
            .eta
            .map(|eta| format!(" eta {:.0}s", eta.as_secs_f64()))
            .unwrap_or_default();
        format!(
            "[{}{}] {:>5.1}% {}/{}{}",
            "=".repeat(filled),
            " ".repeat(empty),
            snapshot.percent,
            done,
            total,
            eta
        )
    }
}

impl Default for ProgressBarHooks {
    fn default() -> Self {
        Self::new(40)
    }
}

impl PipelineHooks for ProgressBarHooks {
    fn on_stage(&self, stage: Stage) {
        match stage {
            Stage::LoadingInput => self.tracker.restart(),
            Stage::Completed | Stage::Cancelled | Stage::Failed => eprintln!(),
            _ => {}
        }
    }

    fn on_progress(&self, done: usize, total: usize) {
        let percent = if total == 0 { 100.0 } else { done as f32 / total as f32 * 100.0 };
        let Ok(mut last) = self.last_percent.lock() else {
            return;
        };
        // Перерисовываем только при изменении хотя бы на 1% или в конце
        if *last < 0.0 || (percent - *last).abs() >= 1.0 || done == total {
            *last = percent;
            eprint!("\r{}", self.render(done, total));
            let _ = std::io::stderr().flush();
        }
    }
}

/// Записанный вызов хука
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Stage(Stage),
    Progress(usize, usize),
    ChunkDone(usize, usize, ChunkSource),
    Log(String),
}

/// Наблюдатель, сохраняющий события в памяти
#[derive(Clone, Default)]
pub struct MemoryHooks {
    history: Arc<Mutex<Vec<RecordedEvent>>>,
    /// Запросить отмену после стольких готовых чанков
    cancel_after: Option<usize>,
}

impl MemoryHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Наблюдатель, запрашивающий отмену после `chunks` готовых чанков
    pub fn cancel_after(chunks: usize) -> Self {
        Self {
            history: Arc::default(),
            cancel_after: Some(chunks),
        }
    }

    pub fn history(&self) -> Vec<RecordedEvent> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn clear_history(&self) {
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.history()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Stage(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.history()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Progress(done, total) => Some((done, total)),
                _ => None,
            })
            .collect()
    }

    pub fn chunks_done(&self) -> Vec<(usize, ChunkSource)> {
        self.history()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::ChunkDone(index, _, source) => Some((index, source)),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.history()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Log(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: RecordedEvent) {
        if let Ok(mut history) = self.history.lock() {
            history.push(event);
        }
    }
}

impl PipelineHooks for MemoryHooks {
    fn on_stage(&self, stage: Stage) {
        self.record(RecordedEvent::Stage(stage));
    }

    fn on_progress(&self, done: usize, total: usize) {
        self.record(RecordedEvent::Progress(done, total));
    }

    fn on_chunk_done(&self, index: usize, total: usize, source: ChunkSource) {
        self.record(RecordedEvent::ChunkDone(index, total, source));
    }

    fn on_log(&self, line: &str) {
        self.record(RecordedEvent::Log(line.to_string()));
    }

    fn should_cancel(&self) -> bool {
        match self.cancel_after {
            Some(limit) => self.chunks_done().len() >= limit,
            None => false,
        }
    }
}

/// Наблюдатель, вызывающий функцию для каждого события
pub struct CallbackHooks<F>
where
    F: Fn(PipelineEvent) + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackHooks<F>
where
    F: Fn(PipelineEvent) + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> PipelineHooks for CallbackHooks<F>
where
    F: Fn(PipelineEvent) + Send + Sync + 'static,
{
    fn on_stage(&self, stage: Stage) {
        (self.callback)(PipelineEvent::Stage { stage });
    }

    fn on_progress(&self, done: usize, total: usize) {
        (self.callback)(PipelineEvent::Progress { done, total });
    }

    fn on_chunk_done(&self, index: usize, total: usize, source: ChunkSource) {
        (self.callback)(PipelineEvent::ChunkDone { index, total, source });
    }

    fn on_log(&self, line: &str) {
        (self.callback)(PipelineEvent::Log {
            message: line.to_string(),
        });
    }
}

/// Наблюдатель, передающий события в канал Tokio
///
/// Отправка не блокирует рабочий поток; закрытый приемник не ошибка.
#[derive(Clone)]
pub struct ChannelHooks {
    sender: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelHooks {
    pub fn new(sender: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self { sender }
    }

    /// Создать наблюдатель вместе с приемником событий
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }
}

impl PipelineHooks for ChannelHooks {
    fn on_stage(&self, stage: Stage) {
        self.send(PipelineEvent::Stage { stage });
    }

    fn on_progress(&self, done: usize, total: usize) {
        self.send(PipelineEvent::Progress { done, total });
    }

    fn on_chunk_done(&self, index: usize, total: usize, source: ChunkSource) {
        self.send(PipelineEvent::ChunkDone { index, total, source });
    }

    fn on_log(&self, line: &str) {
        self.send(PipelineEvent::Log {
            message: line.to_string(),
        });
    }
}

/// Наблюдатель, дописывающий события в текстовый файл
pub struct FileLogHooks {
    file_path: PathBuf,
}

impl FileLogHooks {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    fn append(&self, line: &str) {
        let entry = format!(
            "[{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            line
        );
        match OpenOptions::new().create(true).append(true).open(&self.file_path) {
            Ok(mut file) => {
                let _ = file.write_all(entry.as_bytes());
            }
            Err(e) => log::warn!("Failed to open {}: {}", self.file_path.display(), e),
        }
    }
}

impl PipelineHooks for FileLogHooks {
    fn on_stage(&self, stage: Stage) {
        self.append(&format!("stage {}", stage));
    }

    fn on_progress(&self, done: usize, total: usize) {
        self.append(&format!("progress {}/{}", done, total));
    }

    fn on_chunk_done(&self, index: usize, total: usize, source: ChunkSource) {
        self.append(&format!("chunk {}/{} {:?}", index + 1, total, source));
    }

    fn on_log(&self, line: &str) {
        self.append(&format!("log {}", line));
    }
}

/// Наблюдатель, объединяющий несколько наблюдателей
///
/// Отмена запрашивается, если ее запросил любой из вложенных наблюдателей.
#[derive(Default)]
pub struct CompositeHooks {
    hooks: Vec<Box<dyn PipelineHooks>>,
}

impl CompositeHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, hooks: Box<dyn PipelineHooks>) {
        self.hooks.push(hooks);
    }

    pub fn with(mut self, hooks: impl PipelineHooks + 'static) -> Self {
        self.add(Box::new(hooks));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl PipelineHooks for CompositeHooks {
    fn on_stage(&self, stage: Stage) {
        for hooks in &self.hooks {
            hooks.on_stage(stage);
        }
    }

    fn on_progress(&self, done: usize, total: usize) {
        for hooks in &self.hooks {
            hooks.on_progress(done, total);
        }
    }

    fn on_chunk_done(&self, index: usize, total: usize, source: ChunkSource) {
        for hooks in &self.hooks {
            hooks.on_chunk_done(index, total, source);
        }
    }

    fn on_log(&self, line: &str) {
        for hooks in &self.hooks {
            hooks.on_log(line);
        }
    }

    fn should_cancel(&self) -> bool {
        self.hooks.iter().any(|hooks| hooks.should_cancel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_console_hooks() {
        let hooks = ConsoleHooks::with_prefix("[Test] ");
        // Проверяем только, что вывод не паникует
        hooks.on_stage(Stage::LoadingInput);
        hooks.on_progress(1, 2);
    }

    #[test]
    fn test_progress_bar_render() {
        let hooks = ProgressBarHooks::new(10);
        let bar = hooks.render(1, 2);
        assert!(bar.starts_with("[=====     ]"));
        assert!(bar.contains("1/2"));
        hooks.on_progress(2, 2);
    }

    #[test]
    fn test_memory_hooks() {
        let hooks = MemoryHooks::new();
        hooks.on_stage(Stage::Chunking);
        hooks.on_progress(1, 2);
        hooks.on_chunk_done(0, 2, ChunkSource::Cache);
        hooks.on_log("Chunks: 2");

        assert_eq!(hooks.stages(), vec![Stage::Chunking]);
        assert_eq!(hooks.logs(), vec!["Chunks: 2".to_string()]);
        assert_eq!(hooks.progress(), vec![(1, 2)]);
        assert_eq!(hooks.chunks_done(), vec![(0, ChunkSource::Cache)]);

        hooks.clear_history();
        assert!(hooks.history().is_empty());
    }

    #[test]
    fn test_memory_hooks_cancel_after() {
        let hooks = MemoryHooks::cancel_after(1);
        assert!(!hooks.should_cancel());
        hooks.on_chunk_done(0, 3, ChunkSource::Synthesized);
        assert!(hooks.should_cancel());
    }

    #[test]
    fn test_callback_hooks() {
        let counter = Arc::new(Mutex::new(0));
        let counter_clone = counter.clone();
        let hooks = CallbackHooks::new(move |_| {
            *counter_clone.lock().unwrap() += 1;
        });

        hooks.on_stage(Stage::Chunking);
        hooks.on_progress(1, 1);
        assert_eq!(*counter.lock().unwrap(), 2);
    }

    #[test]
    fn test_channel_hooks() {
        let (hooks, mut rx) = ChannelHooks::channel();
        hooks.on_progress(1, 3);
        hooks.on_chunk_done(0, 3, ChunkSource::Synthesized);
        assert_eq!(rx.try_recv().unwrap(), PipelineEvent::Progress { done: 1, total: 3 });
        assert!(matches!(rx.try_recv().unwrap(), PipelineEvent::ChunkDone { index: 0, .. }));
        hooks.on_log("Input length: 5 chars");
        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::Log {
                message: "Input length: 5 chars".to_string()
            }
        );

        drop(rx);
        // Закрытый приемник не приводит к панике
        hooks.on_stage(Stage::Completed);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&PipelineEvent::Stage { stage: Stage::ChunkSynth }).unwrap();
        assert_eq!(json, r#"{"event":"stage","stage":"chunk_synth"}"#);

        let json = serde_json::to_string(&PipelineEvent::Log { message: "Chunks: 3".into() }).unwrap();
        assert_eq!(json, r#"{"event":"log","message":"Chunks: 3"}"#);
    }

    #[test]
    fn test_file_log_hooks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.log");
        let hooks = FileLogHooks::new(&path);
        hooks.on_stage(Stage::Chunking);
        hooks.on_chunk_done(0, 2, ChunkSource::Cache);
        hooks.on_log("Chunks: 2");

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("stage chunking"));
        assert!(content.contains("chunk 1/2 Cache"));
        assert!(content.contains("log Chunks: 2"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_composite_hooks() {
        let memory = MemoryHooks::new();
        let counter = Arc::new(Mutex::new(0));
        let counter_clone = counter.clone();

        let composite = CompositeHooks::new()
            .with(memory.clone())
            .with(CallbackHooks::new(move |_| {
                *counter_clone.lock().unwrap() += 1;
            }));
        assert_eq!(composite.len(), 2);

        composite.on_progress(1, 1);
        composite.on_log("Chunks: 1");
        assert_eq!(memory.progress(), vec![(1, 1)]);
        assert_eq!(memory.logs(), vec!["Chunks: 1".to_string()]);
        assert_eq!(*counter.lock().unwrap(), 2);
        assert!(!composite.should_cancel());

        let composite = composite.with(MemoryHooks::cancel_after(0));
        assert!(composite.should_cancel());
    }
}
