//! Контракт наблюдения и кооперативной отмены
//!
//! Движок вызывает хуки синхронно из рабочего потока задачи. Хуки только
//! наблюдают: корректность задачи от них не зависит.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::state::Stage;

/// Откуда взято аудио чанка
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkSource {
    Cache,
    Synthesized,
    /// Временная ошибка синтеза заменена тишиной
    Silence,
}

/// Наблюдатель задачи синтеза
pub trait PipelineHooks: Send + Sync {
    fn on_stage(&self, _stage: Stage) {}

    /// `done` из `total` чанков готово
    fn on_progress(&self, _done: usize, _total: usize) {}

    fn on_chunk_done(&self, _index: usize, _total: usize, _source: ChunkSource) {}

    /// Строка журнала задачи, уже очищенная от персональных данных
    fn on_log(&self, _line: &str) {}

    /// Проверяется не реже раза на границе чанков
    fn should_cancel(&self) -> bool {
        false
    }
}

/// Хуки, которые ничего не делают
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl PipelineHooks for NoopHooks {}

impl<H: PipelineHooks + ?Sized> PipelineHooks for Arc<H> {
    fn on_stage(&self, stage: Stage) {
        (**self).on_stage(stage)
    }

    fn on_progress(&self, done: usize, total: usize) {
        (**self).on_progress(done, total)
    }

    fn on_chunk_done(&self, index: usize, total: usize, source: ChunkSource) {
        (**self).on_chunk_done(index, total, source)
    }

    fn on_log(&self, line: &str) {
        (**self).on_log(line)
    }

    fn should_cancel(&self) -> bool {
        (**self).should_cancel()
    }
}

impl<H: PipelineHooks + ?Sized> PipelineHooks for Box<H> {
    fn on_stage(&self, stage: Stage) {
        (**self).on_stage(stage)
    }

    fn on_progress(&self, done: usize, total: usize) {
        (**self).on_progress(done, total)
    }

    fn on_chunk_done(&self, index: usize, total: usize, source: ChunkSource) {
        (**self).on_chunk_done(index, total, source)
    }

    fn on_log(&self, line: &str) {
        (**self).on_log(line)
    }

    fn should_cancel(&self) -> bool {
        (**self).should_cancel()
    }
}

/// Флаг отмены, разделяемый между вызывающей стороной и задачей
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Запросить отмену; вступает в силу на следующей границе чанков
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl PipelineHooks for CancellationToken {
    fn should_cancel(&self) -> bool {
        self.is_cancelled()
    }
}

/// Наблюдатель с дополнительным флагом отмены
pub struct CancellableHooks<H> {
    inner: H,
    token: CancellationToken,
}

impl<H: PipelineHooks> CancellableHooks<H> {
    pub fn new(inner: H, token: CancellationToken) -> Self {
        Self { inner, token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: PipelineHooks> PipelineHooks for CancellableHooks<H> {
    fn on_stage(&self, stage: Stage) {
        self.inner.on_stage(stage)
    }

    fn on_progress(&self, done: usize, total: usize) {
        self.inner.on_progress(done, total)
    }

    fn on_chunk_done(&self, index: usize, total: usize, source: ChunkSource) {
        self.inner.on_chunk_done(index, total, source)
    }

    fn on_log(&self, line: &str) {
        self.inner.on_log(line)
    }

    fn should_cancel(&self) -> bool {
        self.token.is_cancelled() || self.inner.should_cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.should_cancel());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(clone.should_cancel());
    }

    #[test]
    fn test_cancellable_hooks_combine_flags() {
        struct AlwaysCancel;
        impl PipelineHooks for AlwaysCancel {
            fn should_cancel(&self) -> bool {
                true
            }
        }

        let hooks = CancellableHooks::new(NoopHooks, CancellationToken::new());
        assert!(!hooks.should_cancel());
        hooks.token().cancel();
        assert!(hooks.should_cancel());

        let hooks = CancellableHooks::new(AlwaysCancel, CancellationToken::new());
        assert!(hooks.should_cancel());
    }
}
