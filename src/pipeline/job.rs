//! Запуск задачи в отдельном рабочем потоке
//!
//! Вызывающая сторона получает `JobHandle`: флаг отмены, асинхронный канал
//! событий и результат задачи.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use crate::config::{JobId, SynthJobConfig};
use crate::error::{Result, TtsError};
use crate::notification::{ChannelHooks, CompositeHooks, PipelineEvent};
use crate::pipeline::engine::{JobFailure, JobOutcome, SynthesisPipeline};
use crate::pipeline::hooks::{CancellableHooks, CancellationToken, PipelineHooks};
use crate::pipeline::state::Stage;
use crate::synth::Synthesizer;
use crate::transcode::Transcoder;

type JobReturn = std::result::Result<JobOutcome, JobFailure>;

/// Запоминает последний этап, чтобы сообщить его при падении потока
#[derive(Clone)]
struct StageRecorder(Arc<Mutex<Stage>>);

impl StageRecorder {
    fn last(&self) -> Stage {
        self.0.lock().map(|s| *s).unwrap_or(Stage::Created)
    }
}

impl PipelineHooks for StageRecorder {
    fn on_stage(&self, stage: Stage) {
        if let Ok(mut last) = self.0.lock() {
            *last = stage;
        }
    }
}

/// Дескриптор запущенной задачи
pub struct JobHandle {
    job_id: JobId,
    token: CancellationToken,
    events: Option<mpsc::UnboundedReceiver<PipelineEvent>>,
    stages: StageRecorder,
    thread: JoinHandle<JobReturn>,
}

impl JobHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Запросить отмену; задача остановится на ближайшей границе чанков
    pub fn cancel(&self) {
        log::info!("Cancellation requested for job {}", self.job_id.short());
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Забрать приемник событий; второй вызов вернет `None`
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<PipelineEvent>> {
        self.events.take()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Дождаться завершения, блокируя текущий поток
    pub fn join(self) -> JobReturn {
        let stages = self.stages;
        self.thread.join().unwrap_or_else(|_| {
            Err(JobFailure {
                stage: stages.last(),
                error: TtsError::InvalidState("job worker thread panicked".to_string()),
            })
        })
    }

    /// Дождаться завершения из асинхронного кода
    pub async fn wait(self) -> JobReturn {
        let stages = self.stages.clone();
        match tokio::task::spawn_blocking(move || self.join()).await {
            Ok(result) => result,
            Err(e) => Err(JobFailure {
                stage: stages.last(),
                error: TtsError::InvalidState(format!("job join failed: {}", e)),
            }),
        }
    }
}

/// Запустить задачу в именованном рабочем потоке
///
/// `observer` вызывается в рабочем потоке; события дополнительно
/// передаются в канал, доступный через `JobHandle::events`.
pub fn spawn_job<S, T, H>(
    mut pipeline: SynthesisPipeline<S, T>,
    config: SynthJobConfig,
    observer: H,
) -> Result<JobHandle>
where
    S: Synthesizer + Send + 'static,
    T: Transcoder + Send + 'static,
    H: PipelineHooks + 'static,
{
    let job_id = config.job_id;
    let token = CancellationToken::new();
    let (channel, events) = ChannelHooks::channel();
    let stages = StageRecorder(Arc::new(Mutex::new(Stage::Created)));

    let hooks = CancellableHooks::new(
        CompositeHooks::new()
            .with(stages.clone())
            .with(channel)
            .with(observer),
        token.clone(),
    );

    let thread = thread::Builder::new()
        .name(format!("lk-tts-job-{}", job_id.short()))
        .spawn(move || pipeline.run(&config, &hooks))
        .map_err(TtsError::Io)?;

    Ok(JobHandle {
        job_id,
        token,
        events: Some(events),
        stages,
        thread,
    })
}
