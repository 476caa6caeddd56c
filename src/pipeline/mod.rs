//! Конвейер задачи синтеза: этапы, хуки, движок и запуск в рабочем потоке

pub mod engine;
pub mod hooks;
pub mod job;
pub mod output;
pub mod state;

pub use engine::{estimate_duration, JobFailure, JobOutcome, JobResult, SynthesisPipeline};
pub use hooks::{CancellableHooks, CancellationToken, ChunkSource, NoopHooks, PipelineHooks};
pub use job::{spawn_job, JobHandle};
pub use output::{sidecar_path, OutputMetadata};
pub use state::{JobState, Stage};
