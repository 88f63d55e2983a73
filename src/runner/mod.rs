//! Pipeline orchestration.
//!
//! - [`Pipeline`] - Step lists validated so every input is produced earlier
//! - [`PipelineRunner`] - Runs a pipeline and reports a [`RunResult`]
//! - [`PropagationWaiter`] - Pause and bounded retry for principal propagation
//! - [`report`] - Plain-text run summaries

pub mod pipeline;
pub mod propagation;
pub mod report;
pub mod sequencer;

pub use pipeline::Pipeline;
pub use propagation::{
    decide_retry, PropagationPolicy, PropagationWaiter, RecordingSleeper, RetryDecision, Sleeper,
    StopReason, ThreadSleeper,
};
pub use report::{headline, run_sections, Section};
pub use sequencer::{PipelineRunner, RunOptions, RunProgress, RunResult, RunState};
