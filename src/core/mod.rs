//! Core pipeline: dataset processing, thinning, prompts, refresh gating,
//! and the per-target executor.

pub mod dataset;
pub mod executor;
pub mod http;
pub mod logging;
pub mod prompts;
pub mod refresh;
pub mod thin;

pub use dataset::{
    HourBlock, MemberRecord, ProcessedDay, build_processed_days, dataset_preview,
    format_dataset_text,
};
pub use executor::{
    CancelFlag, DEFAULT_CONCURRENCY, Executor, ForecastResult, ForecastTarget, ResultSource,
    RunSummary, TargetKind, TaskOutcome, TaskState,
};
pub use refresh::{RefreshGate, target_settings_hash};
pub use thin::{member_labels, thin_indices};
