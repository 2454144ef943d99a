use crate::outcome::Outcome;
use thiserror::Error;

/// Data problems that stop a pipeline run.
///
/// These are returned wrapped in an [`anyhow::Error`]; use `downcast_ref` to inspect them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("negative time to follow-up for {outcome} (patient {patient}: {days} days)")]
    NegativeTime {
        outcome: Outcome,
        patient: String,
        days: i64,
    },
    #[error("duplicate key \"{key}\" in {table}, expected at most one row per key")]
    DuplicateKey { table: &'static str, key: String },
    #[error("value {value} in column `{column}` has no mapping")]
    UnmappedValue { column: &'static str, value: i64 },
}
