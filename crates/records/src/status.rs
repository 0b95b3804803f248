//! Record lifecycle status and the transition guards around it.
//!
//! The visible lifecycle of a record is:
//!
//! ```text
//! Pending -> Processing -> Completed
//!                |  ^
//!                v  |
//!          RetryScheduled        (another attempt is coming)
//!                |
//!                v
//!             Failed             (attempts exhausted, permanent)
//! ```
//!
//! `Completed` and `Failed` are terminal. Repeating the current status is a
//! safe no-op so that a redelivered job can re-run its status writes without
//! corrupting the record.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use dealbrief_core::DomainError;

/// Which of the two record tables an operation addresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Transcript,
    LinkedInInsight,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Transcript => "transcript",
            RecordKind::LinkedInInsight => "linkedin_insight",
        }
    }
}

impl core::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a record.
///
/// `RetryScheduled` is distinct from `Failed` so that pollers can tell
/// "another attempt is pending" apart from "permanently failed".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Created, not yet picked up by a worker.
    Pending,
    /// A worker is executing the current attempt.
    Processing,
    /// The last attempt failed; a retry is scheduled.
    RetryScheduled,
    /// Terminal: result is present.
    Completed,
    /// Terminal: attempts exhausted, no result.
    Failed,
}

/// Outcome of applying a status write against the current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusWrite {
    /// The transition was valid and applied.
    Applied,
    /// The record is already in the requested status; nothing changed
    /// (timestamps may still be refreshed by the store).
    Idempotent,
    /// The write was rejected; the record is already in the returned
    /// (terminal or incompatible) status.
    Superseded(RecordStatus),
}

impl StatusWrite {
    /// Whether the record ended up in the requested status.
    pub fn took_effect(&self) -> bool {
        matches!(self, StatusWrite::Applied | StatusWrite::Idempotent)
    }
}

impl RecordStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Completed | RecordStatus::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Identical-status writes are not "transitions"; see [`RecordStatus::apply`].
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, RetryScheduled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (RetryScheduled, Processing)
        )
    }

    /// Evaluate a requested status write against the current status.
    ///
    /// This is the single authority stores consult before mutating a row.
    pub fn apply(&self, next: RecordStatus) -> StatusWrite {
        if *self == next {
            return StatusWrite::Idempotent;
        }
        if self.can_transition_to(next) {
            return StatusWrite::Applied;
        }
        StatusWrite::Superseded(*self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Processing => "processing",
            RecordStatus::RetryScheduled => "retry_scheduled",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
        }
    }
}

impl core::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecordStatus::Pending),
            "processing" => Ok(RecordStatus::Processing),
            "retry_scheduled" => Ok(RecordStatus::RetryScheduled),
            "completed" => Ok(RecordStatus::Completed),
            "failed" => Ok(RecordStatus::Failed),
            other => Err(DomainError::validation(format!(
                "unknown record status: {other}"
            ))),
        }
    }
}
