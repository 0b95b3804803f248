//! Record persistence: the durable side of the job lifecycle.
//!
//! The API layer writes records once, at creation; every later mutation goes
//! through the lifecycle manager via the status-write operations here. The
//! operations return a [`StatusWrite`] outcome so callers can distinguish an
//! applied transition from an idempotent repeat or a rejected write over a
//! terminal state.

use async_trait::async_trait;

use dealbrief_core::RecordId;
use dealbrief_records::{
    LinkedInInsightRecord, NewLinkedInInsight, NewTranscript, RecordKind, RecordStatus,
    StatusWrite, TranscriptRecord,
};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;

/// Record store error.
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("record not found: {0}")]
    NotFound(RecordId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Persistence for the two record kinds.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_transcript(
        &self,
        input: NewTranscript,
    ) -> Result<TranscriptRecord, RecordStoreError>;

    async fn get_transcript(
        &self,
        id: RecordId,
    ) -> Result<Option<TranscriptRecord>, RecordStoreError>;

    /// All transcripts, newest first.
    async fn list_transcripts(&self) -> Result<Vec<TranscriptRecord>, RecordStoreError>;

    async fn insert_linkedin(
        &self,
        input: NewLinkedInInsight,
    ) -> Result<LinkedInInsightRecord, RecordStoreError>;

    async fn get_linkedin(
        &self,
        id: RecordId,
    ) -> Result<Option<LinkedInInsightRecord>, RecordStoreError>;

    /// All LinkedIn insights, newest first.
    async fn list_linkedin(&self) -> Result<Vec<LinkedInInsightRecord>, RecordStoreError>;

    /// Write a bare status transition, guarded by the state machine.
    ///
    /// Identical-status writes refresh `updated_at` and report
    /// [`StatusWrite::Idempotent`]; illegal transitions leave the row
    /// untouched and report [`StatusWrite::Superseded`].
    async fn set_status(
        &self,
        kind: RecordKind,
        id: RecordId,
        status: RecordStatus,
    ) -> Result<StatusWrite, RecordStoreError>;

    /// Write the result and `Completed` in one atomic update, so the store
    /// can never show `Completed` with a null result.
    async fn complete(
        &self,
        kind: RecordKind,
        id: RecordId,
        result_text: &str,
    ) -> Result<StatusWrite, RecordStoreError>;
}
