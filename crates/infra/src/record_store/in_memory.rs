//! In-memory record store for dev and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use dealbrief_core::RecordId;
use dealbrief_records::{
    LinkedInInsightRecord, NewLinkedInInsight, NewTranscript, RecordKind, RecordStatus,
    StatusWrite, TranscriptRecord,
};

use super::{RecordStore, RecordStoreError};

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    transcripts: RwLock<HashMap<RecordId, TranscriptRecord>>,
    linkedin: RwLock<HashMap<RecordId, LinkedInInsightRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Apply a guarded status write to one record's (status, result) pair.
///
/// Runs inside the map's write lock, so the result+status pair of a
/// completion is updated in one critical section.
fn apply_status(
    status: &mut RecordStatus,
    result: &mut Option<String>,
    updated_at: &mut chrono::DateTime<Utc>,
    next: RecordStatus,
    result_text: Option<&str>,
) -> StatusWrite {
    let outcome = status.apply(next);
    match outcome {
        StatusWrite::Applied => {
            if let Some(text) = result_text {
                *result = Some(text.to_string());
            }
            *status = next;
            *updated_at = Utc::now();
        }
        StatusWrite::Idempotent => {
            *updated_at = Utc::now();
        }
        StatusWrite::Superseded(_) => {}
    }
    outcome
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert_transcript(
        &self,
        input: NewTranscript,
    ) -> Result<TranscriptRecord, RecordStoreError> {
        let record = TranscriptRecord::create(input);
        self.transcripts
            .write()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_transcript(
        &self,
        id: RecordId,
    ) -> Result<Option<TranscriptRecord>, RecordStoreError> {
        Ok(self.transcripts.read().unwrap().get(&id).cloned())
    }

    async fn list_transcripts(&self) -> Result<Vec<TranscriptRecord>, RecordStoreError> {
        let mut all: Vec<_> = self.transcripts.read().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn insert_linkedin(
        &self,
        input: NewLinkedInInsight,
    ) -> Result<LinkedInInsightRecord, RecordStoreError> {
        let record = LinkedInInsightRecord::create(input);
        self.linkedin
            .write()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_linkedin(
        &self,
        id: RecordId,
    ) -> Result<Option<LinkedInInsightRecord>, RecordStoreError> {
        Ok(self.linkedin.read().unwrap().get(&id).cloned())
    }

    async fn list_linkedin(&self) -> Result<Vec<LinkedInInsightRecord>, RecordStoreError> {
        let mut all: Vec<_> = self.linkedin.read().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn set_status(
        &self,
        kind: RecordKind,
        id: RecordId,
        status: RecordStatus,
    ) -> Result<StatusWrite, RecordStoreError> {
        match kind {
            RecordKind::Transcript => {
                let mut map = self.transcripts.write().unwrap();
                let rec = map.get_mut(&id).ok_or(RecordStoreError::NotFound(id))?;
                Ok(apply_status(
                    &mut rec.status,
                    &mut rec.insight_result,
                    &mut rec.updated_at,
                    status,
                    None,
                ))
            }
            RecordKind::LinkedInInsight => {
                let mut map = self.linkedin.write().unwrap();
                let rec = map.get_mut(&id).ok_or(RecordStoreError::NotFound(id))?;
                Ok(apply_status(
                    &mut rec.status,
                    &mut rec.icebreaker_result,
                    &mut rec.updated_at,
                    status,
                    None,
                ))
            }
        }
    }

    async fn complete(
        &self,
        kind: RecordKind,
        id: RecordId,
        result_text: &str,
    ) -> Result<StatusWrite, RecordStoreError> {
        match kind {
            RecordKind::Transcript => {
                let mut map = self.transcripts.write().unwrap();
                let rec = map.get_mut(&id).ok_or(RecordStoreError::NotFound(id))?;
                Ok(apply_status(
                    &mut rec.status,
                    &mut rec.insight_result,
                    &mut rec.updated_at,
                    RecordStatus::Completed,
                    Some(result_text),
                ))
            }
            RecordKind::LinkedInInsight => {
                let mut map = self.linkedin.write().unwrap();
                let rec = map.get_mut(&id).ok_or(RecordStoreError::NotFound(id))?;
                Ok(apply_status(
                    &mut rec.status,
                    &mut rec.icebreaker_result,
                    &mut rec.updated_at,
                    RecordStatus::Completed,
                    Some(result_text),
                ))
            }
        }
    }
}
