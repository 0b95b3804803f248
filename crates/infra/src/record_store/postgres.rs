//! Postgres-backed record store.
//!
//! ## Concurrency
//!
//! Status transitions are guarded in SQL: the `UPDATE` only matches rows
//! whose current status is a legal predecessor of the requested one, so the
//! per-row atomicity of the database enforces the state machine without any
//! application-side locking. `complete` writes result and status in a single
//! statement, so the store can never show `Completed` with a null result.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use dealbrief_core::RecordId;
use dealbrief_records::{
    LinkedInInsightRecord, NewLinkedInInsight, NewTranscript, RecordKind, RecordStatus,
    StatusWrite, TranscriptRecord,
};

use super::{RecordStore, RecordStoreError};

pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the record tables if they do not exist.
    pub async fn migrate(&self) -> Result<(), RecordStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transcripts (
                id              UUID PRIMARY KEY,
                company_name    TEXT NOT NULL,
                attendees       JSONB NOT NULL,
                date            DATE NOT NULL,
                transcript_text TEXT NOT NULL,
                insight_result  TEXT NULL,
                status          TEXT NOT NULL,
                created_at      TIMESTAMPTZ NOT NULL,
                updated_at      TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS linkedin_insights (
                id                 UUID PRIMARY KEY,
                linkedin_bio       TEXT NOT NULL,
                pitch_deck_content TEXT NOT NULL,
                icebreaker_result  TEXT NULL,
                status             TEXT NOT NULL,
                created_at         TIMESTAMPTZ NOT NULL,
                updated_at         TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    fn table(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Transcript => "transcripts",
            RecordKind::LinkedInInsight => "linkedin_insights",
        }
    }

    fn result_column(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Transcript => "insight_result",
            RecordKind::LinkedInInsight => "icebreaker_result",
        }
    }

    async fn current_status(
        &self,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<Option<RecordStatus>, RecordStoreError> {
        let sql = format!("SELECT status FROM {} WHERE id = $1", Self::table(kind));
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("status").map_err(storage_err)?;
                let status = raw
                    .parse::<RecordStatus>()
                    .map_err(|e| RecordStoreError::Storage(e.to_string()))?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// Resolve a zero-row guarded update into the precise outcome.
    async fn explain_rejected_write(
        &self,
        kind: RecordKind,
        id: RecordId,
        requested: RecordStatus,
    ) -> Result<StatusWrite, RecordStoreError> {
        match self.current_status(kind, id).await? {
            None => Err(RecordStoreError::NotFound(id)),
            Some(current) if current == requested => {
                // Idempotent repeat: refresh the timestamp only.
                let sql = format!(
                    "UPDATE {} SET updated_at = now() WHERE id = $1 AND status = $2",
                    Self::table(kind)
                );
                sqlx::query(&sql)
                    .bind(id.as_uuid())
                    .bind(requested.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(storage_err)?;
                Ok(StatusWrite::Idempotent)
            }
            Some(current) => Ok(StatusWrite::Superseded(current)),
        }
    }
}

fn storage_err(e: impl std::fmt::Display) -> RecordStoreError {
    RecordStoreError::Storage(e.to_string())
}

/// Statuses allowed to precede `next`, straight from the state machine.
fn predecessors_of(next: RecordStatus) -> Vec<String> {
    use RecordStatus::*;
    [Pending, Processing, RetryScheduled, Completed, Failed]
        .into_iter()
        .filter(|s| s.can_transition_to(next))
        .map(|s| s.as_str().to_string())
        .collect()
}

fn row_to_transcript(row: &sqlx::postgres::PgRow) -> Result<TranscriptRecord, RecordStoreError> {
    let status_raw: String = row.try_get("status").map_err(storage_err)?;
    let attendees: serde_json::Value = row.try_get("attendees").map_err(storage_err)?;

    Ok(TranscriptRecord {
        id: RecordId::from_uuid(row.try_get("id").map_err(storage_err)?),
        company_name: row.try_get("company_name").map_err(storage_err)?,
        attendees: serde_json::from_value(attendees).map_err(storage_err)?,
        date: row.try_get("date").map_err(storage_err)?,
        transcript_text: row.try_get("transcript_text").map_err(storage_err)?,
        insight_result: row.try_get("insight_result").map_err(storage_err)?,
        status: status_raw
            .parse()
            .map_err(|e: dealbrief_core::DomainError| storage_err(e))?,
        created_at: row.try_get("created_at").map_err(storage_err)?,
        updated_at: row.try_get("updated_at").map_err(storage_err)?,
    })
}

fn row_to_linkedin(
    row: &sqlx::postgres::PgRow,
) -> Result<LinkedInInsightRecord, RecordStoreError> {
    let status_raw: String = row.try_get("status").map_err(storage_err)?;

    Ok(LinkedInInsightRecord {
        id: RecordId::from_uuid(row.try_get("id").map_err(storage_err)?),
        linkedin_bio: row.try_get("linkedin_bio").map_err(storage_err)?,
        pitch_deck_content: row.try_get("pitch_deck_content").map_err(storage_err)?,
        icebreaker_result: row.try_get("icebreaker_result").map_err(storage_err)?,
        status: status_raw
            .parse()
            .map_err(|e: dealbrief_core::DomainError| storage_err(e))?,
        created_at: row.try_get("created_at").map_err(storage_err)?,
        updated_at: row.try_get("updated_at").map_err(storage_err)?,
    })
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn insert_transcript(
        &self,
        input: NewTranscript,
    ) -> Result<TranscriptRecord, RecordStoreError> {
        let record = TranscriptRecord::create(input);

        sqlx::query(
            r#"
            INSERT INTO transcripts
                (id, company_name, attendees, date, transcript_text, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.company_name)
        .bind(serde_json::to_value(&record.attendees).map_err(storage_err)?)
        .bind(record.date)
        .bind(&record.transcript_text)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(record)
    }

    async fn get_transcript(
        &self,
        id: RecordId,
    ) -> Result<Option<TranscriptRecord>, RecordStoreError> {
        let row = sqlx::query("SELECT * FROM transcripts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|r| row_to_transcript(&r)).transpose()
    }

    async fn list_transcripts(&self) -> Result<Vec<TranscriptRecord>, RecordStoreError> {
        let rows = sqlx::query("SELECT * FROM transcripts ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.iter().map(row_to_transcript).collect()
    }

    async fn insert_linkedin(
        &self,
        input: NewLinkedInInsight,
    ) -> Result<LinkedInInsightRecord, RecordStoreError> {
        let record = LinkedInInsightRecord::create(input);

        sqlx::query(
            r#"
            INSERT INTO linkedin_insights
                (id, linkedin_bio, pitch_deck_content, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.linkedin_bio)
        .bind(&record.pitch_deck_content)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(record)
    }

    async fn get_linkedin(
        &self,
        id: RecordId,
    ) -> Result<Option<LinkedInInsightRecord>, RecordStoreError> {
        let row = sqlx::query("SELECT * FROM linkedin_insights WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|r| row_to_linkedin(&r)).transpose()
    }

    async fn list_linkedin(&self) -> Result<Vec<LinkedInInsightRecord>, RecordStoreError> {
        let rows = sqlx::query("SELECT * FROM linkedin_insights ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.iter().map(row_to_linkedin).collect()
    }

    async fn set_status(
        &self,
        kind: RecordKind,
        id: RecordId,
        status: RecordStatus,
    ) -> Result<StatusWrite, RecordStoreError> {
        let sql = format!(
            "UPDATE {} SET status = $2, updated_at = now() WHERE id = $1 AND status = ANY($3)",
            Self::table(kind)
        );

        let result = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(predecessors_of(status))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 1 {
            return Ok(StatusWrite::Applied);
        }

        self.explain_rejected_write(kind, id, status).await
    }

    async fn complete(
        &self,
        kind: RecordKind,
        id: RecordId,
        result_text: &str,
    ) -> Result<StatusWrite, RecordStoreError> {
        let sql = format!(
            "UPDATE {} SET {} = $2, status = $3, updated_at = now() \
             WHERE id = $1 AND status = ANY($4)",
            Self::table(kind),
            Self::result_column(kind)
        );

        let result = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(result_text)
            .bind(RecordStatus::Completed.as_str())
            .bind(predecessors_of(RecordStatus::Completed))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 1 {
            return Ok(StatusWrite::Applied);
        }

        self.explain_rejected_write(kind, id, RecordStatus::Completed)
            .await
    }
}
