use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use dealbrief_core::{DomainError, RecordId};

use crate::status::RecordStatus;

/// Input for creating a transcript record (no id/status yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTranscript {
    pub company_name: String,
    pub attendees: Vec<String>,
    pub date: NaiveDate,
    pub transcript_text: String,
}

impl NewTranscript {
    /// Reject inputs the analysis cannot do anything useful with.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.company_name.trim().is_empty() {
            return Err(DomainError::validation("company_name must not be empty"));
        }
        if self.transcript_text.trim().is_empty() {
            return Err(DomainError::validation("transcript_text must not be empty"));
        }
        Ok(())
    }
}

/// A persisted meeting transcript with its analysis lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: RecordId,
    pub company_name: String,
    pub attendees: Vec<String>,
    pub date: NaiveDate,
    pub transcript_text: String,
    /// Non-null iff `status == Completed`.
    pub insight_result: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranscriptRecord {
    /// Materialize a freshly inserted record in `Pending` state.
    pub fn create(input: NewTranscript) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            company_name: input.company_name,
            attendees: input.attendees,
            date: input.date,
            transcript_text: input.transcript_text,
            insight_result: None,
            status: RecordStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_pending_with_no_result() {
        let rec = TranscriptRecord::create(NewTranscript {
            company_name: "Acme".into(),
            attendees: vec!["A".into(), "B".into()],
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            transcript_text: "...".into(),
        });
        assert_eq!(rec.status, RecordStatus::Pending);
        assert!(rec.insight_result.is_none());
        assert_eq!(rec.created_at, rec.updated_at);
    }

    #[test]
    fn blank_company_or_text_is_rejected() {
        let base = NewTranscript {
            company_name: "Acme".into(),
            attendees: vec![],
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            transcript_text: "we talked".into(),
        };
        assert!(base.validate().is_ok());

        let mut blank_name = base.clone();
        blank_name.company_name = "  ".into();
        assert!(blank_name.validate().is_err());

        let mut blank_text = base;
        blank_text.transcript_text = String::new();
        assert!(blank_text.validate().is_err());
    }
}
