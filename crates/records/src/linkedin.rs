use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dealbrief_core::{DomainError, RecordId};

use crate::status::RecordStatus;

/// Input for creating a LinkedIn insight record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLinkedInInsight {
    pub linkedin_bio: String,
    pub pitch_deck_content: String,
}

impl NewLinkedInInsight {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.linkedin_bio.trim().is_empty() {
            return Err(DomainError::validation("linkedin_bio must not be empty"));
        }
        if self.pitch_deck_content.trim().is_empty() {
            return Err(DomainError::validation("pitch_deck_content must not be empty"));
        }
        Ok(())
    }
}

/// A persisted bio/pitch-deck pair with its icebreaker-analysis lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedInInsightRecord {
    pub id: RecordId,
    pub linkedin_bio: String,
    pub pitch_deck_content: String,
    /// Non-null iff `status == Completed`.
    pub icebreaker_result: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkedInInsightRecord {
    /// Materialize a freshly inserted record in `Pending` state.
    pub fn create(input: NewLinkedInInsight) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            linkedin_bio: input.linkedin_bio,
            pitch_deck_content: input.pitch_deck_content,
            icebreaker_result: None,
            status: RecordStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
