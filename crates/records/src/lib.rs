//! `dealbrief-records` — the two record kinds and their lifecycle.
//!
//! Pure domain: record shapes, the status state machine, and the transition
//! guards. No I/O; persistence lives in `dealbrief-infra`.

pub mod linkedin;
pub mod status;
pub mod transcript;

pub use linkedin::{LinkedInInsightRecord, NewLinkedInInsight};
pub use status::{RecordKind, RecordStatus, StatusWrite};
pub use transcript::{NewTranscript, TranscriptRecord};
