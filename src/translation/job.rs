/*!
 * Translation job state as observed from outside the job manager.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Idle,
    Searching,
    Translating,
    Done,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Idle => "idle",
            JobStatus::Searching => "searching",
            JobStatus::Translating => "translating",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Point-in-time copy of the current job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobSnapshot {
    /// Media identity being translated, `None` when no job ever ran
    pub media_id: Option<String>,
    pub status: JobStatus,
    pub total_cues: usize,
    pub translated_cues: usize,
    pub current_batch: usize,
    pub total_batches: usize,
    pub cancel_requested: bool,
}

impl JobSnapshot {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Fresh job for `media_id`, still looking for its source track
    pub fn started(media_id: &str) -> Self {
        Self {
            media_id: Some(media_id.to_string()),
            status: JobStatus::Searching,
            ..Self::default()
        }
    }

    /// Reported when a cached artifact answers the request
    pub fn cached(media_id: &str) -> Self {
        Self {
            media_id: Some(media_id.to_string()),
            status: JobStatus::Done,
            ..Self::default()
        }
    }

    /// Whole-number progress, 0 until the cue count is known
    pub fn percent(&self) -> u8 {
        if self.total_cues == 0 {
            return if self.status == JobStatus::Done { 100 } else { 0 };
        }
        ((self.translated_cues.min(self.total_cues) * 100) / self.total_cues) as u8
    }

    pub fn is_for(&self, media_id: &str) -> bool {
        self.media_id.as_deref() == Some(media_id)
    }
}
