use chrono::{DateTime, Utc};
use hvcs_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};
use crate::value::StateValue;

pub const MAX_SEVERITY: u8 = 10;
pub const MAX_CATEGORY_LEN: usize = 64;

/// Telemetry linked to a commit. Append-only once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// `0..=10`.
    pub severity: u8,
    pub category: String,
    pub params: StateValue,
    pub commit_hash: ObjectId,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// A record stamped with the current time.
    pub fn new(
        severity: u8,
        category: impl Into<String>,
        params: StateValue,
        commit_hash: ObjectId,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            params,
            commit_hash,
            timestamp: Utc::now(),
        }
    }

    pub fn validate(&self) -> StateResult<()> {
        if self.severity > MAX_SEVERITY {
            return Err(StateError::InvalidInput(format!(
                "severity {} outside 0..={MAX_SEVERITY}",
                self.severity
            )));
        }
        let len = self.category.chars().count();
        if len == 0 || len > MAX_CATEGORY_LEN {
            return Err(StateError::InvalidInput(format!(
                "category must be 1..={MAX_CATEGORY_LEN} characters, got {len}"
            )));
        }
        Ok(())
    }
}
