//! Wire frames: one JSON object per line, tagged by `op`.

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::relay::Submission;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RelayFrame {
    Register { producer_id: String },
    Submit(Submission),
}

impl RelayFrame {
    pub fn decode(line: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(line.trim_end_matches('\r'))?)
    }

    /// Encoded frame without the trailing newline.
    pub fn encode(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}
