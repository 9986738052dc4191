use super::StudyDocument;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestPhase {
    Scanning,
    Processing,
    Saving,
    Complete,
    Failed,
}

impl IngestPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestPhase::Complete | IngestPhase::Failed)
    }
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestPhase::Scanning => "scanning",
            IngestPhase::Processing => "processing",
            IngestPhase::Saving => "saving",
            IngestPhase::Complete => "complete",
            IngestPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress event streamed to the caller of an ingestion run
///
/// Serializes with a `phase` discriminator and camel-case counters, e.g.
/// `{"phase":"scanning","totalFiles":3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum IngestEvent {
    Scanning {
        #[serde(rename = "totalFiles")]
        total_files: usize,
    },
    Processing {
        current: usize,
        total: usize,
        percentage: f64,
        file: String,
    },
    Complete {
        studies: Vec<StudyDocument>,
        #[serde(rename = "totalProcessed")]
        total_processed: usize,
        #[serde(rename = "totalSucceeded")]
        total_succeeded: usize,
    },
    Failed {
        error: String,
    },
}

impl IngestEvent {
    /// Progress event for `current` of `total` files
    pub fn processing(current: usize, total: usize, file: impl Into<String>) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            current as f64 / total as f64 * 100.0
        };
        IngestEvent::Processing {
            current,
            total,
            percentage,
            file: file.into(),
        }
    }

    pub fn phase(&self) -> IngestPhase {
        match self {
            IngestEvent::Scanning { .. } => IngestPhase::Scanning,
            IngestEvent::Processing { .. } => IngestPhase::Processing,
            IngestEvent::Complete { .. } => IngestPhase::Complete,
            IngestEvent::Failed { .. } => IngestPhase::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }
}
