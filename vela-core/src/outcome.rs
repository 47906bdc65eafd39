//! Operation outcomes and composite-response aggregation
//!
//! Every lifecycle hook produces an `OperationOutcome`. Operations that fan
//! out into sub-operations fold the individual outcomes back into one
//! composite result with `aggregate`.

use serde::{Deserialize, Serialize};

use crate::domain::Entity;

/// Terminal status of a lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Complete,
    Failure,
}

/// Result of one lifecycle operation or sub-operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub status: OperationStatus,
    pub message: String,
    /// Platform objects this operation modified
    pub modified: Vec<Entity>,
}

impl OperationOutcome {
    /// A successful outcome with a message
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Complete,
            message: message.into(),
            modified: Vec::new(),
        }
    }

    /// A failed outcome with a message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Failure,
            message: message.into(),
            modified: Vec::new(),
        }
    }

    /// A successful outcome with nothing to report
    pub fn noop() -> Self {
        Self::complete("")
    }

    pub fn with_modified(mut self, modified: Vec<Entity>) -> Self {
        self.modified = modified;
        self
    }

    pub fn push_modified(&mut self, entity: Entity) {
        self.modified.push(entity);
    }

    pub fn is_failure(&self) -> bool {
        self.status == OperationStatus::Failure
    }
}

/// Fold sub-operation outcomes into one composite outcome
///
/// The composite message is the newline-join of all non-empty input messages
/// in input order; the modified-entity list is the concatenation of the
/// inputs' lists. The status is lenient: with `all_failure_is_fatal` the
/// composite fails only when every input failed, otherwise partial failure
/// degrades the message but not the status. Without the flag the composite is
/// always `Complete`. An empty input list is `Complete`.
pub fn aggregate(outcomes: Vec<OperationOutcome>, all_failure_is_fatal: bool) -> OperationOutcome {
    let all_failed = !outcomes.is_empty() && outcomes.iter().all(OperationOutcome::is_failure);

    let status = if all_failure_is_fatal && all_failed {
        OperationStatus::Failure
    } else {
        OperationStatus::Complete
    };

    let mut messages = Vec::new();
    let mut modified = Vec::new();
    for outcome in outcomes {
        if !outcome.message.is_empty() {
            messages.push(outcome.message);
        }
        modified.extend(outcome.modified);
    }

    OperationOutcome {
        status,
        message: messages.join("\n"),
        modified,
    }
}
