use serde::{Deserialize, Serialize};

use crate::domain::{ClassPeriod, StudentId};

/// Flat record posted by the seating preference form. Every field defaults to
/// empty so that presence checks, not deserialization, decide what is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreferenceSubmission {
    pub name: String,
    pub period: String,
    pub preferred_partner: String,
    pub non_preferred_partner: String,
    pub preferred_location: String,
}

/// The JSON object written to the bucket for each submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPreference {
    #[serde(flatten)]
    pub submission: PreferenceSubmission,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub message: String,
    pub key: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum LayoutAction {
    SelectPeriod {
        index: usize,
    },
    BeginNewPeriod,
    CancelNewPeriod,
    AddPeriod {
        label: String,
    },
    AddStudent {
        name: String,
    },
    RemoveUnassignedStudent {
        student_id: StudentId,
    },
    AddRow,
    AddPod {
        row_index: usize,
    },
    DeletePod {
        row_index: usize,
        pod_index: usize,
    },
    AssignStudent {
        row_index: usize,
        pod_index: usize,
        student_id: StudentId,
    },
}

impl LayoutAction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SelectPeriod { .. } => "select_period",
            Self::BeginNewPeriod => "begin_new_period",
            Self::CancelNewPeriod => "cancel_new_period",
            Self::AddPeriod { .. } => "add_period",
            Self::AddStudent { .. } => "add_student",
            Self::RemoveUnassignedStudent { .. } => "remove_unassigned_student",
            Self::AddRow => "add_row",
            Self::AddPod { .. } => "add_pod",
            Self::DeletePod { .. } => "delete_pod",
            Self::AssignStudent { .. } => "assign_student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoPeriodSelected,
    InvalidIndex,
    PodFull,
    StudentNotFound,
    EmptyName,
    StudentIdsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Accepted,
    Rejected { reason: RejectReason },
}

impl ActionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl From<Result<(), RejectReason>> for ActionOutcome {
    fn from(value: Result<(), RejectReason>) -> Self {
        match value {
            Ok(()) => Self::Accepted,
            Err(reason) => Self::Rejected { reason },
        }
    }
}

/// What the presentation layer renders: every period plus the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSnapshot {
    pub periods: Vec<ClassPeriod>,
    pub selected_period_index: Option<usize>,
    pub adding_period: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub outcome: ActionOutcome,
    pub layout: LayoutSnapshot,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
