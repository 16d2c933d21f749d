use serde::{Deserialize, Serialize};

use crate::domain::level::ApprovalLevelId;
use crate::domain::period::PeriodType;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

/// An ordered subset of the registered approval levels plus the period type
/// every status query and approval against this workflow must use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    pub id: WorkflowId,
    pub name: String,
    pub period_type: PeriodType,
    pub levels: Vec<ApprovalLevelId>,
}
