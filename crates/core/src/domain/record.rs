use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::category::AttributeOptionComboId;
use crate::domain::level::ApprovalLevelId;
use crate::domain::org_unit::OrgUnitId;
use crate::domain::period::Period;
use crate::domain::user::UserId;
use crate::domain::workflow::WorkflowId;

/// Identity of one approval fact. The level is part of the key because
/// parallel group-set-constrained levels at one org unit can hold approvals
/// for different combo partitions at the same time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalKey {
    pub level: ApprovalLevelId,
    pub workflow: WorkflowId,
    pub period: Period,
    pub org_unit: OrgUnitId,
    pub combo: AttributeOptionComboId,
}

/// The fact that a key has been approved. At most one record exists per key;
/// acceptance flips the flag in place, unapproval deletes the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub key: ApprovalKey,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<UserId>,
}

impl ApprovalRecord {
    pub fn new(key: ApprovalKey, created_by: UserId) -> Self {
        Self {
            key,
            accepted: false,
            created_at: Utc::now(),
            created_by,
            accepted_at: None,
            accepted_by: None,
        }
    }
}
