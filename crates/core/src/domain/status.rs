use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::level::ApprovalLevelId;
use crate::domain::org_unit::OrgUnitId;
use crate::domain::user::UserId;

/// Lifecycle state of one (workflow, period, org unit, combo) selection.
///
/// The `*Above` states are derived from the nearest applicable ancestor and
/// are never stored; they track that ancestor's own state automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
    /// No applicable level here or above, or the org unit is not bound to
    /// the workflow for this period.
    Unapprovable,
    /// Has an own level, but descendants with lower rungs are not all
    /// approved yet.
    UnapprovedWaiting,
    /// Has an own level and every lower rung below is approved.
    UnapprovedReady,
    /// No own level; the nearest applicable ancestor is not approved.
    UnapprovedAbove,
    /// Approved at this org unit's own level.
    ApprovedHere,
    /// No own level; the nearest applicable ancestor is approved.
    ApprovedAbove,
    /// Approved and accepted at this org unit's own level.
    AcceptedHere,
}

impl ApprovalState {
    pub fn is_approved(self) -> bool {
        matches!(self, Self::ApprovedHere | Self::ApprovedAbove | Self::AcceptedHere)
    }

    pub fn is_approved_here(self) -> bool {
        matches!(self, Self::ApprovedHere | Self::AcceptedHere)
    }

    pub fn is_accepted(self) -> bool {
        matches!(self, Self::AcceptedHere)
    }

    pub fn is_ready_for_approval(self) -> bool {
        matches!(self, Self::UnapprovedReady)
    }

    pub fn is_unapprovable(self) -> bool {
        matches!(self, Self::Unapprovable)
    }
}

/// Computed status of a selection, including where the approval actually sits
/// when the state was derived from a record (own level or an ancestor's).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStatus {
    pub state: ApprovalState,
    pub approved_level: Option<ApprovalLevelId>,
    pub approved_org_unit: Option<OrgUnitId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<UserId>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<UserId>,
}

impl ApprovalStatus {
    pub fn of(state: ApprovalState) -> Self {
        Self {
            state,
            approved_level: None,
            approved_org_unit: None,
            approved_at: None,
            approved_by: None,
            accepted_at: None,
            accepted_by: None,
        }
    }

    pub fn unapprovable() -> Self {
        Self::of(ApprovalState::Unapprovable)
    }
}
