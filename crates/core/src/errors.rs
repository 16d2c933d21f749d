use thiserror::Error;

use crate::audit::ApprovalAction;
use crate::domain::category::{AttributeOptionComboId, CategoryOptionGroupId, CategoryOptionGroupSetId};
use crate::domain::level::ApprovalLevelId;
use crate::domain::org_unit::OrgUnitId;
use crate::domain::period::PeriodType;
use crate::domain::status::ApprovalState;
use crate::domain::user::UserId;
use crate::domain::workflow::WorkflowId;
use crate::storage::StorageError;

/// Structural problems in the level/workflow/hierarchy/catalog setup.
/// Surfaced to the caller as-is and never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("approval level {0:?} is not registered")]
    UnknownLevel(ApprovalLevelId),
    #[error("workflow {0:?} is not registered")]
    UnknownWorkflow(WorkflowId),
    #[error("org unit {0:?} is not part of the hierarchy")]
    UnknownOrgUnit(OrgUnitId),
    #[error("user {0:?} is not known to the user directory")]
    UnknownUser(UserId),
    #[error("workflow {0:?} has no levels")]
    WorkflowHasNoLevels(WorkflowId),
    #[error("workflow {workflow:?} uses {expected:?} periods, got {actual:?}")]
    WrongPeriodType { workflow: WorkflowId, expected: PeriodType, actual: PeriodType },
    #[error("approval level {0:?} is already registered")]
    DuplicateLevel(ApprovalLevelId),
    #[error("a level for depth {org_unit_depth} and group set {group_set:?} already exists")]
    DuplicateLevelPosition { org_unit_depth: u32, group_set: Option<CategoryOptionGroupSetId> },
    #[error("combo {combo:?} maps to more than one group of set {group_set:?}: {groups:?}")]
    AmbiguousGroupConstraint {
        group_set: CategoryOptionGroupSetId,
        combo: AttributeOptionComboId,
        groups: Vec<CategoryOptionGroupId>,
    },
    #[error("combo {combo:?} is not valid for workflow {workflow:?}")]
    ComboNotValidForWorkflow { workflow: WorkflowId, combo: AttributeOptionComboId },
    #[error("org unit hierarchy contains a cycle through {0:?}")]
    HierarchyCycle(OrgUnitId),
}

/// Top-level error type of the engine. Authorization denials and not-ready
/// rejections are kept distinct so callers can explain them differently.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("user {user:?} is not permitted to {action:?} at {org_unit:?}")]
    NotPermitted { user: UserId, action: ApprovalAction, org_unit: OrgUnitId },
    #[error("may not {action:?} while state is {state:?}")]
    NotReady { action: ApprovalAction, state: ApprovalState },
    #[error(transparent)]
    Storage(#[from] StorageError),
}
