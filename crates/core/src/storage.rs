use thiserror::Error;

use crate::audit::{AuditEntry, AuditFilter};
use crate::domain::level::ApprovalLevelId;
use crate::domain::org_unit::OrgUnitId;
use crate::domain::period::Period;
use crate::domain::record::{ApprovalKey, ApprovalRecord};
use crate::domain::workflow::WorkflowId;

/// Failures of the storage collaborator, propagated untouched. Retries, if
/// any, belong to the implementation behind the trait.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// CRUD surface for approval records. `save` is an upsert keyed on
/// [`ApprovalKey`]. Every method must be individually atomic; multi-step
/// engine mutations run inside the implementation's transaction boundary.
pub trait ApprovalStore: Send + Sync {
    fn get(&self, key: &ApprovalKey) -> Result<Option<ApprovalRecord>, StorageError>;

    /// One consistent snapshot of every record for a workflow/period pair,
    /// so a batch status computation never sees a torn tree.
    fn snapshot(
        &self,
        workflow: &WorkflowId,
        period: &Period,
    ) -> Result<Vec<ApprovalRecord>, StorageError>;

    fn save(&self, record: ApprovalRecord) -> Result<(), StorageError>;

    fn delete(&self, key: &ApprovalKey) -> Result<(), StorageError>;

    /// Cascade used when an org unit is removed. Returns the number of
    /// records dropped.
    fn delete_for_org_unit(&self, org_unit: &OrgUnitId) -> Result<usize, StorageError>;

    /// Cascade used when a level is deleted from the registry.
    fn delete_for_level(&self, level: &ApprovalLevelId) -> Result<usize, StorageError>;

    /// Cascade used when a workflow is deleted from the registry.
    fn delete_for_workflow(&self, workflow: &WorkflowId) -> Result<usize, StorageError>;
}

/// Append-only audit log surface.
pub trait AuditStore: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), StorageError>;

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StorageError>;

    fn delete_for_org_unit(&self, org_unit: &OrgUnitId) -> Result<usize, StorageError>;
}
