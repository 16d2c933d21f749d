use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cascade_core::audit::{AuditEntry, AuditFilter};
use cascade_core::domain::level::ApprovalLevelId;
use cascade_core::domain::org_unit::OrgUnitId;
use cascade_core::domain::period::Period;
use cascade_core::domain::record::{ApprovalKey, ApprovalRecord};
use cascade_core::domain::workflow::WorkflowId;
use cascade_core::storage::{ApprovalStore, AuditStore, StorageError};

/// In-memory approval record store. Each call takes the lock once, so the
/// per-call atomicity the storage contract asks for holds trivially; clones
/// share the same records.
#[derive(Clone, Default)]
pub struct InMemoryApprovalStore {
    records: Arc<RwLock<HashMap<ApprovalKey, ApprovalRecord>>>,
}

impl InMemoryApprovalStore {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ApprovalKey, ApprovalRecord>> {
        match self.records.read() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ApprovalKey, ApprovalRecord>> {
        match self.records.write() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl ApprovalStore for InMemoryApprovalStore {
    fn get(&self, key: &ApprovalKey) -> Result<Option<ApprovalRecord>, StorageError> {
        Ok(self.read().get(key).cloned())
    }

    fn snapshot(
        &self,
        workflow: &WorkflowId,
        period: &Period,
    ) -> Result<Vec<ApprovalRecord>, StorageError> {
        Ok(self
            .read()
            .values()
            .filter(|record| &record.key.workflow == workflow && &record.key.period == period)
            .cloned()
            .collect())
    }

    fn save(&self, record: ApprovalRecord) -> Result<(), StorageError> {
        self.write().insert(record.key.clone(), record);
        Ok(())
    }

    fn delete(&self, key: &ApprovalKey) -> Result<(), StorageError> {
        self.write().remove(key);
        Ok(())
    }

    fn delete_for_org_unit(&self, org_unit: &OrgUnitId) -> Result<usize, StorageError> {
        let mut records = self.write();
        let before = records.len();
        records.retain(|key, _| &key.org_unit != org_unit);
        Ok(before - records.len())
    }

    fn delete_for_level(&self, level: &ApprovalLevelId) -> Result<usize, StorageError> {
        let mut records = self.write();
        let before = records.len();
        records.retain(|key, _| &key.level != level);
        Ok(before - records.len())
    }

    fn delete_for_workflow(&self, workflow: &WorkflowId) -> Result<usize, StorageError> {
        let mut records = self.write();
        let before = records.len();
        records.retain(|key, _| &key.workflow != workflow);
        Ok(before - records.len())
    }
}

/// In-memory append-only audit log.
#[derive(Clone, Default)]
pub struct InMemoryAuditStore {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditStore {
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.read() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(&self, entry: AuditEntry) -> Result<(), StorageError> {
        match self.entries.write() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        Ok(())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StorageError> {
        Ok(self.entries().into_iter().filter(|entry| filter.matches(entry)).collect())
    }

    fn delete_for_org_unit(&self, org_unit: &OrgUnitId) -> Result<usize, StorageError> {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|entry| &entry.org_unit != org_unit);
        Ok(before - entries.len())
    }
}
