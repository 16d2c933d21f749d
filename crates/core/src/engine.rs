use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::acl::AclService;
use crate::audit::{ApprovalAction, AuditEntry, AuditFilter};
use crate::binding::DataSetBinding;
use crate::catalog::{governing_group, CategoryCatalog};
use crate::domain::category::{AttributeOptionComboId, CategoryOptionGroupId};
use crate::domain::level::{ApprovalLevel, ApprovalLevelId};
use crate::domain::org_unit::OrgUnitId;
use crate::domain::period::Period;
use crate::domain::record::{ApprovalKey, ApprovalRecord};
use crate::domain::status::{ApprovalState, ApprovalStatus};
use crate::domain::user::UserId;
use crate::domain::workflow::WorkflowId;
use crate::errors::{ApprovalError, ConfigurationError};
use crate::hierarchy::HierarchyResolver;
use crate::levels::LevelRegistry;
use crate::permissions::{
    PermissionCache, PermissionContext, Permissions, PermissionsEvaluator,
};
use crate::settings::SystemSettings;
use crate::storage::{ApprovalStore, AuditStore};
use crate::users::UserDirectory;
use crate::workflows::WorkflowRegistry;

/// One (workflow, period, org unit, combo) the caller is asking about.
/// `combo: None` means the default combo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalSelection {
    pub workflow: WorkflowId,
    pub period: Period,
    pub org_unit: OrgUnitId,
    pub combo: Option<AttributeOptionComboId>,
}

impl ApprovalSelection {
    fn combo_or_default(&self) -> AttributeOptionComboId {
        self.combo.clone().unwrap_or_else(AttributeOptionComboId::default_combo)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusAndPermissions {
    pub status: ApprovalStatus,
    pub permissions: Permissions,
}

/// A level found applicable for a concrete (org unit, combo), together with
/// the group governing the combo under the level's group-set constraint.
#[derive(Clone, Debug)]
struct ApplicableLevel {
    level: ApprovalLevel,
    governing_group: Option<CategoryOptionGroupId>,
}

type Snapshot = HashMap<ApprovalKey, ApprovalRecord>;

/// The approval state machine and its mutating operations. Pure computation
/// over the registries, hierarchy, catalog and storage collaborators; all
/// batch mutations validate every item before the first write so a failure
/// aborts the batch with nothing applied.
pub struct ApprovalEngine<'a> {
    levels: &'a LevelRegistry,
    workflows: &'a WorkflowRegistry,
    hierarchy: &'a HierarchyResolver,
    catalog: &'a dyn CategoryCatalog,
    binding: &'a dyn DataSetBinding,
    users: &'a dyn UserDirectory,
    acl: &'a dyn AclService,
    settings: &'a dyn SystemSettings,
    approvals: &'a dyn ApprovalStore,
    audits: &'a dyn AuditStore,
    cache: PermissionCache,
}

impl<'a> ApprovalEngine<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        levels: &'a LevelRegistry,
        workflows: &'a WorkflowRegistry,
        hierarchy: &'a HierarchyResolver,
        catalog: &'a dyn CategoryCatalog,
        binding: &'a dyn DataSetBinding,
        users: &'a dyn UserDirectory,
        acl: &'a dyn AclService,
        settings: &'a dyn SystemSettings,
        approvals: &'a dyn ApprovalStore,
        audits: &'a dyn AuditStore,
        cache: PermissionCache,
    ) -> Self {
        Self {
            levels,
            workflows,
            hierarchy,
            catalog,
            binding,
            users,
            acl,
            settings,
            approvals,
            audits,
            cache,
        }
    }

    // ---------------------------------------------------------------------
    // Status queries
    // ---------------------------------------------------------------------

    pub fn status(&self, selection: &ApprovalSelection) -> Result<ApprovalStatus, ApprovalError> {
        self.workflows.check_period(&selection.workflow, &selection.period)?;
        let snapshot = self.load_snapshot(&selection.workflow, &selection.period)?;
        Ok(self.compute(selection, &snapshot)?.0)
    }

    /// Batch query; selections sharing a workflow/period pair are computed
    /// from one storage snapshot so results never reflect a torn tree.
    pub fn statuses(
        &self,
        selections: &[ApprovalSelection],
    ) -> Result<Vec<ApprovalStatus>, ApprovalError> {
        let mut snapshots: HashMap<(WorkflowId, Period), Snapshot> = HashMap::new();
        let mut results = Vec::with_capacity(selections.len());

        for selection in selections {
            self.workflows.check_period(&selection.workflow, &selection.period)?;
            let snapshot = self.snapshot_for(&mut snapshots, selection)?;
            results.push(self.compute(selection, snapshot)?.0);
        }

        Ok(results)
    }

    pub fn status_with_permissions(
        &self,
        selection: &ApprovalSelection,
        user: &UserId,
    ) -> Result<StatusAndPermissions, ApprovalError> {
        self.workflows.check_period(&selection.workflow, &selection.period)?;
        let snapshot = self.load_snapshot(&selection.workflow, &selection.period)?;
        let (status, applicable) = self.compute(selection, &snapshot)?;
        let context = self.permission_context(selection, applicable.as_ref());
        let permissions = self.evaluator().evaluate(user, &context, &status)?;
        Ok(StatusAndPermissions { status, permissions })
    }

    /// Whether the selection counts as approved, at its own level or above.
    pub fn is_approved(&self, selection: &ApprovalSelection) -> Result<bool, ApprovalError> {
        Ok(self.status(selection)?.state.is_approved())
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Approves every selection, writing one record and one audit entry per
    /// item not already approved. All-or-nothing: the first invalid item
    /// aborts the batch before anything is written.
    pub fn approve(
        &self,
        selections: &[ApprovalSelection],
        user: &UserId,
    ) -> Result<usize, ApprovalError> {
        debug!(items = selections.len(), "approve requested");

        let evaluator = self.evaluator();
        let mut snapshots: HashMap<(WorkflowId, Period), Snapshot> = HashMap::new();
        let mut seen: HashSet<ApprovalKey> = HashSet::new();
        let mut checked: Vec<ApprovalKey> = Vec::new();

        for selection in selections {
            self.workflows.check_period(&selection.workflow, &selection.period)?;
            let workflow = self.workflows.require(&selection.workflow)?;
            if workflow.levels.is_empty() {
                return Err(ConfigurationError::WorkflowHasNoLevels(workflow.id.clone()).into());
            }

            let combo = selection.combo_or_default();
            if !self.binding.is_combo_valid(&selection.workflow, &combo) {
                return Err(ConfigurationError::ComboNotValidForWorkflow {
                    workflow: selection.workflow.clone(),
                    combo,
                }
                .into());
            }

            let snapshot = self.snapshot_for(&mut snapshots, selection)?;
            let (status, applicable) = self.compute(selection, snapshot)?;

            if status.state.is_approved_here() {
                debug!(org_unit = %selection.org_unit.0, "already approved, skipping");
                continue;
            }

            let Some(applicable) = applicable else {
                return Err(ApprovalError::NotReady {
                    action: ApprovalAction::Approve,
                    state: status.state,
                });
            };

            if status.state != ApprovalState::UnapprovedReady {
                return Err(ApprovalError::NotReady {
                    action: ApprovalAction::Approve,
                    state: status.state,
                });
            }

            let context = self.permission_context(selection, Some(&applicable));
            let permissions = evaluator.evaluate(user, &context, &status)?;
            if !permissions.may_approve {
                return Err(ApprovalError::NotPermitted {
                    user: user.clone(),
                    action: ApprovalAction::Approve,
                    org_unit: selection.org_unit.clone(),
                });
            }

            let key = ApprovalKey {
                level: applicable.level.id.clone(),
                workflow: selection.workflow.clone(),
                period: selection.period.clone(),
                org_unit: selection.org_unit.clone(),
                combo,
            };
            if seen.insert(key.clone()) {
                checked.push(key);
            }
        }

        let count = checked.len();
        for key in checked {
            let record = ApprovalRecord::new(key, user.clone());
            self.audits.append(AuditEntry::for_action(&record, ApprovalAction::Approve, user))?;
            self.approvals.save(record)?;
        }

        info!(saved = count, "approvals saved");
        Ok(count)
    }

    /// Removes approvals, unwinding strictly top-down: an approval still
    /// covered by an approved ancestor, or already accepted, cannot be
    /// removed. Missing records are skipped silently.
    pub fn unapprove(
        &self,
        selections: &[ApprovalSelection],
        user: &UserId,
    ) -> Result<usize, ApprovalError> {
        debug!(items = selections.len(), "unapprove requested");

        let evaluator = self.evaluator();
        let mut snapshots: HashMap<(WorkflowId, Period), Snapshot> = HashMap::new();
        let mut seen: HashSet<ApprovalKey> = HashSet::new();
        let mut checked: Vec<(ApprovalKey, ApprovalRecord)> = Vec::new();

        for selection in selections {
            self.workflows.check_period(&selection.workflow, &selection.period)?;
            let snapshot = self.snapshot_for(&mut snapshots, selection)?;
            let (status, applicable) = self.compute(selection, snapshot)?;

            let Some(applicable) = applicable else {
                return Err(ApprovalError::NotReady {
                    action: ApprovalAction::Unapprove,
                    state: status.state,
                });
            };

            let combo = selection.combo_or_default();
            let key = ApprovalKey {
                level: applicable.level.id.clone(),
                workflow: selection.workflow.clone(),
                period: selection.period.clone(),
                org_unit: selection.org_unit.clone(),
                combo: combo.clone(),
            };

            let Some(record) = snapshot.get(&key) else {
                debug!(org_unit = %selection.org_unit.0, "already unapproved, skipping");
                continue;
            };

            let above = self.approved_ancestor(
                &selection.workflow,
                &selection.period,
                &selection.org_unit,
                &combo,
                snapshot,
            )?;
            if matches!(above, AncestorApproval::Approved(_)) {
                return Err(ApprovalError::NotReady {
                    action: ApprovalAction::Unapprove,
                    state: ApprovalState::ApprovedAbove,
                });
            }

            let context = self.permission_context(selection, Some(&applicable));
            let permissions = evaluator.evaluate(user, &context, &status)?;
            if !permissions.may_unapprove {
                return Err(ApprovalError::NotPermitted {
                    user: user.clone(),
                    action: ApprovalAction::Unapprove,
                    org_unit: selection.org_unit.clone(),
                });
            }

            if seen.insert(key.clone()) {
                checked.push((key, record.clone()));
            }
        }

        let count = checked.len();
        for (key, record) in checked {
            self.audits.append(AuditEntry::for_action(&record, ApprovalAction::Unapprove, user))?;
            self.approvals.delete(&key)?;
        }

        info!(deleted = count, "approvals deleted");
        Ok(count)
    }

    /// Marks approved records accepted. Requires the acceptance-required
    /// setting; already-accepted records are skipped silently.
    pub fn accept(
        &self,
        selections: &[ApprovalSelection],
        user: &UserId,
    ) -> Result<usize, ApprovalError> {
        self.flip_acceptance(selections, user, ApprovalAction::Accept)
    }

    /// Reverts acceptance back to plain approval.
    pub fn unaccept(
        &self,
        selections: &[ApprovalSelection],
        user: &UserId,
    ) -> Result<usize, ApprovalError> {
        self.flip_acceptance(selections, user, ApprovalAction::Unaccept)
    }

    fn flip_acceptance(
        &self,
        selections: &[ApprovalSelection],
        user: &UserId,
        action: ApprovalAction,
    ) -> Result<usize, ApprovalError> {
        debug!(items = selections.len(), ?action, "acceptance change requested");

        let accepting = matches!(action, ApprovalAction::Accept);
        let evaluator = self.evaluator();
        let mut snapshots: HashMap<(WorkflowId, Period), Snapshot> = HashMap::new();
        let mut seen: HashSet<ApprovalKey> = HashSet::new();
        let mut checked: Vec<ApprovalRecord> = Vec::new();

        for selection in selections {
            self.workflows.check_period(&selection.workflow, &selection.period)?;
            let snapshot = self.snapshot_for(&mut snapshots, selection)?;
            let (status, applicable) = self.compute(selection, snapshot)?;

            let Some(applicable) = applicable else {
                return Err(ApprovalError::NotReady { action, state: status.state });
            };

            let key = ApprovalKey {
                level: applicable.level.id.clone(),
                workflow: selection.workflow.clone(),
                period: selection.period.clone(),
                org_unit: selection.org_unit.clone(),
                combo: selection.combo_or_default(),
            };

            let Some(record) = snapshot.get(&key) else {
                return Err(ApprovalError::NotReady { action, state: status.state });
            };

            if record.accepted == accepting {
                debug!(org_unit = %selection.org_unit.0, "acceptance already in target state, skipping");
                continue;
            }

            let context = self.permission_context(selection, Some(&applicable));
            let permissions = evaluator.evaluate(user, &context, &status)?;
            let allowed = if accepting { permissions.may_accept } else { permissions.may_unaccept };
            if !allowed {
                return Err(ApprovalError::NotPermitted {
                    user: user.clone(),
                    action,
                    org_unit: selection.org_unit.clone(),
                });
            }

            if seen.insert(key) {
                checked.push(record.clone());
            }
        }

        let count = checked.len();
        let now = chrono::Utc::now();
        for mut record in checked {
            record.accepted = accepting;
            record.accepted_at = accepting.then_some(now);
            record.accepted_by = accepting.then(|| user.clone());
            self.audits.append(AuditEntry::for_action(&record, action, user))?;
            self.approvals.save(record)?;
        }

        info!(changed = count, ?action, "acceptance updated");
        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Cascades and audit queries
    // ---------------------------------------------------------------------

    /// Removes all approval records and audit entries for an org unit being
    /// deleted from the hierarchy.
    pub fn delete_approvals_for_org_unit(&self, org_unit: &OrgUnitId) -> Result<usize, ApprovalError> {
        let records = self.approvals.delete_for_org_unit(org_unit)?;
        let audits = self.audits.delete_for_org_unit(org_unit)?;
        info!(records, audits, org_unit = %org_unit.0, "org unit approvals purged");
        Ok(records)
    }

    /// Cascade for a level deleted from the registry.
    pub fn delete_approvals_for_level(
        &self,
        level: &ApprovalLevelId,
    ) -> Result<usize, ApprovalError> {
        Ok(self.approvals.delete_for_level(level)?)
    }

    /// Cascade for a workflow deleted from the registry.
    pub fn delete_approvals_for_workflow(
        &self,
        workflow: &WorkflowId,
    ) -> Result<usize, ApprovalError> {
        Ok(self.approvals.delete_for_workflow(workflow)?)
    }

    /// Audit entries matching the filter, narrowed to those the user may
    /// read under the same rules as status queries.
    pub fn audit_trail(
        &self,
        filter: &AuditFilter,
        user: &UserId,
    ) -> Result<Vec<AuditEntry>, ApprovalError> {
        let evaluator = self.evaluator();
        let mut readable = Vec::new();

        for entry in self.audits.query(filter)? {
            let group_set =
                self.levels.get(&entry.level).and_then(|level| level.group_set.clone());
            let governing = match &group_set {
                Some(set) => governing_group(self.catalog, set, &entry.combo)?,
                None => None,
            };
            let context = PermissionContext {
                workflow: entry.workflow.clone(),
                level: Some(entry.level.clone()),
                org_unit: entry.org_unit.clone(),
                combo: entry.combo.clone(),
                group_set,
                governing_group: governing,
            };
            let permissions =
                evaluator.evaluate(user, &context, &ApprovalStatus::unapprovable())?;
            if permissions.may_read_data {
                readable.push(entry);
            }
        }

        Ok(readable)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn evaluator(&self) -> PermissionsEvaluator<'_> {
        PermissionsEvaluator::new(
            self.hierarchy,
            self.users,
            self.acl,
            self.catalog,
            self.settings,
            self.cache.clone(),
        )
    }

    fn load_snapshot(
        &self,
        workflow: &WorkflowId,
        period: &Period,
    ) -> Result<Snapshot, ApprovalError> {
        let records = self.approvals.snapshot(workflow, period)?;
        Ok(records.into_iter().map(|record| (record.key.clone(), record)).collect())
    }

    /// Snapshot for the selection's workflow/period pair, loaded at most
    /// once per batch.
    fn snapshot_for<'s>(
        &self,
        snapshots: &'s mut HashMap<(WorkflowId, Period), Snapshot>,
        selection: &ApprovalSelection,
    ) -> Result<&'s Snapshot, ApprovalError> {
        let key = (selection.workflow.clone(), selection.period.clone());
        if !snapshots.contains_key(&key) {
            let snapshot = self.load_snapshot(&selection.workflow, &selection.period)?;
            snapshots.insert(key.clone(), snapshot);
        }
        Ok(&snapshots[&key])
    }

    fn permission_context(
        &self,
        selection: &ApprovalSelection,
        applicable: Option<&ApplicableLevel>,
    ) -> PermissionContext {
        PermissionContext {
            workflow: selection.workflow.clone(),
            level: applicable.map(|a| a.level.id.clone()),
            org_unit: selection.org_unit.clone(),
            combo: selection.combo_or_default(),
            group_set: applicable.and_then(|a| a.level.group_set.clone()),
            governing_group: applicable.and_then(|a| a.governing_group.clone()),
        }
    }

    /// The workflow level applying to this org unit depth and combo: depth
    /// must match, and a group-set-constrained level applies only when the
    /// set yields a governing group for the combo. Configuration keeps at
    /// most one such level per (depth, combo); iteration order makes the
    /// lowest sequence win if that invariant is ever violated upstream.
    fn applicable_level(
        &self,
        workflow_levels: &[ApprovalLevel],
        depth: u32,
        combo: &AttributeOptionComboId,
    ) -> Result<Option<ApplicableLevel>, ConfigurationError> {
        for level in workflow_levels.iter().filter(|level| level.org_unit_depth == depth) {
            match &level.group_set {
                None => {
                    return Ok(Some(ApplicableLevel { level: level.clone(), governing_group: None }))
                }
                Some(set) => {
                    if let Some(group) = governing_group(self.catalog, set, combo)? {
                        return Ok(Some(ApplicableLevel {
                            level: level.clone(),
                            governing_group: Some(group),
                        }));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Core of the state machine: the bottom-up walk over the org-unit
    /// cascade, entirely from one snapshot.
    fn compute(
        &self,
        selection: &ApprovalSelection,
        snapshot: &Snapshot,
    ) -> Result<(ApprovalStatus, Option<ApplicableLevel>), ApprovalError> {
        let workflow = self.workflows.require(&selection.workflow)?;
        let workflow_levels = self.levels.resolve_sorted(&workflow.levels)?;
        let combo = selection.combo_or_default();

        if workflow_levels.is_empty()
            || !self.binding.is_org_unit_bound(&workflow.id, &selection.org_unit, &selection.period)
        {
            return Ok((ApprovalStatus::unapprovable(), None));
        }

        let depth = self.hierarchy.depth(&selection.org_unit)?;
        let applicable = self.applicable_level(&workflow_levels, depth, &combo)?;

        if let Some(applicable) = applicable {
            let key = ApprovalKey {
                level: applicable.level.id.clone(),
                workflow: workflow.id.clone(),
                period: selection.period.clone(),
                org_unit: selection.org_unit.clone(),
                combo: combo.clone(),
            };

            let status = match snapshot.get(&key) {
                Some(record) if record.accepted => {
                    Self::status_from_record(ApprovalState::AcceptedHere, record)
                }
                Some(record) => Self::status_from_record(ApprovalState::ApprovedHere, record),
                None => {
                    let ready = self.descendants_ready(
                        &workflow_levels,
                        &applicable.level,
                        selection,
                        &combo,
                        snapshot,
                    )?;
                    if ready {
                        ApprovalStatus::of(ApprovalState::UnapprovedReady)
                    } else {
                        ApprovalStatus::of(ApprovalState::UnapprovedWaiting)
                    }
                }
            };

            return Ok((status, Some(applicable)));
        }

        // Skip position: mirror the nearest applicable ancestor.
        match self.approved_ancestor(
            &selection.workflow,
            &selection.period,
            &selection.org_unit,
            &combo,
            snapshot,
        )? {
            AncestorApproval::Approved(record) => {
                Ok((Self::status_from_record(ApprovalState::ApprovedAbove, &record), None))
            }
            AncestorApproval::Unapproved => {
                Ok((ApprovalStatus::of(ApprovalState::UnapprovedAbove), None))
            }
            AncestorApproval::NoApplicableAncestor => Ok((ApprovalStatus::unapprovable(), None)),
        }
    }

    /// All-children-ready check: every strict descendant that has its own
    /// applicable level on a strictly lower rung must already hold its
    /// record. Iterative over the precomputed descendant set.
    fn descendants_ready(
        &self,
        workflow_levels: &[ApprovalLevel],
        own_level: &ApprovalLevel,
        selection: &ApprovalSelection,
        combo: &AttributeOptionComboId,
        snapshot: &Snapshot,
    ) -> Result<bool, ApprovalError> {
        for descendant in self.hierarchy.descendants(&selection.org_unit)? {
            if !self.binding.is_org_unit_bound(&selection.workflow, &descendant, &selection.period) {
                continue;
            }
            let depth = self.hierarchy.depth(&descendant)?;
            let Some(applicable) = self.applicable_level(workflow_levels, depth, combo)? else {
                continue;
            };
            if applicable.level.sequence <= own_level.sequence {
                continue;
            }

            let key = ApprovalKey {
                level: applicable.level.id.clone(),
                workflow: selection.workflow.clone(),
                period: selection.period.clone(),
                org_unit: descendant,
                combo: combo.clone(),
            };
            if !snapshot.contains_key(&key) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn approved_ancestor(
        &self,
        workflow: &WorkflowId,
        period: &Period,
        org_unit: &OrgUnitId,
        combo: &AttributeOptionComboId,
        snapshot: &Snapshot,
    ) -> Result<AncestorApproval, ApprovalError> {
        let workflow_def = self.workflows.require(workflow)?;
        let workflow_levels = self.levels.resolve_sorted(&workflow_def.levels)?;

        for ancestor in self.hierarchy.ancestors(org_unit)?.iter().rev() {
            let depth = self.hierarchy.depth(ancestor)?;
            let Some(applicable) = self.applicable_level(&workflow_levels, depth, combo)? else {
                continue;
            };

            let key = ApprovalKey {
                level: applicable.level.id.clone(),
                workflow: workflow.clone(),
                period: period.clone(),
                org_unit: ancestor.clone(),
                combo: combo.clone(),
            };
            return Ok(match snapshot.get(&key) {
                Some(record) => AncestorApproval::Approved(record.clone()),
                None => AncestorApproval::Unapproved,
            });
        }

        Ok(AncestorApproval::NoApplicableAncestor)
    }

    fn status_from_record(state: ApprovalState, record: &ApprovalRecord) -> ApprovalStatus {
        ApprovalStatus {
            state,
            approved_level: Some(record.key.level.clone()),
            approved_org_unit: Some(record.key.org_unit.clone()),
            approved_at: Some(record.created_at),
            approved_by: Some(record.created_by.clone()),
            accepted_at: record.accepted_at,
            accepted_by: record.accepted_by.clone(),
        }
    }
}

enum AncestorApproval {
    Approved(ApprovalRecord),
    Unapproved,
    NoApplicableAncestor,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::RwLock;

    use crate::acl::InMemoryAclService;
    use crate::audit::{ApprovalAction, AuditEntry, AuditFilter};
    use crate::binding::InMemoryDataSetBinding;
    use crate::catalog::InMemoryCategoryCatalog;
    use crate::domain::category::{
        AttributeOptionComboId, CategoryOptionGroupId, CategoryOptionGroupSetId, CategoryOptionId,
    };
    use crate::domain::level::ApprovalLevelId;
    use crate::domain::org_unit::{OrgUnit, OrgUnitId};
    use crate::domain::period::{Period, PeriodType};
    use crate::domain::record::{ApprovalKey, ApprovalRecord};
    use crate::domain::status::ApprovalState;
    use crate::domain::user::{Capability, UserId, UserProfile};
    use crate::domain::workflow::{ApprovalWorkflow, WorkflowId};
    use crate::engine::{ApprovalEngine, ApprovalSelection};
    use crate::errors::{ApprovalError, ConfigurationError};
    use crate::hierarchy::HierarchyResolver;
    use crate::levels::LevelRegistry;
    use crate::permissions::PermissionCache;
    use crate::settings::StaticSettings;
    use crate::storage::{ApprovalStore, AuditStore, StorageError};
    use crate::users::InMemoryUserDirectory;
    use crate::workflows::WorkflowRegistry;

    #[derive(Default)]
    struct TestApprovalStore {
        records: RwLock<HashMap<ApprovalKey, ApprovalRecord>>,
    }

    impl ApprovalStore for TestApprovalStore {
        fn get(&self, key: &ApprovalKey) -> Result<Option<ApprovalRecord>, StorageError> {
            Ok(self.records.read().unwrap().get(key).cloned())
        }

        fn snapshot(
            &self,
            workflow: &WorkflowId,
            period: &Period,
        ) -> Result<Vec<ApprovalRecord>, StorageError> {
            Ok(self
                .records
                .read()
                .unwrap()
                .values()
                .filter(|record| &record.key.workflow == workflow && &record.key.period == period)
                .cloned()
                .collect())
        }

        fn save(&self, record: ApprovalRecord) -> Result<(), StorageError> {
            self.records.write().unwrap().insert(record.key.clone(), record);
            Ok(())
        }

        fn delete(&self, key: &ApprovalKey) -> Result<(), StorageError> {
            self.records.write().unwrap().remove(key);
            Ok(())
        }

        fn delete_for_org_unit(&self, org_unit: &OrgUnitId) -> Result<usize, StorageError> {
            let mut records = self.records.write().unwrap();
            let before = records.len();
            records.retain(|key, _| &key.org_unit != org_unit);
            Ok(before - records.len())
        }

        fn delete_for_level(&self, level: &ApprovalLevelId) -> Result<usize, StorageError> {
            let mut records = self.records.write().unwrap();
            let before = records.len();
            records.retain(|key, _| &key.level != level);
            Ok(before - records.len())
        }

        fn delete_for_workflow(&self, workflow: &WorkflowId) -> Result<usize, StorageError> {
            let mut records = self.records.write().unwrap();
            let before = records.len();
            records.retain(|key, _| &key.workflow != workflow);
            Ok(before - records.len())
        }
    }

    #[derive(Default)]
    struct TestAuditStore {
        entries: RwLock<Vec<AuditEntry>>,
    }

    impl AuditStore for TestAuditStore {
        fn append(&self, entry: AuditEntry) -> Result<(), StorageError> {
            self.entries.write().unwrap().push(entry);
            Ok(())
        }

        fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StorageError> {
            Ok(self
                .entries
                .read()
                .unwrap()
                .iter()
                .filter(|entry| filter.matches(entry))
                .cloned()
                .collect())
        }

        fn delete_for_org_unit(&self, org_unit: &OrgUnitId) -> Result<usize, StorageError> {
            let mut entries = self.entries.write().unwrap();
            let before = entries.len();
            entries.retain(|entry| &entry.org_unit != org_unit);
            Ok(before - entries.len())
        }
    }

    struct World {
        levels: LevelRegistry,
        workflows: WorkflowRegistry,
        hierarchy: HierarchyResolver,
        catalog: InMemoryCategoryCatalog,
        binding: InMemoryDataSetBinding,
        users: InMemoryUserDirectory,
        acl: InMemoryAclService,
        settings: StaticSettings,
        approvals: TestApprovalStore,
        audits: TestAuditStore,
        cache: PermissionCache,
    }

    fn ou(raw: &str) -> OrgUnitId {
        OrgUnitId(raw.to_owned())
    }

    fn user(raw: &str) -> UserId {
        UserId(raw.to_owned())
    }

    fn month() -> Period {
        Period { period_type: PeriodType::Monthly, code: "2026-06".to_owned() }
    }

    impl World {
        /// National > district > facility, one level per depth, everything
        /// bound, a superuser plus scoped approvers and an acceptor.
        fn three_level() -> Self {
            let cache = PermissionCache::default();

            let mut levels = LevelRegistry::new(cache.clone());
            levels.add(ApprovalLevelId("national-level".to_owned()), "National", 1, None).unwrap();
            levels.add(ApprovalLevelId("district-level".to_owned()), "District", 2, None).unwrap();
            levels.add(ApprovalLevelId("facility-level".to_owned()), "Facility", 3, None).unwrap();

            let mut workflows = WorkflowRegistry::new(cache.clone());
            workflows
                .add(
                    ApprovalWorkflow {
                        id: WorkflowId("monthly".to_owned()),
                        name: "Monthly reporting".to_owned(),
                        period_type: PeriodType::Monthly,
                        levels: vec![
                            ApprovalLevelId("national-level".to_owned()),
                            ApprovalLevelId("district-level".to_owned()),
                            ApprovalLevelId("facility-level".to_owned()),
                        ],
                    },
                    &levels,
                )
                .unwrap();

            let hierarchy = HierarchyResolver::from_units(&[
                OrgUnit { id: ou("national"), name: "National".to_owned(), parent: None },
                OrgUnit { id: ou("district"), name: "District".to_owned(), parent: Some(ou("national")) },
                OrgUnit { id: ou("facility"), name: "Facility".to_owned(), parent: Some(ou("district")) },
            ])
            .unwrap();

            let mut binding = InMemoryDataSetBinding::default();
            for org_unit in ["national", "district", "facility"] {
                binding.bind_org_unit(WorkflowId("monthly".to_owned()), ou(org_unit));
            }

            let mut users = InMemoryUserDirectory::default();
            let mut root = UserProfile::new(user("root"));
            root.superuser = true;
            users.upsert(root);

            let mut facility_approver = UserProfile::new(user("fac-approver"));
            facility_approver.capabilities = [Capability::Approve].into_iter().collect();
            facility_approver.assigned_org_units = [ou("facility")].into_iter().collect();
            users.upsert(facility_approver);

            let mut acceptor = UserProfile::new(user("acceptor"));
            acceptor.capabilities = [Capability::AcceptLower].into_iter().collect();
            acceptor.assigned_org_units = [ou("district")].into_iter().collect();
            users.upsert(acceptor);

            Self {
                levels,
                workflows,
                hierarchy,
                catalog: InMemoryCategoryCatalog::new(cache.clone()),
                binding,
                users,
                acl: InMemoryAclService::new(cache.clone()),
                settings: StaticSettings::default(),
                approvals: TestApprovalStore::default(),
                audits: TestAuditStore::default(),
                cache,
            }
        }

        /// Same tree but levels only at depths 1 and 2, leaving the
        /// facility in a skip position.
        fn two_level() -> Self {
            let mut world = Self::three_level();
            let cache = world.cache.clone();

            let mut workflows = WorkflowRegistry::new(cache);
            workflows
                .add(
                    ApprovalWorkflow {
                        id: WorkflowId("monthly".to_owned()),
                        name: "Monthly reporting".to_owned(),
                        period_type: PeriodType::Monthly,
                        levels: vec![
                            ApprovalLevelId("national-level".to_owned()),
                            ApprovalLevelId("district-level".to_owned()),
                        ],
                    },
                    &world.levels,
                )
                .unwrap();

            world.workflows = workflows;
            world
        }

        fn engine(&self) -> ApprovalEngine<'_> {
            ApprovalEngine::new(
                &self.levels,
                &self.workflows,
                &self.hierarchy,
                &self.catalog,
                &self.binding,
                &self.users,
                &self.acl,
                &self.settings,
                &self.approvals,
                &self.audits,
                self.cache.clone(),
            )
        }

        fn selection(&self, org_unit: &str) -> ApprovalSelection {
            ApprovalSelection {
                workflow: WorkflowId("monthly".to_owned()),
                period: month(),
                org_unit: ou(org_unit),
                combo: None,
            }
        }

        fn state_of(&self, org_unit: &str) -> ApprovalState {
            self.engine().status(&self.selection(org_unit)).unwrap().state
        }
    }

    #[test]
    fn workflow_without_levels_is_unapprovable() {
        let mut world = World::three_level();
        world
            .workflows
            .add(
                ApprovalWorkflow {
                    id: WorkflowId("empty".to_owned()),
                    name: "Empty".to_owned(),
                    period_type: PeriodType::Monthly,
                    levels: vec![],
                },
                &world.levels,
            )
            .unwrap();

        let selection = ApprovalSelection {
            workflow: WorkflowId("empty".to_owned()),
            period: month(),
            org_unit: ou("facility"),
            combo: None,
        };
        let status = world.engine().status(&selection).unwrap();
        assert_eq!(status.state, ApprovalState::Unapprovable);
    }

    #[test]
    fn unbound_org_unit_is_unapprovable() {
        let mut world = World::three_level();
        world.binding = InMemoryDataSetBinding::default();
        assert_eq!(world.state_of("facility"), ApprovalState::Unapprovable);
    }

    #[test]
    fn wrong_period_type_is_a_configuration_error() {
        let world = World::three_level();
        let mut selection = world.selection("facility");
        selection.period = Period { period_type: PeriodType::Quarterly, code: "2026-Q2".to_owned() };

        let error = world.engine().status(&selection).unwrap_err();
        assert!(matches!(
            error,
            ApprovalError::Configuration(ConfigurationError::WrongPeriodType { .. })
        ));
    }

    #[test]
    fn leaf_is_ready_first_and_ancestors_wait() {
        let world = World::three_level();
        assert_eq!(world.state_of("facility"), ApprovalState::UnapprovedReady);
        assert_eq!(world.state_of("district"), ApprovalState::UnapprovedWaiting);
        assert_eq!(world.state_of("national"), ApprovalState::UnapprovedWaiting);
    }

    #[test]
    fn approving_the_leaf_readies_its_parent() {
        let world = World::three_level();
        world.engine().approve(&[world.selection("facility")], &user("root")).unwrap();

        assert_eq!(world.state_of("facility"), ApprovalState::ApprovedHere);
        assert_eq!(world.state_of("district"), ApprovalState::UnapprovedReady);
        assert_eq!(world.state_of("national"), ApprovalState::UnapprovedWaiting);
    }

    #[test]
    fn approving_above_unapproved_descendants_is_rejected() {
        let world = World::three_level();
        let error =
            world.engine().approve(&[world.selection("district")], &user("root")).unwrap_err();
        assert_eq!(
            error,
            ApprovalError::NotReady {
                action: ApprovalAction::Approve,
                state: ApprovalState::UnapprovedWaiting,
            }
        );
        assert!(world.approvals.records.read().unwrap().is_empty());
    }

    #[test]
    fn duplicate_approve_is_a_silent_no_op() {
        let world = World::three_level();
        let engine = world.engine();

        assert_eq!(engine.approve(&[world.selection("facility")], &user("root")).unwrap(), 1);
        assert_eq!(engine.approve(&[world.selection("facility")], &user("root")).unwrap(), 0);

        assert_eq!(world.approvals.records.read().unwrap().len(), 1);
        assert_eq!(world.audits.entries.read().unwrap().len(), 1);
    }

    #[test]
    fn a_failing_item_aborts_the_whole_batch() {
        let world = World::three_level();
        let error = world
            .engine()
            .approve(&[world.selection("facility"), world.selection("national")], &user("root"))
            .unwrap_err();
        assert!(matches!(error, ApprovalError::NotReady { .. }));
        assert!(world.approvals.records.read().unwrap().is_empty());
        assert!(world.audits.entries.read().unwrap().is_empty());
    }

    #[test]
    fn unapprove_unwinds_top_down() {
        let world = World::three_level();
        let engine = world.engine();
        let root = user("root");

        engine.approve(&[world.selection("facility")], &root).unwrap();
        engine.approve(&[world.selection("district")], &root).unwrap();

        let error = engine.unapprove(&[world.selection("facility")], &root).unwrap_err();
        assert_eq!(
            error,
            ApprovalError::NotReady {
                action: ApprovalAction::Unapprove,
                state: ApprovalState::ApprovedAbove,
            }
        );

        engine.unapprove(&[world.selection("district")], &root).unwrap();
        engine.unapprove(&[world.selection("facility")], &root).unwrap();
        assert_eq!(world.state_of("facility"), ApprovalState::UnapprovedReady);
    }

    #[test]
    fn unapprove_of_a_missing_record_is_a_silent_no_op() {
        let world = World::three_level();
        assert_eq!(world.engine().unapprove(&[world.selection("facility")], &user("root")).unwrap(), 0);
        assert!(world.audits.entries.read().unwrap().is_empty());
    }

    #[test]
    fn skip_position_mirrors_the_nearest_applicable_ancestor() {
        let world = World::two_level();
        let engine = world.engine();
        let root = user("root");

        assert_eq!(world.state_of("facility"), ApprovalState::UnapprovedAbove);

        engine.approve(&[world.selection("district")], &root).unwrap();
        let status = engine.status(&world.selection("facility")).unwrap();
        assert_eq!(status.state, ApprovalState::ApprovedAbove);
        assert_eq!(status.approved_org_unit, Some(ou("district")));
        assert_eq!(status.approved_level, Some(ApprovalLevelId("district-level".to_owned())));
    }

    #[test]
    fn approving_at_a_skip_position_is_rejected() {
        let world = World::two_level();
        let error =
            world.engine().approve(&[world.selection("facility")], &user("root")).unwrap_err();
        assert_eq!(
            error,
            ApprovalError::NotReady {
                action: ApprovalAction::Approve,
                state: ApprovalState::UnapprovedAbove,
            }
        );
    }

    #[test]
    fn acceptance_gates_unapproval_for_plain_approvers() {
        let mut world = World::three_level();
        world.settings = StaticSettings { acceptance_required: true };
        let engine = world.engine();

        engine.approve(&[world.selection("facility")], &user("fac-approver")).unwrap();
        engine.accept(&[world.selection("facility")], &user("acceptor")).unwrap();
        assert_eq!(world.state_of("facility"), ApprovalState::AcceptedHere);

        let error =
            engine.unapprove(&[world.selection("facility")], &user("fac-approver")).unwrap_err();
        assert!(matches!(error, ApprovalError::NotPermitted { .. }));

        engine.unaccept(&[world.selection("facility")], &user("acceptor")).unwrap();
        engine.unapprove(&[world.selection("facility")], &user("fac-approver")).unwrap();
        assert_eq!(world.state_of("facility"), ApprovalState::UnapprovedReady);
    }

    #[test]
    fn accept_without_the_setting_is_not_permitted() {
        let world = World::three_level();
        let engine = world.engine();

        engine.approve(&[world.selection("facility")], &user("fac-approver")).unwrap();
        let error = engine.accept(&[world.selection("facility")], &user("acceptor")).unwrap_err();
        assert!(matches!(error, ApprovalError::NotPermitted { .. }));
    }

    #[test]
    fn approve_without_permission_is_rejected_before_any_write() {
        let world = World::three_level();
        let error = world
            .engine()
            .approve(&[world.selection("district")], &user("fac-approver"))
            .unwrap_err();
        assert!(matches!(error, ApprovalError::NotReady { .. } | ApprovalError::NotPermitted { .. }));
        assert!(world.approvals.records.read().unwrap().is_empty());
    }

    #[test]
    fn ambiguous_governing_group_is_a_configuration_error() {
        let mut world = World::three_level();

        let mut levels = LevelRegistry::new(world.cache.clone());
        levels.add(ApprovalLevelId("national-level".to_owned()), "National", 1, None).unwrap();
        levels
            .add(
                ApprovalLevelId("partner-level".to_owned()),
                "Partner",
                2,
                Some(CategoryOptionGroupSetId("partners".to_owned())),
            )
            .unwrap();
        let mut workflows = WorkflowRegistry::new(world.cache.clone());
        workflows
            .add(
                ApprovalWorkflow {
                    id: WorkflowId("monthly".to_owned()),
                    name: "Monthly reporting".to_owned(),
                    period_type: PeriodType::Monthly,
                    levels: vec![
                        ApprovalLevelId("national-level".to_owned()),
                        ApprovalLevelId("partner-level".to_owned()),
                    ],
                },
                &levels,
            )
            .unwrap();
        world.levels = levels;
        world.workflows = workflows;

        world.catalog.define_combo(
            AttributeOptionComboId("mechanism".to_owned()),
            vec![CategoryOptionId("option".to_owned())],
        );
        for group in ["group-a", "group-b"] {
            world
                .catalog
                .assign_option(CategoryOptionGroupId(group.to_owned()), CategoryOptionId("option".to_owned()));
            world.catalog.add_group_to_set(
                CategoryOptionGroupSetId("partners".to_owned()),
                CategoryOptionGroupId(group.to_owned()),
            );
        }

        let mut selection = world.selection("district");
        selection.combo = Some(AttributeOptionComboId("mechanism".to_owned()));
        let error = world.engine().status(&selection).unwrap_err();
        assert!(matches!(
            error,
            ApprovalError::Configuration(ConfigurationError::AmbiguousGroupConstraint { .. })
        ));
    }

    #[test]
    fn audit_trail_is_filtered_by_read_permission() {
        let world = World::three_level();
        let engine = world.engine();

        engine.approve(&[world.selection("facility")], &user("root")).unwrap();

        let all = engine.audit_trail(&AuditFilter::default(), &user("root")).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].action, ApprovalAction::Approve);

        let visible = engine.audit_trail(&AuditFilter::default(), &user("fac-approver")).unwrap();
        assert_eq!(visible.len(), 1);

        let mut world_with_outsider = World::three_level();
        let mut users = InMemoryUserDirectory::default();
        users.upsert(UserProfile::new(user("outsider")));
        world_with_outsider.users = users;
        let engine = world_with_outsider.engine();
        engine
            .audits
            .append(AuditEntry::for_action(
                &ApprovalRecord::new(
                    ApprovalKey {
                        level: ApprovalLevelId("facility-level".to_owned()),
                        workflow: WorkflowId("monthly".to_owned()),
                        period: month(),
                        org_unit: ou("facility"),
                        combo: AttributeOptionComboId::default_combo(),
                    },
                    user("root"),
                ),
                ApprovalAction::Approve,
                &user("root"),
            ))
            .unwrap();
        let hidden = engine.audit_trail(&AuditFilter::default(), &user("outsider")).unwrap();
        assert!(hidden.is_empty());
    }

    #[test]
    fn org_unit_cascade_removes_records_and_audits() {
        let world = World::three_level();
        let engine = world.engine();

        engine.approve(&[world.selection("facility")], &user("root")).unwrap();
        assert_eq!(engine.delete_approvals_for_org_unit(&ou("facility")).unwrap(), 1);
        assert!(world.approvals.records.read().unwrap().is_empty());
        assert!(world.audits.entries.read().unwrap().is_empty());
    }

    #[test]
    fn status_with_permissions_combines_both_layers() {
        let world = World::three_level();
        let engine = world.engine();

        let result = engine
            .status_with_permissions(&world.selection("facility"), &user("fac-approver"))
            .unwrap();
        assert_eq!(result.status.state, ApprovalState::UnapprovedReady);
        assert!(result.permissions.may_approve);
        assert!(result.permissions.may_read_data);
        assert!(!result.permissions.may_accept);

        let waiting = engine
            .status_with_permissions(&world.selection("district"), &user("fac-approver"))
            .unwrap();
        assert_eq!(waiting.status.state, ApprovalState::UnapprovedWaiting);
        assert!(!waiting.permissions.may_approve);
    }

    #[test]
    fn is_approved_counts_approval_above() {
        let world = World::two_level();
        let engine = world.engine();

        engine.approve(&[world.selection("district")], &user("root")).unwrap();
        assert!(engine.is_approved(&world.selection("facility")).unwrap());
        assert!(!engine.is_approved(&world.selection("national")).unwrap());
    }
}
