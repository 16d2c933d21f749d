use std::collections::{BTreeSet, HashMap};

use crate::domain::category::AttributeOptionComboId;
use crate::domain::org_unit::OrgUnitId;
use crate::domain::period::Period;
use crate::domain::workflow::WorkflowId;

/// Answers which org units report data under a workflow, and which combos
/// are valid partitions of it. Backed by data-set assignments upstream.
pub trait DataSetBinding: Send + Sync {
    fn is_org_unit_bound(
        &self,
        workflow: &WorkflowId,
        org_unit: &OrgUnitId,
        period: &Period,
    ) -> bool;

    fn is_combo_valid(&self, workflow: &WorkflowId, combo: &AttributeOptionComboId) -> bool;
}

/// In-memory binding: explicit org-unit assignments per workflow, valid for
/// every period. A workflow with no registered combos accepts any combo.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDataSetBinding {
    org_units: HashMap<WorkflowId, BTreeSet<OrgUnitId>>,
    combos: HashMap<WorkflowId, BTreeSet<AttributeOptionComboId>>,
}

impl InMemoryDataSetBinding {
    pub fn bind_org_unit(&mut self, workflow: WorkflowId, org_unit: OrgUnitId) {
        self.org_units.entry(workflow).or_default().insert(org_unit);
    }

    pub fn allow_combo(&mut self, workflow: WorkflowId, combo: AttributeOptionComboId) {
        self.combos.entry(workflow).or_default().insert(combo);
    }
}

impl DataSetBinding for InMemoryDataSetBinding {
    fn is_org_unit_bound(
        &self,
        workflow: &WorkflowId,
        org_unit: &OrgUnitId,
        _period: &Period,
    ) -> bool {
        self.org_units.get(workflow).is_some_and(|units| units.contains(org_unit))
    }

    fn is_combo_valid(&self, workflow: &WorkflowId, combo: &AttributeOptionComboId) -> bool {
        match self.combos.get(workflow) {
            Some(combos) => combos.contains(combo),
            None => true,
        }
    }
}
