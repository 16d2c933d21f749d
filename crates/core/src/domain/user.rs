use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::category::CategoryOptionGroupId;
use crate::domain::org_unit::OrgUnitId;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Typed capability flags replacing free-form authority strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Approve at the user's own assigned org units.
    Approve,
    /// Approve at strict descendants of assigned org units.
    ApproveLower,
    /// Accept approvals made at strict descendants of assigned org units.
    AcceptLower,
    /// Read data that is not yet approved, regardless of org-unit scope.
    ViewUnapproved,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub superuser: bool,
    pub capabilities: BTreeSet<Capability>,
    pub assigned_org_units: BTreeSet<OrgUnitId>,
    pub data_view_org_units: BTreeSet<OrgUnitId>,
    /// When non-empty, the user may only act on combos governed by one of
    /// these groups.
    pub category_constraints: BTreeSet<CategoryOptionGroupId>,
}

impl UserProfile {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            superuser: false,
            capabilities: BTreeSet::new(),
            assigned_org_units: BTreeSet::new(),
            data_view_org_units: BTreeSet::new(),
            category_constraints: BTreeSet::new(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.superuser || self.capabilities.contains(&capability)
    }
}
