use serde::{Deserialize, Serialize};

use crate::domain::category::CategoryOptionGroupSetId;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApprovalLevelId(pub String);

/// A rung in the approval ladder. `sequence` totally orders all levels
/// system-wide: 1 is the root-most rung, larger sequences sit lower in the
/// cascade and must be approved first. `org_unit_depth` ties the level to a
/// tree depth, and the optional group-set constraint narrows it to the
/// attribute option combos whose options fall in one of that set's groups,
/// which is what allows several parallel levels at one depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    pub id: ApprovalLevelId,
    pub name: String,
    pub sequence: u32,
    pub org_unit_depth: u32,
    pub group_set: Option<CategoryOptionGroupSetId>,
}
