use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::category::AttributeOptionComboId;
use crate::domain::level::ApprovalLevelId;
use crate::domain::org_unit::OrgUnitId;
use crate::domain::period::Period;
use crate::domain::record::ApprovalRecord;
use crate::domain::user::UserId;
use crate::domain::workflow::WorkflowId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Unapprove,
    Accept,
    Unaccept,
}

/// Immutable snapshot of an approval record at the moment an action was
/// taken on it. Entries are append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub action: ApprovalAction,
    pub level: ApprovalLevelId,
    pub workflow: WorkflowId,
    pub period: Period,
    pub org_unit: OrgUnitId,
    pub combo: AttributeOptionComboId,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}

impl AuditEntry {
    pub fn for_action(record: &ApprovalRecord, action: ApprovalAction, actor: &UserId) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action,
            level: record.key.level.clone(),
            workflow: record.key.workflow.clone(),
            period: record.key.period.clone(),
            org_unit: record.key.org_unit.clone(),
            combo: record.key.combo.clone(),
            accepted: record.accepted,
            created_at: Utc::now(),
            created_by: actor.clone(),
        }
    }
}

/// All filter fields are conjunctive; an empty collection or `None` bound
/// matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub workflows: Vec<WorkflowId>,
    pub levels: Vec<ApprovalLevelId>,
    pub org_units: Vec<OrgUnitId>,
    pub periods: Vec<Period>,
    pub combos: Vec<AttributeOptionComboId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        (self.workflows.is_empty() || self.workflows.contains(&entry.workflow))
            && (self.levels.is_empty() || self.levels.contains(&entry.level))
            && (self.org_units.is_empty() || self.org_units.contains(&entry.org_unit))
            && (self.periods.is_empty() || self.periods.contains(&entry.period))
            && (self.combos.is_empty() || self.combos.contains(&entry.combo))
            && self.from.map_or(true, |from| entry.created_at >= from)
            && self.to.map_or(true, |to| entry.created_at <= to)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::audit::{ApprovalAction, AuditEntry, AuditFilter};
    use crate::domain::category::AttributeOptionComboId;
    use crate::domain::level::ApprovalLevelId;
    use crate::domain::org_unit::OrgUnitId;
    use crate::domain::period::{Period, PeriodType};
    use crate::domain::record::{ApprovalKey, ApprovalRecord};
    use crate::domain::user::UserId;
    use crate::domain::workflow::WorkflowId;

    fn entry() -> AuditEntry {
        let record = ApprovalRecord::new(
            ApprovalKey {
                level: ApprovalLevelId("district".to_owned()),
                workflow: WorkflowId("monthly-reporting".to_owned()),
                period: Period { period_type: PeriodType::Monthly, code: "2026-06".to_owned() },
                org_unit: OrgUnitId("ou-district-1".to_owned()),
                combo: AttributeOptionComboId::default_combo(),
            },
            UserId("u-approver".to_owned()),
        );
        AuditEntry::for_action(&record, ApprovalAction::Approve, &UserId("u-approver".to_owned()))
    }

    #[test]
    fn empty_filter_matches_any_entry() {
        assert!(AuditFilter::default().matches(&entry()));
    }

    #[test]
    fn filter_narrows_by_workflow_and_org_unit() {
        let entry = entry();
        let mut filter = AuditFilter {
            workflows: vec![WorkflowId("monthly-reporting".to_owned())],
            org_units: vec![OrgUnitId("ou-district-1".to_owned())],
            ..AuditFilter::default()
        };
        assert!(filter.matches(&entry));

        filter.org_units = vec![OrgUnitId("ou-other".to_owned())];
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn date_range_bounds_are_inclusive() {
        let entry = entry();
        let filter = AuditFilter {
            from: Some(entry.created_at - Duration::seconds(1)),
            to: Some(Utc::now() + Duration::seconds(1)),
            ..AuditFilter::default()
        };
        assert!(filter.matches(&entry));

        let filter = AuditFilter {
            from: Some(entry.created_at + Duration::seconds(60)),
            ..AuditFilter::default()
        };
        assert!(!filter.matches(&entry));
    }
}
