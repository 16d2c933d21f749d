use std::collections::HashMap;

use crate::domain::level::{ApprovalLevel, ApprovalLevelId};
use crate::domain::period::Period;
use crate::domain::workflow::{ApprovalWorkflow, WorkflowId};
use crate::errors::ConfigurationError;
use crate::levels::LevelRegistry;
use crate::permissions::PermissionCache;

/// Registry of approval workflows: named ordered subsets of the registered
/// levels plus the period type every interaction must use.
#[derive(Clone, Debug, Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<WorkflowId, ApprovalWorkflow>,
    cache: PermissionCache,
}

impl WorkflowRegistry {
    pub fn new(cache: PermissionCache) -> Self {
        Self { workflows: HashMap::new(), cache }
    }

    /// Registers a workflow after checking that every referenced level
    /// exists. A workflow without levels is registrable; every selection
    /// against it is simply unapprovable.
    pub fn add(
        &mut self,
        workflow: ApprovalWorkflow,
        levels: &LevelRegistry,
    ) -> Result<(), ConfigurationError> {
        for level in &workflow.levels {
            if !levels.exists(level) {
                return Err(ConfigurationError::UnknownLevel(level.clone()));
            }
        }
        self.workflows.insert(workflow.id.clone(), workflow);
        self.cache.invalidate();
        Ok(())
    }

    pub fn get(&self, id: &WorkflowId) -> Option<&ApprovalWorkflow> {
        self.workflows.get(id)
    }

    pub fn require(&self, id: &WorkflowId) -> Result<&ApprovalWorkflow, ConfigurationError> {
        self.get(id).ok_or_else(|| ConfigurationError::UnknownWorkflow(id.clone()))
    }

    pub fn all(&self) -> Vec<&ApprovalWorkflow> {
        let mut all: Vec<&ApprovalWorkflow> = self.workflows.values().collect();
        all.sort_by(|left, right| left.id.cmp(&right.id));
        all
    }

    pub fn delete(&mut self, id: &WorkflowId) -> Result<ApprovalWorkflow, ConfigurationError> {
        let removed = self
            .workflows
            .remove(id)
            .ok_or_else(|| ConfigurationError::UnknownWorkflow(id.clone()))?;
        self.cache.invalidate();
        Ok(removed)
    }

    /// Cascade for level deletion: drops the level from every workflow that
    /// references it. Returns how many workflows were touched.
    pub fn remove_level_from_all(&mut self, level: &ApprovalLevelId) -> usize {
        let mut touched = 0;
        for workflow in self.workflows.values_mut() {
            let before = workflow.levels.len();
            workflow.levels.retain(|id| id != level);
            if workflow.levels.len() != before {
                touched += 1;
            }
        }
        if touched > 0 {
            self.cache.invalidate();
        }
        touched
    }

    /// The workflow's levels resolved against the registry, sequence order.
    pub fn sorted_levels(
        &self,
        id: &WorkflowId,
        levels: &LevelRegistry,
    ) -> Result<Vec<ApprovalLevel>, ConfigurationError> {
        let workflow = self.require(id)?;
        levels.resolve_sorted(&workflow.levels)
    }

    /// Every status query or mutation must use a period of the workflow's
    /// period type.
    pub fn check_period(&self, id: &WorkflowId, period: &Period) -> Result<(), ConfigurationError> {
        let workflow = self.require(id)?;
        if workflow.period_type != period.period_type {
            return Err(ConfigurationError::WrongPeriodType {
                workflow: id.clone(),
                expected: workflow.period_type,
                actual: period.period_type,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::level::ApprovalLevelId;
    use crate::domain::period::{Period, PeriodType};
    use crate::domain::workflow::{ApprovalWorkflow, WorkflowId};
    use crate::errors::ConfigurationError;
    use crate::levels::LevelRegistry;
    use crate::workflows::WorkflowRegistry;

    fn registry_with_levels() -> (LevelRegistry, WorkflowRegistry) {
        let mut levels = LevelRegistry::default();
        levels.add(ApprovalLevelId("national".to_owned()), "National", 1, None).unwrap();
        levels.add(ApprovalLevelId("district".to_owned()), "District", 2, None).unwrap();
        (levels, WorkflowRegistry::default())
    }

    fn workflow(id: &str, level_ids: &[&str]) -> ApprovalWorkflow {
        ApprovalWorkflow {
            id: WorkflowId(id.to_owned()),
            name: id.to_owned(),
            period_type: PeriodType::Monthly,
            levels: level_ids.iter().map(|l| ApprovalLevelId((*l).to_owned())).collect(),
        }
    }

    #[test]
    fn add_rejects_unknown_levels() {
        let (levels, mut workflows) = registry_with_levels();
        let error = workflows.add(workflow("w", &["missing"]), &levels).unwrap_err();
        assert_eq!(error, ConfigurationError::UnknownLevel(ApprovalLevelId("missing".to_owned())));
    }

    #[test]
    fn sorted_levels_follow_registry_sequence() {
        let (levels, mut workflows) = registry_with_levels();
        workflows.add(workflow("w", &["district", "national"]), &levels).unwrap();

        let sorted = workflows.sorted_levels(&WorkflowId("w".to_owned()), &levels).unwrap();
        let names: Vec<&str> = sorted.iter().map(|level| level.name.as_str()).collect();
        assert_eq!(names, vec!["National", "District"]);
    }

    #[test]
    fn period_type_mismatch_is_a_configuration_error() {
        let (levels, mut workflows) = registry_with_levels();
        workflows.add(workflow("w", &["national"]), &levels).unwrap();

        let quarterly = Period { period_type: PeriodType::Quarterly, code: "2026-Q2".to_owned() };
        let error = workflows.check_period(&WorkflowId("w".to_owned()), &quarterly).unwrap_err();
        assert!(matches!(error, ConfigurationError::WrongPeriodType { .. }));
    }

    #[test]
    fn deleting_a_level_cascades_out_of_workflows() {
        let (levels, mut workflows) = registry_with_levels();
        workflows.add(workflow("w", &["national", "district"]), &levels).unwrap();

        let touched = workflows.remove_level_from_all(&ApprovalLevelId("district".to_owned()));
        assert_eq!(touched, 1);
        assert_eq!(
            workflows.get(&WorkflowId("w".to_owned())).unwrap().levels,
            vec![ApprovalLevelId("national".to_owned())]
        );
    }
}
