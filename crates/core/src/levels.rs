use crate::domain::category::CategoryOptionGroupSetId;
use crate::domain::level::{ApprovalLevel, ApprovalLevelId};
use crate::errors::ConfigurationError;
use crate::permissions::PermissionCache;

/// Registry of all approval levels. Levels are kept ordered by sequence,
/// sequences stay contiguous from 1 across every mutation, and ordering
/// follows org-unit depth; parallel levels at one depth (differing only in
/// group-set constraint) can be reordered relative to each other.
#[derive(Clone, Debug, Default)]
pub struct LevelRegistry {
    levels: Vec<ApprovalLevel>,
    cache: PermissionCache,
}

impl LevelRegistry {
    pub fn new(cache: PermissionCache) -> Self {
        Self { levels: Vec::new(), cache }
    }

    /// Registers a level at its depth-ordered position and returns the
    /// assigned sequence. Two levels may share a depth only when their
    /// group-set constraints differ.
    pub fn add(
        &mut self,
        id: ApprovalLevelId,
        name: impl Into<String>,
        org_unit_depth: u32,
        group_set: Option<CategoryOptionGroupSetId>,
    ) -> Result<u32, ConfigurationError> {
        if self.levels.iter().any(|level| level.id == id) {
            return Err(ConfigurationError::DuplicateLevel(id));
        }
        if self
            .levels
            .iter()
            .any(|level| level.org_unit_depth == org_unit_depth && level.group_set == group_set)
        {
            return Err(ConfigurationError::DuplicateLevelPosition { org_unit_depth, group_set });
        }

        let position = self
            .levels
            .iter()
            .position(|level| level.org_unit_depth > org_unit_depth)
            .unwrap_or(self.levels.len());

        self.levels.insert(
            position,
            ApprovalLevel { id, name: name.into(), sequence: 0, org_unit_depth, group_set },
        );
        self.renumber();
        self.cache.invalidate();

        Ok(self.levels[position].sequence)
    }

    /// Deletes a level; remaining levels are renumbered to stay contiguous.
    pub fn delete(&mut self, id: &ApprovalLevelId) -> Result<ApprovalLevel, ConfigurationError> {
        let position = self
            .levels
            .iter()
            .position(|level| &level.id == id)
            .ok_or_else(|| ConfigurationError::UnknownLevel(id.clone()))?;

        let removed = self.levels.remove(position);
        self.renumber();
        self.cache.invalidate();
        Ok(removed)
    }

    /// A level can move up only past a neighbour at the same depth; order
    /// across depths is fixed by the tree.
    pub fn can_move_up(&self, id: &ApprovalLevelId) -> bool {
        self.levels
            .iter()
            .position(|level| &level.id == id)
            .is_some_and(|position| {
                position > 0
                    && self.levels[position - 1].org_unit_depth
                        == self.levels[position].org_unit_depth
            })
    }

    pub fn can_move_down(&self, id: &ApprovalLevelId) -> bool {
        self.levels
            .iter()
            .position(|level| &level.id == id)
            .is_some_and(|position| {
                position + 1 < self.levels.len()
                    && self.levels[position + 1].org_unit_depth
                        == self.levels[position].org_unit_depth
            })
    }

    pub fn move_up(&mut self, id: &ApprovalLevelId) -> Result<(), ConfigurationError> {
        if !self.exists(id) {
            return Err(ConfigurationError::UnknownLevel(id.clone()));
        }
        if self.can_move_up(id) {
            let position = self.levels.iter().position(|level| &level.id == id).unwrap_or(0);
            self.levels.swap(position - 1, position);
            self.renumber();
            self.cache.invalidate();
        }
        Ok(())
    }

    pub fn move_down(&mut self, id: &ApprovalLevelId) -> Result<(), ConfigurationError> {
        if !self.exists(id) {
            return Err(ConfigurationError::UnknownLevel(id.clone()));
        }
        if self.can_move_down(id) {
            let position = self.levels.iter().position(|level| &level.id == id).unwrap_or(0);
            self.levels.swap(position, position + 1);
            self.renumber();
            self.cache.invalidate();
        }
        Ok(())
    }

    pub fn exists(&self, id: &ApprovalLevelId) -> bool {
        self.levels.iter().any(|level| &level.id == id)
    }

    pub fn get(&self, id: &ApprovalLevelId) -> Option<&ApprovalLevel> {
        self.levels.iter().find(|level| &level.id == id)
    }

    pub fn require(&self, id: &ApprovalLevelId) -> Result<&ApprovalLevel, ConfigurationError> {
        self.get(id).ok_or_else(|| ConfigurationError::UnknownLevel(id.clone()))
    }

    /// All levels, sequence order.
    pub fn all(&self) -> &[ApprovalLevel] {
        &self.levels
    }

    /// Resolves the given ids and returns them sorted by sequence.
    pub fn resolve_sorted(
        &self,
        ids: &[ApprovalLevelId],
    ) -> Result<Vec<ApprovalLevel>, ConfigurationError> {
        let mut resolved = ids
            .iter()
            .map(|id| self.require(id).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        resolved.sort_by_key(|level| level.sequence);
        Ok(resolved)
    }

    fn renumber(&mut self) {
        for (index, level) in self.levels.iter_mut().enumerate() {
            level.sequence = index as u32 + 1;
        }
    }
}
