use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::domain::org_unit::{OrgUnit, OrgUnitId};
use crate::errors::ConfigurationError;

/// Leaf-first resolver over the org-unit tree. Depths and ancestor paths are
/// precomputed at construction so every lookup is an indexed read and every
/// walk is iterative, bounded by tree height.
#[derive(Clone, Debug, Default)]
pub struct HierarchyResolver {
    depths: HashMap<OrgUnitId, u32>,
    /// Ordered root -> parent, excluding the unit itself.
    ancestors: HashMap<OrgUnitId, Vec<OrgUnitId>>,
    children: HashMap<OrgUnitId, Vec<OrgUnitId>>,
}

impl HierarchyResolver {
    /// Builds the resolver from unordered units. Parents must themselves be
    /// present; cycles and dangling parent references are rejected.
    pub fn from_units(units: &[OrgUnit]) -> Result<Self, ConfigurationError> {
        let parents: HashMap<OrgUnitId, Option<OrgUnitId>> =
            units.iter().map(|unit| (unit.id.clone(), unit.parent.clone())).collect();

        let mut ancestors: HashMap<OrgUnitId, Vec<OrgUnitId>> = HashMap::new();
        let mut depths: HashMap<OrgUnitId, u32> = HashMap::new();
        let mut children: HashMap<OrgUnitId, Vec<OrgUnitId>> = HashMap::new();

        for unit in units {
            let mut path = Vec::new();
            let mut seen: HashSet<OrgUnitId> = HashSet::new();
            seen.insert(unit.id.clone());

            let mut current = unit.parent.clone();
            while let Some(parent_id) = current {
                if !seen.insert(parent_id.clone()) {
                    return Err(ConfigurationError::HierarchyCycle(parent_id));
                }
                let Some(grandparent) = parents.get(&parent_id) else {
                    return Err(ConfigurationError::UnknownOrgUnit(parent_id));
                };
                path.push(parent_id);
                current = grandparent.clone();
            }

            path.reverse();
            depths.insert(unit.id.clone(), path.len() as u32 + 1);
            ancestors.insert(unit.id.clone(), path);

            if let Some(parent) = &unit.parent {
                children.entry(parent.clone()).or_default().push(unit.id.clone());
            }
        }

        Ok(Self { depths, ancestors, children })
    }

    pub fn contains(&self, org_unit: &OrgUnitId) -> bool {
        self.depths.contains_key(org_unit)
    }

    /// Depth in the tree, root units being depth 1.
    pub fn depth(&self, org_unit: &OrgUnitId) -> Result<u32, ConfigurationError> {
        self.depths
            .get(org_unit)
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownOrgUnit(org_unit.clone()))
    }

    /// Ancestors ordered root -> parent, excluding the unit itself.
    pub fn ancestors(&self, org_unit: &OrgUnitId) -> Result<&[OrgUnitId], ConfigurationError> {
        self.ancestors
            .get(org_unit)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigurationError::UnknownOrgUnit(org_unit.clone()))
    }

    /// Strict descendants, breadth-first.
    pub fn descendants(&self, org_unit: &OrgUnitId) -> Result<Vec<OrgUnitId>, ConfigurationError> {
        if !self.contains(org_unit) {
            return Err(ConfigurationError::UnknownOrgUnit(org_unit.clone()));
        }

        let mut found = Vec::new();
        let mut queue: VecDeque<&OrgUnitId> = VecDeque::new();
        queue.push_back(org_unit);

        while let Some(next) = queue.pop_front() {
            if let Some(children) = self.children.get(next) {
                for child in children {
                    found.push(child.clone());
                    queue.push_back(child);
                }
            }
        }

        Ok(found)
    }

    pub fn is_strict_descendant(&self, candidate: &OrgUnitId, of: &OrgUnitId) -> bool {
        self.ancestors.get(candidate).is_some_and(|path| path.contains(of))
    }

    pub fn is_same_or_descendant(&self, candidate: &OrgUnitId, of: &OrgUnitId) -> bool {
        candidate == of || self.is_strict_descendant(candidate, of)
    }

    /// Whether the unit sits at or below any of the given subtree roots.
    pub fn in_any_subtree(&self, org_unit: &OrgUnitId, roots: &BTreeSet<OrgUnitId>) -> bool {
        roots.iter().any(|root| self.is_same_or_descendant(org_unit, root))
    }

    /// Walks parent links leafward-to-root and returns the first ancestor
    /// satisfying the predicate.
    pub fn nearest_ancestor_where<F>(&self, org_unit: &OrgUnitId, mut predicate: F) -> Option<OrgUnitId>
    where
        F: FnMut(&OrgUnitId) -> bool,
    {
        self.ancestors
            .get(org_unit)?
            .iter()
            .rev()
            .find(|ancestor| predicate(ancestor))
            .cloned()
    }
}
