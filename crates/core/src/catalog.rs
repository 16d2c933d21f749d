use std::collections::{BTreeSet, HashMap};

use crate::domain::category::{
    AttributeOptionComboId, CategoryOptionGroupId, CategoryOptionGroupSetId, CategoryOptionId,
};
use crate::errors::ConfigurationError;
use crate::permissions::PermissionCache;

/// Read-only lookups into the category dimension catalog.
pub trait CategoryCatalog: Send + Sync {
    fn options_of(&self, combo: &AttributeOptionComboId) -> BTreeSet<CategoryOptionId>;
    fn groups_of(&self, option: &CategoryOptionId) -> BTreeSet<CategoryOptionGroupId>;
    fn groups_in_set(&self, set: &CategoryOptionGroupSetId) -> BTreeSet<CategoryOptionGroupId>;
}

/// Resolves the single group of `set` that governs `combo`: the group the
/// combo's category options fall into. A combo whose options land in more
/// than one group of the same set is a configuration error, never a silent
/// pick. `None` means the set does not constrain this combo at all.
pub fn governing_group(
    catalog: &dyn CategoryCatalog,
    set: &CategoryOptionGroupSetId,
    combo: &AttributeOptionComboId,
) -> Result<Option<CategoryOptionGroupId>, ConfigurationError> {
    let set_groups = catalog.groups_in_set(set);

    let mut matched: BTreeSet<CategoryOptionGroupId> = BTreeSet::new();
    for option in catalog.options_of(combo) {
        for group in catalog.groups_of(&option) {
            if set_groups.contains(&group) {
                matched.insert(group);
            }
        }
    }

    match matched.len() {
        0 => Ok(None),
        1 => Ok(matched.into_iter().next()),
        _ => Err(ConfigurationError::AmbiguousGroupConstraint {
            group_set: set.clone(),
            combo: combo.clone(),
            groups: matched.into_iter().collect(),
        }),
    }
}

/// In-memory catalog. Membership mutations invalidate the shared permission
/// cache, since level applicability and ACL reads both derive from them.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCategoryCatalog {
    cache: PermissionCache,
    combo_options: HashMap<AttributeOptionComboId, BTreeSet<CategoryOptionId>>,
    option_groups: HashMap<CategoryOptionId, BTreeSet<CategoryOptionGroupId>>,
    set_groups: HashMap<CategoryOptionGroupSetId, BTreeSet<CategoryOptionGroupId>>,
}

impl InMemoryCategoryCatalog {
    pub fn new(cache: PermissionCache) -> Self {
        Self { cache, ..Self::default() }
    }

    pub fn define_combo(&mut self, combo: AttributeOptionComboId, options: Vec<CategoryOptionId>) {
        self.combo_options.insert(combo, options.into_iter().collect());
        self.cache.invalidate();
    }

    pub fn assign_option(&mut self, group: CategoryOptionGroupId, option: CategoryOptionId) {
        self.option_groups.entry(option).or_default().insert(group);
        self.cache.invalidate();
    }

    pub fn add_group_to_set(&mut self, set: CategoryOptionGroupSetId, group: CategoryOptionGroupId) {
        self.set_groups.entry(set).or_default().insert(group);
        self.cache.invalidate();
    }
}

impl CategoryCatalog for InMemoryCategoryCatalog {
    fn options_of(&self, combo: &AttributeOptionComboId) -> BTreeSet<CategoryOptionId> {
        self.combo_options.get(combo).cloned().unwrap_or_default()
    }

    fn groups_of(&self, option: &CategoryOptionId) -> BTreeSet<CategoryOptionGroupId> {
        self.option_groups.get(option).cloned().unwrap_or_default()
    }

    fn groups_in_set(&self, set: &CategoryOptionGroupSetId) -> BTreeSet<CategoryOptionGroupId> {
        self.set_groups.get(set).cloned().unwrap_or_default()
    }
}
