use std::collections::{BTreeSet, HashMap};

use crate::domain::category::{CategoryOptionGroupId, CategoryOptionGroupSetId, CategoryOptionId};
use crate::domain::user::UserId;
use crate::permissions::PermissionCache;

/// Object-level sharing on the category dimension. Anything not privately
/// shared is public-read.
pub trait AclService: Send + Sync {
    fn may_view_option(&self, user: &UserId, option: &CategoryOptionId) -> bool;
    fn may_view_group(&self, user: &UserId, group: &CategoryOptionGroupId) -> bool;
    fn may_view_group_set(&self, user: &UserId, set: &CategoryOptionGroupSetId) -> bool;
}

/// In-memory ACLs: objects are public until restricted to an explicit reader
/// set. Sharing changes invalidate the shared permission cache.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAclService {
    cache: PermissionCache,
    private_options: HashMap<CategoryOptionId, BTreeSet<UserId>>,
    private_groups: HashMap<CategoryOptionGroupId, BTreeSet<UserId>>,
    private_sets: HashMap<CategoryOptionGroupSetId, BTreeSet<UserId>>,
}

impl InMemoryAclService {
    pub fn new(cache: PermissionCache) -> Self {
        Self { cache, ..Self::default() }
    }

    pub fn restrict_option(&mut self, option: CategoryOptionId, readers: Vec<UserId>) {
        self.private_options.insert(option, readers.into_iter().collect());
        self.cache.invalidate();
    }

    pub fn restrict_group(&mut self, group: CategoryOptionGroupId, readers: Vec<UserId>) {
        self.private_groups.insert(group, readers.into_iter().collect());
        self.cache.invalidate();
    }

    pub fn restrict_group_set(&mut self, set: CategoryOptionGroupSetId, readers: Vec<UserId>) {
        self.private_sets.insert(set, readers.into_iter().collect());
        self.cache.invalidate();
    }
}

impl AclService for InMemoryAclService {
    fn may_view_option(&self, user: &UserId, option: &CategoryOptionId) -> bool {
        self.private_options.get(option).map_or(true, |readers| readers.contains(user))
    }

    fn may_view_group(&self, user: &UserId, group: &CategoryOptionGroupId) -> bool {
        self.private_groups.get(group).map_or(true, |readers| readers.contains(user))
    }

    fn may_view_group_set(&self, user: &UserId, set: &CategoryOptionGroupSetId) -> bool {
        self.private_sets.get(set).map_or(true, |readers| readers.contains(user))
    }
}
