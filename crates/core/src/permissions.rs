use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::acl::AclService;
use crate::catalog::CategoryCatalog;
use crate::domain::category::{
    AttributeOptionComboId, CategoryOptionGroupId, CategoryOptionGroupSetId,
};
use crate::domain::level::ApprovalLevelId;
use crate::domain::org_unit::OrgUnitId;
use crate::domain::status::{ApprovalState, ApprovalStatus};
use crate::domain::user::{Capability, UserId, UserProfile};
use crate::domain::workflow::WorkflowId;
use crate::errors::ConfigurationError;
use crate::hierarchy::HierarchyResolver;
use crate::settings::SystemSettings;
use crate::users::UserDirectory;

/// What the acting user may do with one computed status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub may_approve: bool,
    pub may_unapprove: bool,
    pub may_accept: bool,
    pub may_unaccept: bool,
    pub may_read_data: bool,
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            may_approve: true,
            may_unapprove: true,
            may_accept: true,
            may_unaccept: true,
            may_read_data: true,
        }
    }
}

/// The state-independent part of a permission decision: whether the user's
/// capabilities, org-unit scope, category constraints and ACL visibility
/// reach this selection at all. Only this part is cached; the lifecycle
/// state is folded in per call, so approvals themselves never stale the
/// cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PermissionScope {
    approve: bool,
    accept: bool,
    read: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PermissionCacheKey {
    pub user: UserId,
    pub workflow: WorkflowId,
    pub level: Option<ApprovalLevelId>,
    pub org_unit: OrgUnitId,
    pub combo: AttributeOptionComboId,
}

#[derive(Debug, Default)]
struct CacheShared {
    version: AtomicU64,
    entries: RwLock<HashMap<PermissionCacheKey, (u64, PermissionScope)>>,
}

/// Process-wide permission cache. Entries are tagged with the version
/// counter at insert time; `invalidate` bumps the counter and every older
/// entry is dead without being individually evicted. Cloning shares the
/// underlying cache.
#[derive(Clone, Debug, Default)]
pub struct PermissionCache {
    inner: Arc<CacheShared>,
}

impl PermissionCache {
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Broadcast invalidation: all subsequent reads miss. Called on every
    /// mutation of levels, workflows, hierarchy, group membership or ACLs.
    pub fn invalidate(&self) {
        self.inner.version.fetch_add(1, Ordering::SeqCst);
    }

    fn get(&self, key: &PermissionCacheKey) -> Option<PermissionScope> {
        let entries = match self.inner.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (tag, scope) = entries.get(key)?;
        (*tag == self.version()).then_some(*scope)
    }

    fn insert(&self, key: PermissionCacheKey, scope: PermissionScope) {
        let version = self.version();
        let mut entries = match self.inner.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key, (version, scope));
    }

    /// Number of entries created under the current version. Stale entries
    /// are not counted even though they still occupy the map.
    pub fn live_entries(&self) -> usize {
        let version = self.version();
        let entries = match self.inner.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.values().filter(|(tag, _)| *tag == version).count()
    }
}

/// Selection a permission decision is evaluated against. `level`, the
/// group-set and the governing group come from the applicable-level
/// resolution done by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionContext {
    pub workflow: WorkflowId,
    pub level: Option<ApprovalLevelId>,
    pub org_unit: OrgUnitId,
    pub combo: AttributeOptionComboId,
    pub group_set: Option<CategoryOptionGroupSetId>,
    pub governing_group: Option<CategoryOptionGroupId>,
}

pub struct PermissionsEvaluator<'a> {
    hierarchy: &'a HierarchyResolver,
    users: &'a dyn UserDirectory,
    acl: &'a dyn AclService,
    catalog: &'a dyn CategoryCatalog,
    settings: &'a dyn SystemSettings,
    cache: PermissionCache,
}

impl<'a> PermissionsEvaluator<'a> {
    pub fn new(
        hierarchy: &'a HierarchyResolver,
        users: &'a dyn UserDirectory,
        acl: &'a dyn AclService,
        catalog: &'a dyn CategoryCatalog,
        settings: &'a dyn SystemSettings,
        cache: PermissionCache,
    ) -> Self {
        Self { hierarchy, users, acl, catalog, settings, cache }
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// Evaluates the allowed actions for `user` against a computed status.
    /// Rules are evaluated in order, first true wins per flag; capability
    /// combinations are additive.
    pub fn evaluate(
        &self,
        user: &UserId,
        context: &PermissionContext,
        status: &ApprovalStatus,
    ) -> Result<Permissions, ConfigurationError> {
        let profile = self
            .users
            .profile(user)
            .ok_or_else(|| ConfigurationError::UnknownUser(user.clone()))?;

        if profile.superuser {
            return Ok(Permissions::all());
        }

        let key = PermissionCacheKey {
            user: user.clone(),
            workflow: context.workflow.clone(),
            level: context.level.clone(),
            org_unit: context.org_unit.clone(),
            combo: context.combo.clone(),
        };

        let scope = match self.cache.get(&key) {
            Some(scope) => scope,
            None => {
                let scope = self.compute_scope(&profile, context);
                self.cache.insert(key, scope);
                scope
            }
        };

        let acceptance = self.settings.acceptance_required_for_approval();
        let state = status.state;

        Ok(Permissions {
            may_approve: scope.approve && state.is_ready_for_approval(),
            may_unapprove: scope.approve && state == ApprovalState::ApprovedHere,
            may_accept: acceptance && scope.accept && state == ApprovalState::ApprovedHere,
            may_unaccept: acceptance && scope.accept && state == ApprovalState::AcceptedHere,
            may_read_data: scope.read,
        })
    }

    fn compute_scope(&self, profile: &UserProfile, context: &PermissionContext) -> PermissionScope {
        let org_unit = &context.org_unit;

        let at_assigned = profile.assigned_org_units.contains(org_unit);
        let below_assigned = profile
            .assigned_org_units
            .iter()
            .any(|assigned| self.hierarchy.is_strict_descendant(org_unit, assigned));
        let in_assigned = at_assigned || below_assigned;
        let in_view = self.hierarchy.in_any_subtree(org_unit, &profile.data_view_org_units);

        let category_ok = profile.category_constraints.is_empty()
            || context
                .governing_group
                .as_ref()
                .map_or(true, |group| profile.category_constraints.contains(group));

        let visible = self.combo_visible(&profile.id, context);

        let approve = category_ok
            && ((profile.has(Capability::Approve) && at_assigned)
                || (profile.has(Capability::ApproveLower) && below_assigned));

        let accept = category_ok && profile.has(Capability::AcceptLower) && below_assigned;

        let read = visible
            && (in_assigned || in_view || profile.has(Capability::ViewUnapproved));

        PermissionScope { approve, accept, read }
    }

    /// ACL visibility over the combo's category dimension: every option of
    /// the combo, every group those options belong to, and the governing
    /// group-set must be readable. Private sharing on any of them hides the
    /// partition entirely.
    fn combo_visible(&self, user: &UserId, context: &PermissionContext) -> bool {
        if let Some(set) = &context.group_set {
            if !self.acl.may_view_group_set(user, set) {
                return false;
            }
        }

        for option in self.catalog.options_of(&context.combo) {
            if !self.acl.may_view_option(user, &option) {
                return false;
            }
            for group in self.catalog.groups_of(&option) {
                if !self.acl.may_view_group(user, &group) {
                    return false;
                }
            }
        }

        true
    }
}
