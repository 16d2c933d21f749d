pub mod acl;
pub mod audit;
pub mod binding;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod hierarchy;
pub mod levels;
pub mod permissions;
pub mod settings;
pub mod storage;
pub mod users;
pub mod workflows;

pub use acl::{AclService, InMemoryAclService};
pub use audit::{ApprovalAction, AuditEntry, AuditFilter};
pub use binding::{DataSetBinding, InMemoryDataSetBinding};
pub use catalog::{governing_group, CategoryCatalog, InMemoryCategoryCatalog};
pub use config::{ApprovalConfig, ConfigError, EngineConfig};
pub use domain::category::{
    AttributeOptionComboId, CategoryOptionGroupId, CategoryOptionGroupSetId, CategoryOptionId,
};
pub use domain::level::{ApprovalLevel, ApprovalLevelId};
pub use domain::org_unit::{OrgUnit, OrgUnitId};
pub use domain::period::{Period, PeriodType};
pub use domain::record::{ApprovalKey, ApprovalRecord};
pub use domain::status::{ApprovalState, ApprovalStatus};
pub use domain::user::{Capability, UserId, UserProfile};
pub use domain::workflow::{ApprovalWorkflow, WorkflowId};
pub use engine::{ApprovalEngine, ApprovalSelection, StatusAndPermissions};
pub use errors::{ApprovalError, ConfigurationError};
pub use hierarchy::HierarchyResolver;
pub use levels::LevelRegistry;
pub use permissions::{
    PermissionCache, PermissionCacheKey, PermissionContext, Permissions, PermissionsEvaluator,
};
pub use settings::{StaticSettings, SystemSettings};
pub use storage::{ApprovalStore, AuditStore, StorageError};
pub use users::{InMemoryUserDirectory, UserDirectory};
pub use workflows::WorkflowRegistry;
