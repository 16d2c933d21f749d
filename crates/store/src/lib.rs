pub mod memory;

pub use memory::{InMemoryApprovalStore, InMemoryAuditStore};
