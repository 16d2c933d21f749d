use std::collections::HashMap;

use crate::domain::user::{UserId, UserProfile};

/// Resolves the acting user's profile: capabilities, org-unit assignments,
/// category constraints and the superuser flag.
pub trait UserDirectory: Send + Sync {
    fn profile(&self, user: &UserId) -> Option<UserProfile>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryUserDirectory {
    profiles: HashMap<UserId, UserProfile>,
}

impl InMemoryUserDirectory {
    pub fn upsert(&mut self, profile: UserProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn profile(&self, user: &UserId) -> Option<UserProfile> {
        self.profiles.get(user).cloned()
    }
}
