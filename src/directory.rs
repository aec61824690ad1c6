//! Read-only lookup of assignee display fields.

use crate::{domain::Assignee, error::Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// External user directory. Tasks only hold a weak reference to a user;
/// this resolves it to the current display fields.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve(&self, user_id: &str) -> Result<Option<Assignee>>;
}

/// Directory backed by a fixed set of users
#[derive(Debug, Default, Clone)]
pub struct StaticUserDirectory {
    users: HashMap<String, Assignee>,
}

impl StaticUserDirectory {
    pub fn new(users: impl IntoIterator<Item = Assignee>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    pub fn insert(&mut self, user: Assignee) {
        self.users.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn resolve(&self, user_id: &str) -> Result<Option<Assignee>> {
        Ok(self.users.get(user_id).cloned())
    }
}
