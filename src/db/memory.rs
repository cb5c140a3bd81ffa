use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewUser, User, UserStore};
use crate::error::{AppError, AppResult};
use crate::validation::normalize_email;

/// In-process [`UserStore`] for tests and database-less local runs.
///
/// Contents are lost on restart. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the `is_active` flag; returns `false` if the id is unknown.
    pub async fn set_active(&self, id: Uuid, active: bool) -> bool {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove a user, as if the row had been deleted behind our back.
    pub async fn remove(&self, id: Uuid) -> Option<User> {
        self.users.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let email = normalize_email(&user.email);
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict(format!("User '{email}' already exists")));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email,
            hashed_password: user.hashed_password,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn set_password_by_email(&self, email: &str, hashed_password: &str) -> AppResult<bool> {
        let email = normalize_email(email);
        let mut users = self.users.write().await;

        match users.values_mut().find(|u| u.email == email) {
            Some(user) => {
                user.hashed_password = hashed_password.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
