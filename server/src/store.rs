//! Document Store
//!
//! In-process, owner-scoped persistence for users, refresh tokens, and
//! tasks. Each collection guards its documents with a single `RwLock`;
//! every multi-step mutation (duplicate-email check, refresh rotation,
//! position assignment) runs under one write guard so concurrent callers
//! observe it atomically.

use crate::models::{RefreshTokenRecord, Task, TaskQuery, User};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================
// Users
// ============================================

/// User collection with a case-insensitive unique email constraint
#[derive(Default)]
pub struct UserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user, enforcing email uniqueness.
    ///
    /// Returns the stored user, or `None` when the email is already taken.
    /// The check and insert share one write guard.
    pub async fn insert(&self, user: User) -> Option<User> {
        let mut users = self.users.write().await;
        let email = user.email.to_lowercase();
        if users.values().any(|u| u.email == email) {
            return None;
        }
        users.insert(user.id, user.clone());
        Some(user)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let email = email.to_lowercase();
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
    }
}

// ============================================
// Refresh Tokens
// ============================================

/// Refresh token collection
///
/// Revoked and expired records are kept as an audit trail; expiry is
/// time-based, never storage-based.
#[derive(Default)]
pub struct TokenStore {
    tokens: RwLock<Vec<RefreshTokenRecord>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a freshly issued refresh token
    pub async fn save(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> RefreshTokenRecord {
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token: token.to_string(),
            user_id,
            issued_at: Utc::now(),
            expires_at,
            revoked: false,
        };
        self.tokens.write().await.push(record.clone());
        record
    }

    /// Find a non-revoked, non-expired record matching token and owner
    pub async fn find_active(&self, token: &str, user_id: Uuid) -> Option<RefreshTokenRecord> {
        self.tokens
            .read()
            .await
            .iter()
            .find(|r| r.token == token && r.user_id == user_id && r.is_active())
            .cloned()
    }

    /// Revoke the record matching token and owner; idempotent, and absence
    /// of the token is not an error.
    pub async fn revoke(&self, token: &str, user_id: Uuid) {
        let mut tokens = self.tokens.write().await;
        if let Some(record) = tokens
            .iter_mut()
            .find(|r| r.token == token && r.user_id == user_id)
        {
            record.revoked = true;
        }
    }

    /// One-time-use rotation: revoke the old record and persist the
    /// replacement in a single atomic mutation.
    ///
    /// Returns `None` when no active record matches the old token, which
    /// is how the loser of a concurrent rotation race observes defeat.
    pub async fn rotate(
        &self,
        old_token: &str,
        user_id: Uuid,
        new_token: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Option<RefreshTokenRecord> {
        let mut tokens = self.tokens.write().await;

        let old = tokens
            .iter_mut()
            .find(|r| r.token == old_token && r.user_id == user_id && r.is_active())?;
        old.revoked = true;

        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token: new_token.to_string(),
            user_id,
            issued_at: Utc::now(),
            expires_at: new_expires_at,
            revoked: false,
        };
        tokens.push(record.clone());
        Some(record)
    }
}

// ============================================
// Tasks
// ============================================

/// Aggregate task counts for one owner
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCounts {
    pub total: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub todo: i64,
    pub high_priority: i64,
}

/// Task collection; every read and write is scoped by owner id
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, assigning `position` = max existing position + 1
    /// for the owner (0 for the first task). Assignment happens under the
    /// write guard so concurrent creates never share a position.
    pub async fn insert(&self, mut task: Task) -> Task {
        let mut tasks = self.tasks.write().await;
        task.position = tasks
            .values()
            .filter(|t| t.user_id == task.user_id)
            .map(|t| t.position)
            .max()
            .map(|p| p + 1)
            .unwrap_or(0);
        tasks.insert(task.id, task.clone());
        task
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Option<Task> {
        self.tasks
            .read()
            .await
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned()
    }

    /// Apply a mutation to an owned task, stamping `updated_at`.
    pub async fn update<F>(&self, user_id: Uuid, id: Uuid, apply: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).filter(|t| t.user_id == user_id)?;
        apply(task);
        task.updated_at = Utc::now();
        Some(task.clone())
    }

    /// Delete an owned task permanently
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Option<Task> {
        let mut tasks = self.tasks.write().await;
        if tasks.get(&id).is_some_and(|t| t.user_id == user_id) {
            tasks.remove(&id)
        } else {
            None
        }
    }

    /// List owned tasks matching the query, newest first, with the total
    /// match count before pagination.
    pub async fn list(&self, user_id: Uuid, query: &TaskQuery) -> (Vec<Task>, i64) {
        let tasks = self.tasks.read().await;

        let search = query.search.as_ref().map(|s| s.to_lowercase());
        let mut matched: Vec<Task> = tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| query.status.map_or(true, |s| t.status == s))
            .filter(|t| query.priority.map_or(true, |p| t.priority == p))
            .filter(|t| {
                search.as_ref().map_or(true, |needle| {
                    t.title.to_lowercase().contains(needle)
                        || t.description.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as i64;
        let skip = ((query.page() - 1) * query.limit()) as usize;
        let page: Vec<Task> = matched
            .into_iter()
            .skip(skip)
            .take(query.limit() as usize)
            .collect();

        (page, total)
    }

    /// Count owned tasks by status and priority
    pub async fn counts(&self, user_id: Uuid) -> TaskCounts {
        use crate::models::{TaskPriority, TaskStatus};

        let tasks = self.tasks.read().await;
        let mut counts = TaskCounts::default();
        for task in tasks.values().filter(|t| t.user_id == user_id) {
            counts.total += 1;
            match task.status {
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Todo => counts.todo += 1,
            }
            if task.priority == TaskPriority::High {
                counts.high_priority += 1;
            }
        }
        counts
    }
}
