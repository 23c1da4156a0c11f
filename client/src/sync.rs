//! Task Sync Engine
//!
//! Optimistic mutation layer over the local task list. Changes apply
//! locally first and reconcile with the server response:
//!
//! - create: provisional entry, replaced by the server copy or removed
//! - update: snapshot, patch locally, send the FULL merged record, roll
//!   back to the snapshot on failure
//! - delete: removed locally immediately, never rolled back
//! - reorder: fire-and-forget, local order not corrected on failure
//!
//! The delete/reorder asymmetry mirrors the product behavior: those paths
//! trade consistency for responsiveness.

use crate::error::ClientError;
use crate::http::ApiClient;
use crate::models::{
    NewTask, Pagination, StatsData, StatsRates, StatsSummary, Task, TaskPatch, TaskPriority,
    TaskQuery, TaskStatus,
};

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Optimistic task synchronization engine
pub struct TaskSyncEngine {
    api: Arc<ApiClient>,
    tasks: RwLock<Vec<Task>>,
    stats: RwLock<Option<StatsData>>,
    pagination: RwLock<Option<Pagination>>,
}

impl TaskSyncEngine {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            tasks: RwLock::new(Vec::new()),
            stats: RwLock::new(None),
            pagination: RwLock::new(None),
        }
    }

    /// Current local task list
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    /// Pagination from the last successful load
    pub async fn pagination(&self) -> Option<Pagination> {
        self.pagination.read().await.clone()
    }

    /// Fetch the task list from the server, replacing local state
    pub async fn load(&self, query: &TaskQuery) -> Result<Vec<Task>, ClientError> {
        let data = self.api.list_tasks(query).await?;
        *self.tasks.write().await = data.tasks.clone();
        *self.pagination.write().await = Some(data.pagination);
        Ok(data.tasks)
    }

    // ============================================
    // Optimistic Mutations
    // ============================================

    /// Create a task optimistically
    ///
    /// A provisional entry with a client-minted id is prepended at once;
    /// the server response replaces it, or a failure removes it.
    pub async fn create(&self, new_task: NewTask) -> Result<Task, ClientError> {
        let provisional = self.provisional_task(&new_task).await;
        let provisional_id = provisional.id;
        self.tasks.write().await.insert(0, provisional);

        match self.api.create_task(&new_task).await {
            Ok(created) => {
                let mut tasks = self.tasks.write().await;
                if let Some(entry) = tasks.iter_mut().find(|t| t.id == provisional_id) {
                    *entry = created.clone();
                }
                drop(tasks);
                self.refresh_stats().await;
                Ok(created)
            }
            Err(err) => {
                self.tasks.write().await.retain(|t| t.id != provisional_id);
                Err(err)
            }
        }
    }

    /// Update a task optimistically
    ///
    /// The patch applies locally at once and the FULL merged record goes
    /// to the server, so partial-payload validation can never reject it.
    /// A failure rolls the local copy back to the pre-mutation snapshot.
    pub async fn update(&self, id: Uuid, patch: TaskPatch) -> Result<Task, ClientError> {
        let snapshot = {
            let tasks = self.tasks.read().await;
            tasks
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or(ClientError::TaskNotFound)?
        };

        {
            let mut tasks = self.tasks.write().await;
            if let Some(entry) = tasks.iter_mut().find(|t| t.id == id) {
                patch.apply(entry);
            }
        }

        let payload = merged_payload(&snapshot, &patch);

        match self.api.update_task(id, payload).await {
            Ok(updated) => {
                let mut tasks = self.tasks.write().await;
                if let Some(entry) = tasks.iter_mut().find(|t| t.id == id) {
                    *entry = updated.clone();
                }
                drop(tasks);
                self.refresh_stats().await;
                Ok(updated)
            }
            Err(err) => {
                let mut tasks = self.tasks.write().await;
                if let Some(entry) = tasks.iter_mut().find(|t| t.id == id) {
                    *entry = snapshot;
                }
                Err(err)
            }
        }
    }

    /// Delete a task optimistically; the local removal is not rolled back
    /// even when the server rejects it.
    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.tasks.write().await.retain(|t| t.id != id);

        let result = self.api.delete_task(id).await;
        if result.is_ok() {
            self.refresh_stats().await;
        }
        result
    }

    /// Move a task to a new position and column; fire-and-forget, local
    /// order is not corrected on failure.
    pub async fn update_position(
        &self,
        id: Uuid,
        position: i64,
        status: TaskStatus,
    ) -> Result<(), ClientError> {
        self.api.update_position(id, position, status).await?;
        Ok(())
    }

    /// Record time spent; the server copy replaces the local one
    pub async fn update_time(&self, id: Uuid, actual_time: u32) -> Result<Task, ClientError> {
        let updated = self.api.update_time(id, actual_time).await?;
        let mut tasks = self.tasks.write().await;
        if let Some(entry) = tasks.iter_mut().find(|t| t.id == id) {
            *entry = updated.clone();
        }
        Ok(updated)
    }

    /// Delete every completed task concurrently
    ///
    /// Local state only changes once every delete succeeded.
    pub async fn clear_completed(&self) -> Result<usize, ClientError> {
        let completed: Vec<Uuid> = {
            self.tasks
                .read()
                .await
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .map(|t| t.id)
                .collect()
        };

        let mut set = tokio::task::JoinSet::new();
        for id in completed.iter().copied() {
            let api = self.api.clone();
            set.spawn(async move { api.delete_task(id).await });
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
                Err(err) => {
                    tracing::error!("clear-completed worker failed: {err}");
                }
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }

        self.tasks
            .write()
            .await
            .retain(|t| t.status != TaskStatus::Completed);
        self.refresh_stats().await;
        Ok(completed.len())
    }

    // ============================================
    // Statistics
    // ============================================

    /// Fetch aggregate statistics, falling back to a locally computed
    /// aggregate when the server call fails so the caller never sees a
    /// blank state. The fallback can diverge from server truth when the
    /// local list is paginated.
    pub async fn stats(&self) -> StatsData {
        match self.api.stats().await {
            Ok(stats) => {
                *self.stats.write().await = Some(stats.clone());
                stats
            }
            Err(err) => {
                tracing::debug!("stats fetch failed, using local fallback: {err}");
                let fallback = self.fallback_stats().await;
                *self.stats.write().await = Some(fallback.clone());
                fallback
            }
        }
    }

    /// Last known statistics, fetched or fallback
    pub async fn cached_stats(&self) -> Option<StatsData> {
        self.stats.read().await.clone()
    }

    async fn refresh_stats(&self) -> StatsData {
        self.stats().await
    }

    async fn fallback_stats(&self) -> StatsData {
        let tasks = self.tasks.read().await;
        let total = tasks.len() as i64;
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count() as i64;
        let in_progress = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count() as i64;
        let todo = tasks.iter().filter(|t| t.status == TaskStatus::Todo).count() as i64;
        let high_priority = tasks
            .iter()
            .filter(|t| t.priority == TaskPriority::High)
            .count() as i64;

        StatsData {
            summary: StatsSummary {
                total,
                completed,
                in_progress,
                todo,
                high_priority,
            },
            rates: StatsRates {
                completion_rate: if total > 0 {
                    ((completed as f64 / total as f64) * 100.0).round() as i64
                } else {
                    0
                },
            },
            last_updated: Some(Utc::now()),
        }
    }

    async fn provisional_task(&self, new_task: &NewTask) -> Task {
        let now = Utc::now();
        let user_id = self
            .api
            .session()
            .user()
            .await
            .map(|u| u.id)
            .unwrap_or_else(Uuid::nil);

        Task {
            id: Uuid::new_v4(),
            title: new_task.title.clone(),
            description: new_task.description.clone().unwrap_or_default(),
            status: new_task.status.unwrap_or(TaskStatus::Todo),
            priority: new_task.priority.unwrap_or(TaskPriority::Medium),
            due_date: new_task.due_date,
            tags: new_task.tags.clone().unwrap_or_default(),
            user_id,
            position: 0,
            estimated_time: new_task.estimated_time,
            actual_time: 0,
            is_important: new_task.is_important.unwrap_or(false),
            reminders: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Merge the patch over the pre-mutation snapshot into the full record
/// the server expects for an update.
fn merged_payload(snapshot: &Task, patch: &TaskPatch) -> Value {
    json!({
        "title": patch.title.clone().unwrap_or_else(|| snapshot.title.clone()),
        "status": patch.status.unwrap_or(snapshot.status),
        "priority": patch.priority.unwrap_or(snapshot.priority),
        "description": patch.description.clone().unwrap_or_else(|| snapshot.description.clone()),
        "dueDate": patch.due_date.or(snapshot.due_date),
        "actualTime": patch.actual_time.unwrap_or(snapshot.actual_time),
        "isImportant": patch.is_important.unwrap_or(snapshot.is_important),
        "tags": patch.tags.clone().unwrap_or_else(|| snapshot.tags.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(title: &str, status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            status,
            priority: TaskPriority::Medium,
            due_date: None,
            tags: Vec::new(),
            user_id: Uuid::nil(),
            position: 0,
            estimated_time: None,
            actual_time: 0,
            is_important: false,
            reminders: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_merged_payload_fills_unpatched_fields_from_snapshot() {
        let mut snapshot = task("Keep title", TaskStatus::Todo);
        snapshot.description = "original description".to_string();
        snapshot.actual_time = 15;

        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..TaskPatch::default()
        };

        let payload = merged_payload(&snapshot, &patch);
        assert_eq!(payload["title"], "Keep title");
        assert_eq!(payload["status"], "completed");
        assert_eq!(payload["description"], "original description");
        assert_eq!(payload["actualTime"], 15);
        assert_eq!(payload["priority"], "medium");
    }

    #[test]
    fn test_patch_apply_only_touches_given_fields() {
        let mut local = task("Before", TaskStatus::Todo);
        local.actual_time = 9;

        TaskPatch {
            title: Some("After".to_string()),
            ..TaskPatch::default()
        }
        .apply(&mut local);

        assert_eq!(local.title, "After");
        assert_eq!(local.status, TaskStatus::Todo);
        assert_eq!(local.actual_time, 9);
    }
}
