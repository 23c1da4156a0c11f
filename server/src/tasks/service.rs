//! Task Service
//!
//! Business logic for the task collection. Every operation is scoped to
//! the requesting owner; a task another user owns is indistinguishable
//! from a missing one.

use crate::error::ApiError;
use crate::models::{
    CreateTaskRequest, PositionUpdateRequest, StatsData, StatsRates, StatsSummary, Task,
    TaskListData, TaskPriority, TaskQuery, TaskStatus, TimeUpdateRequest, UpdateTaskRequest,
    Pagination,
};
use crate::store::TaskStore;

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Task service
pub struct TaskService {
    store: Arc<TaskStore>,
}

impl TaskService {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    /// List tasks matching the query, newest first
    pub async fn list(&self, user_id: Uuid, query: &TaskQuery) -> TaskListData {
        let (tasks, total) = self.store.list(user_id, query).await;
        TaskListData {
            tasks,
            pagination: Pagination::new(total, query.page(), query.limit()),
        }
    }

    /// Fetch a single owned task
    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Task, ApiError> {
        self.store
            .get(user_id, id)
            .await
            .ok_or(ApiError::NotFound("Task"))
    }

    /// Create a task; the store assigns the next position for the owner
    pub async fn create(&self, user_id: Uuid, req: CreateTaskRequest) -> Result<Task, ApiError> {
        if let Some(due) = req.due_date {
            if due <= Utc::now() {
                return Err(field_error("dueDate", "Due date must be in the future"));
            }
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: req.title.trim().to_string(),
            description: req.description.map(|d| d.trim().to_string()).unwrap_or_default(),
            status: req.status.unwrap_or(TaskStatus::Todo),
            priority: req.priority.unwrap_or(TaskPriority::Medium),
            due_date: req.due_date,
            tags: req.tags.unwrap_or_default(),
            user_id,
            position: 0, // assigned by the store
            estimated_time: req.estimated_time,
            actual_time: 0,
            is_important: req.is_important.unwrap_or(false),
            reminders: req.reminders.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        let task = self.store.insert(task).await;
        tracing::debug!(user_id = %user_id, task_id = %task.id, "task created");
        Ok(task)
    }

    /// Partial update: absent fields are left unchanged
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: UpdateTaskRequest,
    ) -> Result<Task, ApiError> {
        self.store
            .update(user_id, id, |task| {
                if let Some(title) = req.title {
                    task.title = title.trim().to_string();
                }
                if let Some(description) = req.description {
                    task.description = description.trim().to_string();
                }
                if let Some(status) = req.status {
                    task.status = status;
                }
                if let Some(priority) = req.priority {
                    task.priority = priority;
                }
                if let Some(due_date) = req.due_date {
                    task.due_date = Some(due_date);
                }
                if let Some(tags) = req.tags {
                    task.tags = tags;
                }
                if let Some(estimated_time) = req.estimated_time {
                    task.estimated_time = Some(estimated_time);
                }
                if let Some(actual_time) = req.actual_time {
                    task.actual_time = actual_time;
                }
                if let Some(is_important) = req.is_important {
                    task.is_important = is_important;
                }
                if let Some(reminders) = req.reminders {
                    task.reminders = reminders;
                }
            })
            .await
            .ok_or(ApiError::NotFound("Task"))
    }

    /// Delete an owned task permanently
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        self.store
            .delete(user_id, id)
            .await
            .map(|_| ())
            .ok_or(ApiError::NotFound("Task"))
    }

    /// Move a task to a new position and column
    pub async fn update_position(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: PositionUpdateRequest,
    ) -> Result<Task, ApiError> {
        self.store
            .update(user_id, id, |task| {
                task.position = req.position;
                task.status = req.status;
            })
            .await
            .ok_or(ApiError::NotFound("Task"))
    }

    /// Record actual time spent on a task
    pub async fn update_time(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: TimeUpdateRequest,
    ) -> Result<Task, ApiError> {
        self.store
            .update(user_id, id, |task| {
                task.actual_time = req.actual_time;
            })
            .await
            .ok_or(ApiError::NotFound("Task"))
    }

    /// Aggregate statistics for the owner's whole collection
    pub async fn stats(&self, user_id: Uuid) -> StatsData {
        let counts = self.store.counts(user_id).await;

        let completion_rate = if counts.total > 0 {
            ((counts.completed as f64 / counts.total as f64) * 100.0).round() as i64
        } else {
            0
        };

        StatsData {
            summary: StatsSummary {
                total: counts.total,
                completed: counts.completed,
                in_progress: counts.in_progress,
                todo: counts.todo,
                high_priority: counts.high_priority,
            },
            rates: StatsRates { completion_rate },
            last_updated: Utc::now(),
        }
    }
}

fn field_error(field: &'static str, message: &'static str) -> ApiError {
    let mut errors = validator::ValidationErrors::new();
    let mut error = validator::ValidationError::new("invalid");
    error.message = Some(message.into());
    errors.add(field, error);
    ApiError::Validation(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn service() -> TaskService {
        TaskService::new(Arc::new(TaskStore::new()))
    }

    fn create_req(title: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.to_string(),
            description: None,
            status: None,
            priority: None,
            due_date: None,
            tags: None,
            estimated_time: None,
            is_important: None,
            reminders: None,
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_position() {
        let tasks = service();
        let user = Uuid::new_v4();

        let first = tasks.create(user, create_req("Buy milk")).await.unwrap();
        let second = tasks.create(user, create_req("Walk dog")).await.unwrap();

        assert_eq!(first.status, TaskStatus::Todo);
        assert_eq!(first.priority, TaskPriority::Medium);
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
        assert_eq!(first.actual_time, 0);
        assert!(!first.is_important);
    }

    #[tokio::test]
    async fn test_create_rejects_past_due_date() {
        let tasks = service();
        let user = Uuid::new_v4();

        let mut req = create_req("Late");
        req.due_date = Some(Utc::now() - Duration::hours(1));

        assert!(matches!(
            tasks.create(user, req).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_update_leaves_absent_fields_unchanged() {
        let tasks = service();
        let user = Uuid::new_v4();
        let mut req = create_req("Original");
        req.description = Some("keep me".to_string());
        let task = tasks.create(user, req).await.unwrap();

        let updated = tasks
            .update(
                user,
                task.id,
                UpdateTaskRequest {
                    status: Some(TaskStatus::Completed),
                    ..UpdateTaskRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.title, "Original");
        assert_eq!(updated.description, "keep me");
    }

    #[tokio::test]
    async fn test_update_is_owner_scoped() {
        let tasks = service();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let task = tasks.create(owner, create_req("Mine")).await.unwrap();

        let result = tasks
            .update(intruder, task.id, UpdateTaskRequest::default())
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));

        let result = tasks.delete(intruder, task.id).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stats_recompute_completion_rate() {
        let tasks = service();
        let user = Uuid::new_v4();

        let a = tasks.create(user, create_req("a")).await.unwrap();
        tasks.create(user, create_req("b")).await.unwrap();
        tasks.create(user, create_req("c")).await.unwrap();

        let before = tasks.stats(user).await;
        assert_eq!(before.summary.completed, 0);
        assert_eq!(before.rates.completion_rate, 0);

        tasks
            .update(
                user,
                a.id,
                UpdateTaskRequest {
                    status: Some(TaskStatus::Completed),
                    ..UpdateTaskRequest::default()
                },
            )
            .await
            .unwrap();

        let after = tasks.stats(user).await;
        assert_eq!(after.summary.total, 3);
        assert_eq!(after.summary.completed, 1);
        assert_eq!(after.summary.todo, 2);
        assert_eq!(after.rates.completion_rate, 33);
    }

    #[tokio::test]
    async fn test_position_update_moves_column() {
        let tasks = service();
        let user = Uuid::new_v4();
        let task = tasks.create(user, create_req("drag me")).await.unwrap();

        let moved = tasks
            .update_position(
                user,
                task.id,
                PositionUpdateRequest {
                    position: 5,
                    status: TaskStatus::InProgress,
                },
            )
            .await
            .unwrap();

        assert_eq!(moved.position, 5);
        assert_eq!(moved.status, TaskStatus::InProgress);
    }
}
