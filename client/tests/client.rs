//! Integration tests running the client against a stub API server bound
//! to an ephemeral port.

use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tasklane_client::{
    ApiClient, ClientConfig, ClientError, NewTask, SessionManager, SessionStore, TaskPatch,
    TaskQuery, TaskStatus, User,
};
use uuid::Uuid;

const GOOD_TOKEN: &str = "good-token";

fn temp_session_path() -> PathBuf {
    std::env::temp_dir().join(format!("tasklane-client-test-{}.json", Uuid::new_v4()))
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn ok(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "message": "ok", "data": data }))
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": "Unauthorized" })),
    )
}

fn server_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": "Internal server error" })),
    )
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(String::from)
}

fn task_json(id: Uuid, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "",
        "status": status,
        "priority": "medium",
        "dueDate": null,
        "tags": [],
        "userId": Uuid::nil(),
        "position": 0,
        "estimatedTime": null,
        "actualTime": 0,
        "isImportant": false,
        "reminders": [],
        "createdAt": "2026-01-01T00:00:00Z",
        "updatedAt": "2026-01-01T00:00:00Z",
    })
}

fn list_json(tasks: Vec<Value>) -> Value {
    let total = tasks.len();
    json!({
        "tasks": tasks,
        "pagination": { "page": 1, "limit": 20, "total": total, "totalPages": 1 },
    })
}

fn user_json() -> Value {
    json!({
        "id": Uuid::new_v4(),
        "name": "Ada",
        "email": "ada@example.com",
        "role": "user",
        "avatar": null,
        "createdAt": "2026-01-01T00:00:00Z",
    })
}

fn test_user() -> User {
    serde_json::from_value(user_json()).unwrap()
}

async fn authenticated_client(base_url: &str) -> Arc<ApiClient> {
    let client = ApiClient::new(ClientConfig::new(base_url, temp_session_path())).unwrap();
    client
        .session()
        .set_session(test_user(), "stale-token".to_string(), "refresh-1".to_string())
        .await
        .unwrap();
    Arc::new(client)
}

/// Stub that rejects every bearer token except GOOD_TOKEN and counts
/// calls to the refresh endpoint.
fn refreshing_stub(refresh_calls: Arc<AtomicUsize>, tasks: Vec<Value>) -> Router {
    Router::new()
        .route("/api/auth/refresh", {
            post(move || {
                let refresh_calls = refresh_calls.clone();
                async move {
                    refresh_calls.fetch_add(1, Ordering::SeqCst);
                    ok(json!({ "accessToken": GOOD_TOKEN, "refreshToken": "refresh-2" }))
                }
            })
        })
        .route("/api/tasks", {
            let tasks = tasks.clone();
            get(move |headers: HeaderMap| {
                let tasks = tasks.clone();
                async move {
                    if bearer(&headers).as_deref() == Some(GOOD_TOKEN) {
                        Ok(ok(list_json(tasks)))
                    } else {
                        Err(unauthorized())
                    }
                }
            })
        })
}

#[tokio::test]
async fn concurrent_401_recoveries_issue_exactly_one_refresh_call() {
    let refresh_calls = Arc::new(AtomicUsize::new(0));
    let base_url = serve(refreshing_stub(refresh_calls.clone(), Vec::new())).await;
    let client = authenticated_client(&base_url).await;

    let a = tokio::spawn({
        let client = client.clone();
        async move { client.list_tasks(&TaskQuery::default()).await }
    });
    let b = tokio::spawn({
        let client = client.clone();
        async move { client.list_tasks(&TaskQuery::default()).await }
    });

    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());
    assert_eq!(refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        client.session().access_token().await.as_deref(),
        Some(GOOD_TOKEN)
    );
}

#[tokio::test]
async fn second_401_after_replay_is_a_final_failure() {
    let app = Router::new()
        .route(
            "/api/auth/refresh",
            post(|| async { ok(json!({ "accessToken": GOOD_TOKEN, "refreshToken": "refresh-2" })) }),
        )
        // Rejects even the refreshed token.
        .route("/api/tasks", get(|| async { unauthorized() }));
    let base_url = serve(app).await;
    let client = authenticated_client(&base_url).await;

    let err = client.list_tasks(&TaskQuery::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
}

#[tokio::test]
async fn failed_refresh_clears_session_and_forces_anonymous() {
    let app = Router::new()
        .route("/api/auth/refresh", post(|| async { unauthorized() }))
        .route("/api/tasks", get(|| async { unauthorized() }));
    let base_url = serve(app).await;

    let session_path = temp_session_path();
    let client =
        ApiClient::new(ClientConfig::new(base_url.as_str(), session_path.clone())).unwrap();
    client
        .session()
        .set_session(test_user(), "stale-token".to_string(), "refresh-1".to_string())
        .await
        .unwrap();

    let err = client.list_tasks(&TaskQuery::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::SessionExpired));
    assert!(!client.session().is_authenticated().await);

    // Durable state is gone too: a fresh manager restores nothing.
    let restored = SessionManager::new(SessionStore::new(session_path));
    assert!(!restored.is_authenticated().await);
}

#[tokio::test]
async fn login_persists_session_and_logout_clears_despite_dead_server() {
    let app = Router::new().route(
        "/api/auth/login",
        post(|| async {
            ok(json!({
                "user": user_json(),
                "accessToken": "access-1",
                "refreshToken": "refresh-1",
            }))
        }),
    );
    let base_url = serve(app).await;

    let session_path = temp_session_path();
    let client =
        ApiClient::new(ClientConfig::new(base_url.as_str(), session_path.clone())).unwrap();
    let user = client.login("ada@example.com", "hunter2").await.unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert!(client.session().is_authenticated().await);

    let persisted: Value =
        serde_json::from_str(&std::fs::read_to_string(&session_path).unwrap()).unwrap();
    assert_eq!(persisted["accessToken"], json!("access-1"));
    assert_eq!(persisted["refreshToken"], json!("refresh-1"));
    assert_eq!(persisted["user"]["email"], json!("ada@example.com"));

    // The stub has no logout route; local clearing must happen anyway.
    client.logout().await;
    assert!(!client.session().is_authenticated().await);
    assert!(!session_path.exists());
}

#[tokio::test]
async fn optimistic_update_rolls_back_on_server_failure() {
    let task_id = Uuid::new_v4();
    let app = Router::new()
        .route("/api/tasks", {
            let tasks = vec![task_json(task_id, "A", "todo")];
            get(move || {
                let tasks = tasks.clone();
                async move { ok(list_json(tasks)) }
            })
        })
        .route("/api/tasks/:id", put(|| async { server_error() }));
    let base_url = serve(app).await;
    let client = authenticated_client(&base_url).await;
    let engine = tasklane_client::TaskSyncEngine::new(client);

    engine.load(&TaskQuery::default()).await.unwrap();

    let err = engine
        .update(
            task_id,
            TaskPatch {
                title: Some("B".to_string()),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 500, .. }));

    // Rolled back to the pre-mutation snapshot.
    let tasks = engine.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "A");
}

#[tokio::test]
async fn optimistic_update_sends_full_merged_record() {
    let task_id = Uuid::new_v4();
    let seen_payload: Arc<tokio::sync::Mutex<Option<Value>>> =
        Arc::new(tokio::sync::Mutex::new(None));

    let app = Router::new()
        .route("/api/tasks", {
            let mut snapshot = task_json(task_id, "Keep title", "todo");
            snapshot["description"] = json!("original description");
            let tasks = vec![snapshot];
            get(move || {
                let tasks = tasks.clone();
                async move { ok(list_json(tasks)) }
            })
        })
        .route("/api/tasks/:id", {
            let seen_payload = seen_payload.clone();
            put(move |Json(body): Json<Value>| {
                let seen_payload = seen_payload.clone();
                async move {
                    *seen_payload.lock().await = Some(body);
                    ok(task_json(task_id, "Keep title", "completed"))
                }
            })
        })
        .route(
            "/api/tasks/stats/summary",
            get(|| async { server_error() }),
        );
    let base_url = serve(app).await;
    let client = authenticated_client(&base_url).await;
    let engine = tasklane_client::TaskSyncEngine::new(client);

    engine.load(&TaskQuery::default()).await.unwrap();
    engine
        .update(
            task_id,
            TaskPatch {
                status: Some(TaskStatus::Completed),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();

    // Only the status changed, yet the whole merged record went out.
    let payload = seen_payload.lock().await.clone().unwrap();
    assert_eq!(payload["status"], json!("completed"));
    assert_eq!(payload["title"], json!("Keep title"));
    assert_eq!(payload["description"], json!("original description"));
    assert_eq!(payload["priority"], json!("medium"));
    assert_eq!(payload["actualTime"], json!(0));
}

#[tokio::test]
async fn failed_create_removes_the_provisional_task() {
    let app = Router::new()
        .route("/api/tasks", post(|| async { server_error() }));
    let base_url = serve(app).await;
    let client = authenticated_client(&base_url).await;
    let engine = tasklane_client::TaskSyncEngine::new(client);

    let err = engine.create(NewTask::titled("Doomed")).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 500, .. }));
    assert!(engine.tasks().await.is_empty());
}

#[tokio::test]
async fn successful_create_replaces_the_provisional_task() {
    let server_id = Uuid::new_v4();
    let app = Router::new()
        .route("/api/tasks", {
            post(move || async move {
                (
                    StatusCode::CREATED,
                    ok(task_json(server_id, "Buy milk", "todo")),
                )
            })
        })
        .route("/api/tasks/stats/summary", get(|| async { server_error() }));
    let base_url = serve(app).await;
    let client = authenticated_client(&base_url).await;
    let engine = tasklane_client::TaskSyncEngine::new(client);

    let created = engine.create(NewTask::titled("Buy milk")).await.unwrap();
    assert_eq!(created.id, server_id);

    let tasks = engine.tasks().await;
    assert_eq!(tasks.len(), 1);
    // The client-minted provisional id is gone.
    assert_eq!(tasks[0].id, server_id);
}

#[tokio::test]
async fn failed_delete_is_not_rolled_back() {
    let task_id = Uuid::new_v4();
    let app = Router::new()
        .route("/api/tasks", {
            let tasks = vec![task_json(task_id, "Going away", "todo")];
            get(move || {
                let tasks = tasks.clone();
                async move { ok(list_json(tasks)) }
            })
        })
        .route("/api/tasks/:id", delete(|| async { server_error() }));
    let base_url = serve(app).await;
    let client = authenticated_client(&base_url).await;
    let engine = tasklane_client::TaskSyncEngine::new(client);

    engine.load(&TaskQuery::default()).await.unwrap();
    assert_eq!(engine.tasks().await.len(), 1);

    let result = engine.delete(task_id).await;
    assert!(result.is_err());
    // Deliberate asymmetry: the local removal stands even on failure.
    assert!(engine.tasks().await.is_empty());
}

#[tokio::test]
async fn stats_failure_falls_back_to_local_aggregate() {
    let app = Router::new()
        .route("/api/tasks", {
            let tasks = vec![
                task_json(Uuid::new_v4(), "Done", "completed"),
                task_json(Uuid::new_v4(), "Pending", "todo"),
            ];
            get(move || {
                let tasks = tasks.clone();
                async move { ok(list_json(tasks)) }
            })
        })
        .route("/api/tasks/stats/summary", get(|| async { server_error() }));
    let base_url = serve(app).await;
    let client = authenticated_client(&base_url).await;
    let engine = tasklane_client::TaskSyncEngine::new(client);

    engine.load(&TaskQuery::default()).await.unwrap();
    let stats = engine.stats().await;

    assert_eq!(stats.summary.total, 2);
    assert_eq!(stats.summary.completed, 1);
    assert_eq!(stats.summary.todo, 1);
    assert_eq!(stats.rates.completion_rate, 50);
}

#[tokio::test]
async fn bootstrap_restores_user_from_profile() {
    let app = Router::new().route("/api/auth/profile", {
        get(move |headers: HeaderMap| async move {
            if bearer(&headers).is_some() {
                Ok(ok(json!({ "user": user_json() })))
            } else {
                Err(unauthorized())
            }
        })
    });
    let base_url = serve(app).await;
    let client = authenticated_client(&base_url).await;

    let user = client.bootstrap().await.unwrap();
    assert_eq!(user.email, "ada@example.com");
    assert!(client.session().is_authenticated().await);
}
