use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct Task {
    id: u64,
    text: String,
    done: bool,
    created_at: Option<String>,
    source: String,
}

#[derive(Debug, Deserialize)]
struct JournalEntry {
    id: u64,
    date_key: String,
    mood: Option<u8>,
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodayStats {
    completed_today: u32,
    safe_goal: u32,
    completion_rate_today: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeeklySummaryEntry {
    date_key: String,
    label: String,
    completed: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeeklyTotals {
    total_completed_week: u32,
    weekly_goal: u64,
    max_for_bars: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsSnapshot {
    today: TodayStats,
    weekly_summary: Vec<WeeklySummaryEntry>,
    totals: WeeklyTotals,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("mood_journal_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_mood_journal"))
        .env("HOST", "127.0.0.1")
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_path)
        .env_remove("OPENAI_API_KEY")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn create_task(client: &Client, base_url: &str, body: Value) -> Task {
    let response = client
        .post(format!("{base_url}/api/tasks"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn analytics(client: &Client, base_url: &str, goal: i64) -> AnalyticsSnapshot {
    client
        .get(format!("{base_url}/api/analytics?goal={goal}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_task_lifecycle() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let created = create_task(
        &client,
        &server.base_url,
        json!({ "text": "water the plants", "source": "mobile" }),
    )
    .await;
    assert_eq!(created.text, "water the plants");
    assert!(!created.done);
    assert_eq!(created.source, "mobile");
    assert!(created.created_at.is_some());

    let tasks: Vec<Task> = client
        .get(format!("{}/api/tasks", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(tasks.iter().any(|task| task.id == created.id));

    let updated: Task = client
        .patch(format!("{}/api/tasks/{}", server.base_url, created.id))
        .json(&json!({ "done": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(updated.done);
    assert_eq!(updated.text, created.text);

    let response = client
        .delete(format!("{}/api/tasks/{}", server.base_url, created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .delete(format!("{}/api/tasks/{}", server.base_url, created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn http_task_validation() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/tasks", server.base_url))
        .json(&json!({ "text": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "text is required");

    let task = create_task(&client, &server.base_url, json!({ "text": "stretch" })).await;
    let response = client
        .patch(format!("{}/api/tasks/{}", server.base_url, task.id))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .patch(format!("{}/api/tasks/999999", server.base_url))
        .json(&json!({ "done": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_malformed_body_is_json_bad_request() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let task = create_task(&client, &server.base_url, json!({ "text": "hydrate" })).await;
    let response = client
        .patch(format!("{}/api/tasks/{}", server.base_url, task.id))
        .json(&json!({ "done": "yes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().is_some_and(|msg| !msg.is_empty()));

    let response = client
        .put(format!("{}/api/settings", server.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn http_analytics_follow_completions() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let before = analytics(&client, &server.base_url, 4).await;
    assert_eq!(before.weekly_summary.len(), 7);
    assert_eq!(before.weekly_summary[6].label, "Today");
    assert_eq!(before.today.safe_goal, 4);
    assert_eq!(before.totals.weekly_goal, 28);
    assert_eq!(before.totals.max_for_bars, 4);

    create_task(
        &client,
        &server.base_url,
        json!({ "text": "journal", "done": true }),
    )
    .await;
    let six_days_ago = (chrono::Utc::now() - chrono::Duration::days(6)).to_rfc3339();
    create_task(
        &client,
        &server.base_url,
        json!({ "text": "old run", "done": true, "createdAt": six_days_ago }),
    )
    .await;

    let after = analytics(&client, &server.base_url, 4).await;
    assert_eq!(after.today.completed_today, before.today.completed_today + 1);
    assert_eq!(
        after.weekly_summary[0].completed,
        before.weekly_summary[0].completed + 1
    );
    assert_eq!(
        after.totals.total_completed_week,
        before.totals.total_completed_week + 2
    );
    assert!(after.today.completion_rate_today <= 100);

    let floored = analytics(&client, &server.base_url, 0).await;
    assert_eq!(floored.today.safe_goal, 1);

    let weekly: Vec<Value> = client
        .get(format!("{}/api/tasks/weekly", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(weekly.iter().any(|day| day["day"] == after.weekly_summary[0].date_key.as_str()));
}

#[tokio::test]
async fn http_journal_upsert() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let first: JournalEntry = client
        .post(format!("{}/api/journal", server.base_url))
        .json(&json!({ "dateKey": "2026-01-05", "mood": 2, "note": "slow start" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: JournalEntry = client
        .post(format!("{}/api/journal", server.base_url))
        .json(&json!({ "dateKey": "2026-01-05", "mood": 4, "note": null }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.date_key, "2026-01-05");
    assert_eq!(second.mood, Some(4));
    assert_eq!(second.note, None);

    let fetched: JournalEntry = client
        .get(format!("{}/api/journal/2026-01-05", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched.mood, Some(4));

    let response = client
        .post(format!("{}/api/journal", server.base_url))
        .json(&json!({ "mood": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/api/journal", server.base_url))
        .json(&json!({ "dateKey": "2026-01-06", "note": "x".repeat(1001) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_settings_floor_goal() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let settings: Value = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "daily_goal": 0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(settings["daily_goal"], 1);

    let settings: Value = client
        .put(format!("{}/api/settings", server.base_url))
        .json(&json!({ "daily_goal": 6 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(settings["daily_goal"], 6);

    let snapshot: AnalyticsSnapshot = client
        .get(format!("{}/api/analytics", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot.today.safe_goal, 6);
}

#[tokio::test]
async fn http_chat_without_key_apologises() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/chat", server.base_url))
        .json(&json!({ "messages": [{ "role": "user", "content": "hello" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "chat server error");
    assert!(body["reply"].as_str().is_some_and(|reply| !reply.is_empty()));
}

#[tokio::test]
async fn http_index_and_health() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let health: Value = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health, json!({ "ok": true, "db": true }));

    let page = client
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Weekly report"));
    assert!(page.contains("Today summary"));
}
