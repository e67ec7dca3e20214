use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct TimerView {
    status: String,
    elapsed: u64,
    tag: String,
}

#[derive(Debug, Deserialize)]
struct HabitResponse {
    applied: bool,
    count: u32,
}

struct TestServer {
    base_url: String,
    child: Child,
    _data_dir: TempDir,
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
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

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

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/today")).send().await {
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
    let data_dir = tempfile::tempdir().expect("temp data dir");
    let child = Command::new(env!("CARGO_BIN_EXE_daily_anchor"))
        .env("PORT", port.to_string())
        .env("APP_DATA_DIR", data_dir.path())
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer {
        base_url,
        child,
        _data_dir: data_dir,
    }
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

async fn post_timer(client: &Client, server: &TestServer, action: &str) -> Value {
    client
        .post(format!("{}/api/timer/{action}", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_bounded_habit_stops_at_max() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let mut last = None;
    for _ in 0..3 {
        let response: HabitResponse = client
            .post(format!("{}/api/habits/poop", server.base_url))
            .json(&json!({ "delta": 1 }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        last = Some(response);
    }
    let last = last.unwrap();
    assert!(!last.applied);
    assert_eq!(last.count, 1);

    let today: Value = client
        .get(format!("{}/api/today", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(today["record"]["poop"], 1);
    assert!(today["record"]["timeLogs"].is_array());
}

#[tokio::test]
async fn http_unknown_habit_is_not_found() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let response = Client::new()
        .post(format!("{}/api/habits/juggling", server.base_url))
        .json(&json!({ "delta": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_timer_lifecycle() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let started = post_timer(&client, &server, "start").await;
    assert_eq!(started["status"], "running");
    let again = post_timer(&client, &server, "start").await;
    assert_eq!(again["status"], "running");

    let locked = client
        .post(format!("{}/api/timer/tag", server.base_url))
        .json(&json!({ "name": "阅读" }))
        .send()
        .await
        .unwrap();
    assert_eq!(locked.status(), StatusCode::CONFLICT);

    let paused = post_timer(&client, &server, "pause").await;
    let paused_again = post_timer(&client, &server, "pause").await;
    assert_eq!(paused["status"], "paused");
    assert_eq!(paused["elapsed"], paused_again["elapsed"]);

    let stopped = post_timer(&client, &server, "stop").await;
    assert_eq!(stopped["timer"]["status"], "idle");
    assert!(stopped["session"].is_null());

    let timer: TimerView = client
        .get(format!("{}/api/timer", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(timer.status, "idle");
    assert_eq!(timer.elapsed, 0);
    assert!(!timer.tag.is_empty());
}

#[tokio::test]
async fn http_import_preserves_unrelated_dates() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let first = json!({ "logs": {
        "2020-01-01": { "water": 2, "timeLogs": [] },
        "2020-01-02": { "water": 5, "timeLogs": [] }
    }});
    let response = client
        .post(format!("{}/api/import", server.base_url))
        .body(first.to_string())
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let second = json!({ "logs": { "2020-01-01": { "water": 7 } } });
    let report: Value = client
        .post(format!("{}/api/import", server.base_url))
        .body(second.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report, json!({ "success": true, "kind": "JSON", "count": 1 }));

    let untouched: Value = client
        .get(format!("{}/api/days/2020-01-02", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(untouched["water"], 5);

    let replaced: Value = client
        .get(format!("{}/api/days/2020-01-01", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(replaced["water"], 7);
}

#[tokio::test]
async fn http_unrecognised_import_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let response = Client::new()
        .post(format!("{}/api/import", server.base_url))
        .body("{\"hello\": true}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn http_csv_export_starts_with_bom() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let response = Client::new()
        .get(format!("{}/api/export.csv", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body = response.bytes().await.unwrap();
    assert!(body.starts_with(&[0xEF, 0xBB, 0xBF]));
    let text = String::from_utf8_lossy(&body);
    assert!(text.lines().next().unwrap().contains("focus_minutes"));
}
