#![cfg(unix)]

mod common;

use common::{SHORT_CEILING, unique_data_path};
use hostel_analytics::{
    bridge::{AnalyticsEngine, BridgeError, ProcessEngine},
    models::{DailyAnalysis, NoDataKind},
};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

struct Script {
    path: PathBuf,
}

impl Script {
    fn new(body: &str) -> Self {
        let path = unique_data_path().with_extension("sh");
        std::fs::write(&path, body).expect("write script");
        Self { path }
    }

    fn engine(&self, ceiling: Duration) -> ProcessEngine {
        ProcessEngine::new(PathBuf::from("sh"), self.path.clone(), ceiling)
    }
}

impl Drop for Script {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn process_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

fn read_pid(path: &Path) -> i32 {
    std::fs::read_to_string(path)
        .expect("pid file")
        .trim()
        .parse()
        .expect("pid")
}

#[tokio::test]
async fn date_is_the_only_argument() {
    let script = Script::new(
        r#"printf '{"status":"success","date":"%s","data":{"argc":%d},"charts":{"wordcloud":{"base64":"data:image/png;base64,CCCC","words":{"dal":4}}}}' "$1" "$#"
"#,
    );

    let result = script
        .engine(Duration::from_secs(60))
        .fetch_daily_analysis("2024-02-29")
        .await
        .unwrap();

    let DailyAnalysis::Success {
        data, charts, date, ..
    } = result
    else {
        panic!("expected success");
    };
    assert_eq!(date, "2024-02-29");
    assert_eq!(data["argc"], 1);
    let charts = charts.unwrap();
    assert_eq!(charts["wordcloud"]["words"]["dal"], 4);
}

#[tokio::test]
async fn no_feedback_is_reported_as_no_data() {
    let script = Script::new(
        r#"echo "Chart generation skipped" >&2
echo '{"status":"no_data","message":"No feedback found for this date","date":"'"$1"'","type":"no_feedback"}'
"#,
    );

    let result = script
        .engine(Duration::from_secs(60))
        .fetch_daily_analysis("2024-02-28")
        .await
        .unwrap();
    assert!(matches!(
        result,
        DailyAnalysis::NoData {
            kind: NoDataKind::NoFeedback,
            ..
        }
    ));
}

#[tokio::test]
async fn engine_error_envelope_is_reported() {
    let script = Script::new(
        r#"echo '{"error":true,"message":"Failed to connect to database","type":"DATABASE_ERROR"}'
"#,
    );

    let err = script
        .engine(Duration::from_secs(60))
        .fetch_daily_analysis("2024-02-28")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to connect to database");
}

#[tokio::test]
async fn non_json_stdout_is_malformed() {
    let script = Script::new("echo 'Traceback (most recent call last):'\n");

    let err = script
        .engine(Duration::from_secs(60))
        .fetch_daily_analysis("2024-02-28")
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn silent_crash_reports_stderr() {
    let script = Script::new("echo 'ModuleNotFoundError: pymongo' >&2\nexit 3\n");

    let err = script
        .engine(Duration::from_secs(60))
        .fetch_daily_analysis("2024-02-28")
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Reported(_)), "{err:?}");
    assert!(err.to_string().contains("pymongo"));
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let pid_file = unique_data_path().with_extension("pid");
    let script = Script::new(&format!(
        "echo $$ > '{}'\nexec sleep 30\n",
        pid_file.display()
    ));

    let started = Instant::now();
    let err = script
        .engine(SHORT_CEILING)
        .fetch_daily_analysis("2024-02-28")
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, BridgeError::Timeout { .. }), "{err:?}");
    assert!(err.to_string().contains("timeout"));
    assert!(elapsed >= SHORT_CEILING);
    assert!(elapsed < SHORT_CEILING + Duration::from_secs(2), "took {elapsed:?}");

    let pid = read_pid(&pid_file);
    let _ = std::fs::remove_file(&pid_file);
    assert!(!process_alive(pid), "analysis process {pid} still running");
}

#[tokio::test]
async fn missing_interpreter_is_unavailable() {
    let engine = ProcessEngine::new(
        PathBuf::from("/nonexistent/python3"),
        PathBuf::from("daily_analysis.py"),
        Duration::from_secs(60),
    );
    let err = engine.fetch_daily_analysis("2024-02-28").await.unwrap_err();
    assert!(matches!(err, BridgeError::Unavailable { .. }), "{err:?}");

    let health = engine.check_health().await;
    assert!(!health.available);
}

#[tokio::test]
async fn health_requires_the_script() {
    let missing = ProcessEngine::new(
        PathBuf::from("sh"),
        PathBuf::from("/nonexistent/daily_analysis.py"),
        Duration::from_secs(60),
    );
    let health = missing.check_health().await;
    assert!(!health.available);
    assert!(health.error.unwrap().contains("not found"));
    assert_eq!(missing.mode(), "process");
}
