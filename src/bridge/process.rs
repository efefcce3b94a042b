use super::{AnalysisResult, AnalyticsEngine, BridgeError, parse_document};
use crate::models::EngineHealth;
use async_trait::async_trait;
use serde_json::json;
use std::{
    io,
    path::PathBuf,
    process::{ExitStatus, Stdio},
    time::Duration,
};
use tokio::{
    io::AsyncReadExt,
    process::{Child, ChildStderr, ChildStdout, Command},
    time::timeout,
};
use tracing::{debug, error, warn};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const STDERR_TAIL: usize = 512;

/// Runs the analysis script once per request and reads one JSON document
/// from its stdout.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    interpreter: PathBuf,
    script: PathBuf,
    timeout: Duration,
}

struct Output {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl ProcessEngine {
    pub fn new(interpreter: PathBuf, script: PathBuf, timeout: Duration) -> Self {
        Self {
            interpreter,
            script,
            timeout,
        }
    }

    fn spawn(&self, date: &str) -> Result<Child, BridgeError> {
        Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(date)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| BridgeError::Unavailable {
                detail: format!("failed to start {}: {err}", self.interpreter.display()),
            })
    }
}

async fn collect(
    child: &mut Child,
    mut stdout: ChildStdout,
    mut stderr: ChildStderr,
) -> io::Result<Output> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let (read_out, read_err) = tokio::join!(
        stdout.read_to_end(&mut out),
        stderr.read_to_end(&mut err)
    );
    read_out?;
    read_err?;
    let status = child.wait().await?;
    Ok(Output {
        status,
        stdout: out,
        stderr: err,
    })
}

fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    text[start..].to_string()
}

#[async_trait]
impl AnalyticsEngine for ProcessEngine {
    fn mode(&self) -> &'static str {
        "process"
    }

    async fn fetch_daily_analysis(&self, date: &str) -> AnalysisResult {
        let mut child = self.spawn(date)?;
        debug!(pid = ?child.id(), date, "analysis process started");

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(BridgeError::Unavailable {
                detail: "analysis process has no output pipes".into(),
            });
        };

        let outcome = timeout(self.timeout, collect(&mut child, stdout, stderr)).await;
        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(BridgeError::Unavailable {
                    detail: format!("failed to read analysis output: {err}"),
                });
            }
            Err(_) => {
                warn!(pid = ?child.id(), "analysis process exceeded {:?}, killing", self.timeout);
                if let Err(err) = child.kill().await {
                    error!("failed to kill analysis process: {err}");
                }
                return Err(BridgeError::Timeout {
                    ceiling: self.timeout,
                });
            }
        };

        if !output.stderr.is_empty() {
            debug!(stderr = %tail(&output.stderr), "analysis process diagnostics");
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(if output.status.success() {
                BridgeError::Malformed("analysis process produced no output".into())
            } else {
                BridgeError::Reported(format!(
                    "Analysis process exited with {}: {}",
                    output.status,
                    tail(&output.stderr)
                ))
            });
        }

        parse_document(&output.stdout, date)
    }

    async fn check_health(&self) -> EngineHealth {
        if tokio::fs::metadata(&self.script).await.is_err() {
            return EngineHealth {
                available: false,
                details: None,
                error: Some(format!("analysis script {} not found", self.script.display())),
            };
        }

        let mut probe = Command::new(&self.interpreter);
        probe.arg("--version").stdin(Stdio::null()).kill_on_drop(true);

        match timeout(HEALTH_TIMEOUT, probe.output()).await {
            Ok(Ok(out)) if out.status.success() => {
                // Older interpreters print their version on stderr.
                let version = if out.stdout.is_empty() {
                    tail(&out.stderr)
                } else {
                    tail(&out.stdout)
                };
                EngineHealth {
                    available: true,
                    details: Some(json!({
                        "interpreter": version,
                        "script": self.script.display().to_string(),
                    })),
                    error: None,
                }
            }
            Ok(Ok(out)) => EngineHealth {
                available: false,
                details: None,
                error: Some(format!("interpreter exited with {}", out.status)),
            },
            Ok(Err(err)) => EngineHealth {
                available: false,
                details: None,
                error: Some(format!("failed to start {}: {err}", self.interpreter.display())),
            },
            Err(_) => EngineHealth {
                available: false,
                details: None,
                error: Some("interpreter version probe timed out".into()),
            },
        }
    }
}
