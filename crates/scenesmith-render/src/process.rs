//! External process execution with a hard timeout.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{RunnerError, RunnerResult};

/// One external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Program followed by its arguments.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited on its own; `None` when killed by a signal.
    Exited(Option<i32>),
    /// Killed after exceeding the invocation's timeout.
    TimedOut,
}

/// Captured result of an invocation that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == ExitStatus::Exited(Some(0))
    }

    /// Stderr, or stdout when stderr is blank.
    pub fn diagnostics(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Runs external programs.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion or until the timeout elapses.
    ///
    /// A non-zero exit or a timeout is a normal [`ProcessOutput`]; only a
    /// failure to start or observe the process is an error.
    async fn run(&self, invocation: &Invocation) -> RunnerResult<ProcessOutput>;
}

/// Runs programs on the host with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> RunnerResult<ProcessOutput> {
        let start = Instant::now();
        debug!(command = ?invocation.command_line(), "spawning process");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
        let stdout = Capture::start(child.stdout.take());
        let stderr = Capture::start(child.stderr.take());

        let status = match tokio::time::timeout(invocation.timeout, child.wait()).await {
            Ok(Ok(status)) => ExitStatus::Exited(status.code()),
            Ok(Err(source)) => {
                return Err(RunnerError::Io {
                    program: invocation.program.clone(),
                    source,
                })
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(program = %invocation.program, error = %e, "failed to kill timed-out process");
                }
                ExitStatus::TimedOut
            }
        };

        let (stdout, stderr) = tokio::join!(stdout.finish(), stderr.finish());
        Ok(ProcessOutput {
            status,
            stdout: decode_stream(&stdout),
            stderr: decode_stream(&stderr),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// How long to keep draining a pipe after the process is gone. A grandchild
/// can hold the pipe open past its parent's death.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A pipe drained in the background, chunk by chunk, so that whatever was
/// read survives the process being killed.
struct Capture {
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    reader: JoinHandle<()>,
}

impl Capture {
    fn start<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, chunks) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let Some(mut stream) = stream else { return };
            let mut buf = vec![0u8; 8192];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "stopped reading process output");
                        break;
                    }
                }
            }
        });
        Self { chunks, reader }
    }

    /// Everything read so far, waiting briefly for end of stream.
    async fn finish(mut self) -> Vec<u8> {
        if tokio::time::timeout(DRAIN_GRACE, &mut self.reader).await.is_err() {
            debug!("process output still open after exit, keeping what was read");
            self.reader.abort();
        }
        let mut bytes = Vec::new();
        while let Ok(chunk) = self.chunks.try_recv() {
            bytes.extend_from_slice(&chunk);
        }
        bytes
    }
}

/// Decode captured output: strict UTF-8 first, lossy on failure.
pub fn decode_stream(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) => {
            warn!(
                valid_up_to = err.valid_up_to(),
                "process output is not valid UTF-8, decoding lossily"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
