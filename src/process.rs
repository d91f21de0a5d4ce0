//! Blocking execution of external tools.
//!
//! The child's stdout and stderr are drained on two dedicated threads into
//! `tracing` so a chatty tool can never stall on a full pipe while we wait
//! for it to exit. The timeout covers the whole invocation: a tool that
//! exits but leaves a background process holding its pipes is reported
//! once the deadline passes and its pumps are detached.

use std::{
    ffi::OsStr,
    io::{BufRead, BufReader, Read},
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Runs a command line to completion and reports its exit code.
///
/// A non-zero exit code is returned as a value, not an error: callers decide
/// whether it matters. Spawn failures and timeouts are errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// `timeout` bounds each invocation; `None` waits forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `argv[0]` with the remaining arguments and block until it exits.
    pub fn run<S: AsRef<OsStr>>(&self, argv: &[S]) -> Result<i32> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Config("empty command line".to_string()))?;
        let name = program.as_ref().to_string_lossy().into_owned();

        debug!(command = %display_command(argv), "running external tool");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: name.clone(),
                source,
            })?;

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let (done_tx, done_rx) = mpsc::channel();
        let mut pumps = 0;
        if let Some(out) = child.stdout.take() {
            pump(out, name.clone(), Stream::Stdout, done_tx.clone());
            pumps += 1;
        }
        if let Some(err) = child.stderr.take() {
            pump(err, name.clone(), Stream::Stderr, done_tx.clone());
            pumps += 1;
        }
        drop(done_tx);

        // After a kill, processes spawned by the tool may still hold the
        // pipes open; the pumps are left to finish on their own.
        let status = self.wait(&mut child, &name, deadline)?;

        for _ in 0..pumps {
            let received = match deadline {
                None => done_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
                Some(deadline) => done_rx.recv_timeout(
                    deadline.saturating_duration_since(Instant::now()),
                ),
            };
            match received {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        program = %name,
                        "tool exited but its output is still open, detaching"
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(program = %name, "output pump panicked");
                    break;
                }
            }
        }

        let code = status.code().unwrap_or(-1);
        if code != 0 {
            debug!(program = %name, code, "external tool exited non-zero");
        }
        Ok(code)
    }

    fn wait(
        &self,
        child: &mut Child,
        program: &str,
        deadline: Option<Instant>,
    ) -> Result<ExitStatus> {
        let (Some(timeout), Some(deadline)) = (self.timeout, deadline) else {
            return Ok(child.wait()?);
        };

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    program,
                    timeout_secs = timeout.as_secs_f32(),
                    "killing external tool after timeout"
                );
                if let Err(e) = child.kill() {
                    warn!(program, error = %e, "could not kill external tool");
                }
                child.wait()?;
                return Err(Error::Timeout {
                    program: program.to_string(),
                    timeout,
                });
            }

            thread::sleep(POLL_INTERVAL.min(remaining));
        }
    }
}

/// Forward `reader` line by line into `tracing`, then signal `done`.
fn pump<R>(reader: R, program: String, stream: Stream, done: Sender<()>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    if line.is_empty() {
                        continue;
                    }
                    match stream {
                        Stream::Stdout => debug!(program = %program, "{line}"),
                        Stream::Stderr => info!(program = %program, "{line}"),
                    }
                }
                Err(e) => {
                    warn!(
                        program = %program,
                        error = %e,
                        "cannot read tool output"
                    );
                    break;
                }
            }
        }
        let _ = done.send(());
    });
}

fn display_command<S: AsRef<OsStr>>(argv: &[S]) -> String {
    argv.iter()
        .map(|a| a.as_ref().to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
