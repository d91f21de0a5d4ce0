//! Fixed-delay background task runner.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        mpsc::{self, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::error::Result;

pub type Task = Arc<dyn Fn() + Send + Sync>;

struct Running {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// Owns a registry of named tasks and runs all of them, in registration
/// order, on one background thread.
///
/// The first run happens after `initial_delay`; each later run starts
/// `interval` after the previous one finished. A panicking task is logged
/// and does not stop the loop.
pub struct Scheduler {
    initial_delay: Duration,
    interval: Duration,
    tasks: Vec<(String, Task)>,
    running: Option<Running>,
}

impl Scheduler {
    pub fn new(initial_delay: Duration, interval: Duration) -> Self {
        Self {
            initial_delay,
            interval,
            tasks: Vec::new(),
            running: None,
        }
    }

    /// Register a task. Tasks added while running take effect on the next
    /// [`start`](Self::start).
    pub fn add_task<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.tasks.push((name.into(), Arc::new(task)));
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            warn!("scheduler already running");
            return Ok(());
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let tasks = self.tasks.clone();
        let initial_delay = self.initial_delay;
        let interval = self.interval;

        let thread = thread::Builder::new()
            .name("docarchive-scheduler".to_string())
            .spawn(move || {
                let mut delay = initial_delay;
                loop {
                    match stop_rx.recv_timeout(delay) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    run_all(&tasks);
                    delay = interval;
                }
                debug!("scheduler stopped");
            })?;

        info!(
            tasks = self.tasks.len(),
            initial_delay_secs = initial_delay.as_secs_f32(),
            interval_secs = interval.as_secs_f32(),
            "scheduler started"
        );
        self.running = Some(Running { stop_tx, thread });
        Ok(())
    }

    /// Signal the loop to stop and wait for the current run to finish.
    pub fn stop(&mut self) {
        if let Some(Running { stop_tx, thread }) = self.running.take() {
            // The loop may already be gone; a failed send is harmless.
            let _ = stop_tx.send(());
            if thread.join().is_err() {
                error!("scheduler thread panicked");
            }
        }
    }

    /// Block until the loop ends. Without a concurrent [`stop`](Self::stop)
    /// this never returns.
    pub fn wait(&mut self) {
        if let Some(Running { stop_tx, thread }) = self.running.take() {
            if thread.join().is_err() {
                error!("scheduler thread panicked");
            }
            drop(stop_tx);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("initial_delay", &self.initial_delay)
            .field("interval", &self.interval)
            .field("tasks", &self.task_names().collect::<Vec<_>>())
            .field("running", &self.is_running())
            .finish()
    }
}

fn run_all(tasks: &[(String, Task)]) {
    for (name, task) in tasks {
        debug!(task = %name, "running scheduled task");
        if panic::catch_unwind(AssertUnwindSafe(|| task())).is_err() {
            error!(task = %name, "scheduled task panicked");
        }
    }
}
