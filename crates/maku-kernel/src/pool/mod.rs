//! Fixed pool of pre-spawned worker processes.
//!
//! Workers are this binary re-executed with the hidden worker flag; each
//! one speaks the frame protocol over its stdin/stdout pair. A per-worker
//! reader task decodes result frames into a single channel, which is what
//! `wait_result` blocks on.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         ProcessPool                          │
//! │  submit ──▶ worker 0 stdin      worker 0 stdout ──▶ reader ┐ │
//! │  submit ──▶ worker 1 stdin      worker 1 stdout ──▶ reader ┼─┼─▶ mpsc ──▶ wait_result
//! │  submit ──▶ worker 2 stdin      worker 2 stdout ──▶ reader ┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Commands run inside the workers, never in the parent: they invoke the
//! host shell and may chdir, mutate the environment, or change signal
//! state, all of which stay contained in the worker process.

pub mod frame;
pub mod worker;

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use maku_types::{MakuError, MakuResult, NodeId, TaskResult};

/// Default worker count when the CLI gives none.
pub const DEFAULT_WORKERS: usize = 2;

/// Hidden CLI flag that turns an invocation into a pool worker.
pub const WORKER_FLAG: &str = "--worker";

/// How worker processes are launched.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Re-execute the current binary in worker mode.
    pub fn current_exe() -> MakuResult<Self> {
        let program = std::env::current_exe()?;
        Ok(Self { program, args: vec![WORKER_FLAG.to_string()] })
    }
}

/// The execution seam the scheduler dispatches through.
///
/// [`ProcessPool`] is the real implementation; scheduler tests substitute a
/// recording fake to pin down dispatch order without spawning processes.
#[async_trait]
pub trait Executor {
    /// True iff at least one worker slot is idle.
    fn can_accept(&self) -> bool;

    /// Hand a node's command sequence to an idle worker.
    ///
    /// Precondition: `can_accept()`.
    async fn submit(&mut self, node: NodeId, commands: &[String]) -> MakuResult<()>;

    /// Block until some busy worker delivers a result frame.
    async fn wait_result(&mut self) -> MakuResult<TaskResult>;

    /// Tell every worker to exit, then reap them. Idempotent.
    async fn shutdown(&mut self) -> MakuResult<()>;
}

struct WorkerSlot {
    child: Child,
    stdin: ChildStdin,
    reader: JoinHandle<()>,
    busy: bool,
}

/// Fixed pool of worker subprocesses speaking the frame protocol.
///
/// Every worker is spawned with `kill_on_drop`, so dropping the pool
/// without an explicit [`ProcessPool::shutdown`] still terminates them.
pub struct ProcessPool {
    spawn: WorkerCommand,
    size: usize,
    slots: Vec<WorkerSlot>,
    results_tx: mpsc::UnboundedSender<(usize, Option<TaskResult>)>,
    results_rx: mpsc::UnboundedReceiver<(usize, Option<TaskResult>)>,
    running: bool,
}

impl ProcessPool {
    /// Create a stopped pool of `size` workers (at least one).
    pub fn new(size: usize, spawn: WorkerCommand) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            spawn,
            size: size.max(1),
            slots: Vec::new(),
            results_tx,
            results_rx,
            running: false,
        }
    }

    /// Spawn all workers. Idempotent.
    pub fn start(&mut self) -> MakuResult<()> {
        if self.running {
            return Ok(());
        }

        for index in 0..self.size {
            let mut child = Command::new(&self.spawn.program)
                .args(&self.spawn.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .kill_on_drop(true)
                .spawn()?;

            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| MakuError::Io("worker stdin unavailable".to_string()))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| MakuError::Io("worker stdout unavailable".to_string()))?;

            let reader = tokio::spawn(read_results(index, stdout, self.results_tx.clone()));
            self.slots.push(WorkerSlot { child, stdin, reader, busy: false });
        }

        self.running = true;
        tracing::debug!(workers = self.size, "process pool started");
        Ok(())
    }
}

/// Forward a worker's result frames into the shared channel; `None` marks
/// the worker's stdout closing.
async fn read_results(
    index: usize,
    mut stdout: ChildStdout,
    tx: mpsc::UnboundedSender<(usize, Option<TaskResult>)>,
) {
    loop {
        let mut buf = [0u8; frame::RESULT_FRAME_LEN];
        match stdout.read_exact(&mut buf).await {
            Ok(_) => {
                if tx.send((index, Some(frame::decode_result(buf)))).is_err() {
                    break;
                }
            }
            Err(_) => {
                let _ = tx.send((index, None));
                break;
            }
        }
    }
}

#[async_trait]
impl Executor for ProcessPool {
    fn can_accept(&self) -> bool {
        self.running && self.slots.iter().any(|slot| !slot.busy)
    }

    async fn submit(&mut self, node: NodeId, commands: &[String]) -> MakuResult<()> {
        let buf = frame::encode_task(node, commands)?;
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| !slot.busy)
            .ok_or_else(|| MakuError::Io("no idle worker".to_string()))?;

        slot.stdin.write_all(&buf).await?;
        slot.stdin.flush().await?;
        slot.busy = true;
        Ok(())
    }

    async fn wait_result(&mut self) -> MakuResult<TaskResult> {
        loop {
            let (index, result) = self
                .results_rx
                .recv()
                .await
                .ok_or_else(|| MakuError::Io("worker result channel closed".to_string()))?;

            match result {
                Some(frame) => {
                    self.slots[index].busy = false;
                    return Ok(frame);
                }
                // EOF from a busy worker means it died mid-task; EOF from an
                // idle one is just its exit racing ours
                None if self.slots[index].busy => {
                    return Err(MakuError::Io(format!("worker {index} exited unexpectedly")));
                }
                None => {}
            }
        }
    }

    async fn shutdown(&mut self) -> MakuResult<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        for slot in &mut self.slots {
            // an idle worker exits on the sentinel; a wedged one is killed
            // below regardless
            let _ = slot.stdin.write_all(&frame::shutdown_frame()).await;
            let _ = slot.stdin.flush().await;
        }

        for slot in &mut self.slots {
            let _ = slot.child.start_kill();
            let _ = slot.child.wait().await;
            slot.reader.abort();
        }

        self.slots.clear();
        tracing::debug!("process pool shut down");
        Ok(())
    }
}
