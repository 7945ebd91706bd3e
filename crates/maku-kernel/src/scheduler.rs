//! Build scheduling: needed subgraph, readiness, staleness, dispatch.
//!
//! A run takes the graph and one requested target, restricts all work to
//! the target's ancestors, and drives the executor: dispatch every ready
//! node whose output is stale, propagate readiness as nodes complete or
//! are skipped, stop the world on the first failure, and report a cycle if
//! needed nodes never became ready.
//!
//! Within a node, commands run in source order on one worker; across
//! nodes, only the dependency partial order is promised. Ties between
//! equally-ready nodes break in FIFO order of the ready queue.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use maku_types::{MakuError, MakuResult, NodeId};

use crate::graph::Graph;
use crate::pool::Executor;

/// Target built when the CLI names none.
pub const DEFAULT_TARGET: &str = "_default";

/// Drives one build run over an [`Executor`].
pub struct Scheduler<E: Executor> {
    pool: E,
}

impl<E: Executor> Scheduler<E> {
    pub fn new(pool: E) -> Self {
        Self { pool }
    }

    /// Build `start` and everything it depends on.
    ///
    /// The pool is shut down before returning, on success and on failure
    /// alike; no worker survives a finished run.
    pub async fn run(&mut self, graph: &Graph, start: &str) -> MakuResult<()> {
        let result = self.drive(graph, start).await;
        let shutdown = self.pool.shutdown().await;
        result?;
        shutdown
    }

    async fn drive(&mut self, graph: &Graph, start: &str) -> MakuResult<()> {
        let Some(start_id) = graph.id_of(start) else {
            return Err(MakuError::UnknownTarget(start.to_string()));
        };

        let n = graph.len();

        // needed set: ancestors of the start target, inclusive
        let mut needed = vec![false; n];
        let mut stack = vec![start_id];
        needed[start_id.index()] = true;
        while let Some(u) = stack.pop() {
            for &p in graph.parents_of(u) {
                if !needed[p.index()] {
                    needed[p.index()] = true;
                    stack.push(p);
                }
            }
        }

        // in-degrees restricted to the needed set
        let mut indegree = vec![0u32; n];
        for i in 0..n {
            if !needed[i] {
                continue;
            }
            for &v in graph.children_of(NodeId(i as u32)) {
                if needed[v.index()] {
                    indegree[v.index()] += 1;
                }
            }
        }

        let mut ready: VecDeque<NodeId> = (0..n)
            .map(|i| NodeId(i as u32))
            .filter(|id| needed[id.index()] && indegree[id.index()] == 0)
            .collect();

        let mut running = 0u32;

        while !ready.is_empty() || running > 0 {
            while self.pool.can_accept() {
                let Some(u) = ready.pop_front() else { break };

                // a node with no commands completes the instant it is
                // ready: there is nothing to run, and the wire protocol
                // reserves a zero command count for the shutdown sentinel
                if should_execute(graph, u)? && !graph.commands_of(u).is_empty() {
                    for command in graph.commands_of(u) {
                        println!("{command}");
                    }
                    tracing::debug!(node = graph.name_of(u), "dispatch");
                    self.pool.submit(u, graph.commands_of(u)).await?;
                    running += 1;
                } else {
                    tracing::debug!(node = graph.name_of(u), "skip");
                    propagate(graph, &needed, &mut indegree, &mut ready, u);
                }
            }

            if running == 0 {
                continue;
            }

            let result = self.pool.wait_result().await?;
            running -= 1;

            if !result.ok() {
                return Err(MakuError::CommandFailed {
                    target: graph.name_of(result.node).to_string(),
                    code: result.exit_code,
                });
            }

            tracing::debug!(node = graph.name_of(result.node), "complete");
            propagate(graph, &needed, &mut indegree, &mut ready, result.node);
        }

        // a cycle among needed nodes keeps every one of them from ever
        // entering the ready queue
        if (0..n).any(|i| needed[i] && indegree[i] != 0) {
            return Err(MakuError::CycleDetected);
        }

        Ok(())
    }
}

/// Decrement children's in-degrees after `u` completed or was skipped.
fn propagate(
    graph: &Graph,
    needed: &[bool],
    indegree: &mut [u32],
    ready: &mut VecDeque<NodeId>,
    u: NodeId,
) {
    for &v in graph.children_of(u) {
        if !needed[v.index()] {
            continue;
        }
        indegree[v.index()] -= 1;
        if indegree[v.index()] == 0 {
            ready.push_back(v);
        }
    }
}

/// Decide whether `u` must run.
///
/// Phony targets always run. Otherwise the target file must exist and be no
/// older than any parent's file — *all* parents, not just needed ones: a
/// stale dependency invalidates the target regardless of why it is stale.
fn should_execute(graph: &Graph, u: NodeId) -> MakuResult<bool> {
    if graph.is_phony(u) {
        return Ok(true);
    }

    let target = graph.name_of(u);
    if !Path::new(target).exists() {
        return Ok(true);
    }

    for &p in graph.parents_of(u) {
        if is_newer(graph.name_of(p), target)? {
            return Ok(true);
        }
    }

    Ok(false)
}

/// True when `file` has a strictly newer mtime than `wrt`.
///
/// An unreadable mtime on `file` answers false: a parent that never hits
/// disk (a phony, a pure intermediate) cannot invalidate the target. An
/// unreadable mtime on `wrt` is an internal inconsistency — the caller just
/// observed that file existing.
fn is_newer(file: &str, wrt: &str) -> MakuResult<bool> {
    let wrt_time = match mtime(wrt) {
        Some(t) => t,
        None => return Err(MakuError::DependencyOutputMissing(wrt.to_string())),
    };

    match mtime(file) {
        Some(t) => Ok(t > wrt_time),
        None => Ok(false),
    }
}

fn mtime(path: &str) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
