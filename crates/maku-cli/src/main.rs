//! maku CLI entry point.
//!
//! Usage:
//!   maku                 # build the _default target with 2 workers
//!   maku TARGET          # build TARGET
//!   maku -j4 TARGET      # build TARGET with 4 workers
//!   maku -j 0 TARGET     # worker count = available parallelism
//!
//! The hidden `--worker` flag turns the invocation into a pool worker that
//! speaks the frame protocol over stdin/stdout; it is spawned by the pool,
//! never typed by hand.

use std::env;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use maku_kernel::pool::{DEFAULT_WORKERS, ProcessPool, WORKER_FLAG, WorkerCommand, worker};
use maku_kernel::scheduler::{DEFAULT_TARGET, Scheduler};
use maku_kernel::{Graph, cache, parser, reader};
use maku_types::MakuError;

/// Rule file name, resolved against the working directory.
const RULE_FILE: &str = "Makefile";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    // worker mode owns stdout for the wire protocol; dispatch before
    // anything else can write to it
    if args.first().map(String::as_str) == Some(WORKER_FLAG) {
        return run_worker();
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("maku: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_worker() -> ExitCode {
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    match worker::run(&mut stdin, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("maku worker: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Options collected from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BuildConfig {
    /// Worker count: `None` falls back to [`DEFAULT_WORKERS`], `Some(0)`
    /// to the host's available parallelism.
    jobs: Option<u32>,
    /// Requested target, if one was named.
    target: Option<String>,
}

fn parse_args(args: &[String]) -> BuildConfig {
    let mut jobs = None;
    let mut target = None;

    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        if let Some(rest) = arg.strip_prefix("-j") {
            if !rest.is_empty() {
                // -j8; a non-integer suffix means "use all cores"
                jobs = Some(rest.parse().unwrap_or(0));
            } else {
                // -j 8; bare -j and -j <non-integer> both mean "all cores",
                // and a non-integer next argument stays positional
                match iter.peek().and_then(|next| next.parse::<u32>().ok()) {
                    Some(n) => {
                        jobs = Some(n);
                        iter.next();
                    }
                    None => jobs = Some(0),
                }
            }
        } else if target.is_none() {
            target = Some(arg.clone());
        }
    }

    BuildConfig { jobs, target }
}

fn worker_count(config: &BuildConfig) -> usize {
    match config.jobs {
        None => DEFAULT_WORKERS,
        Some(0) => thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(DEFAULT_WORKERS),
        Some(n) => n as usize,
    }
}

fn run(args: &[String]) -> Result<()> {
    let config = parse_args(args);
    let target = config
        .target
        .clone()
        .unwrap_or_else(|| DEFAULT_TARGET.to_string());
    let jobs = worker_count(&config);

    let rule_file = Path::new(RULE_FILE);
    if !rule_file.exists() {
        return Err(MakuError::MissingRuleFile(RULE_FILE.to_string()).into());
    }

    let cache_file = Path::new(cache::CACHE_FILE);
    let (graph, cache_stale) = if cache::is_fresh(cache_file, rule_file) {
        tracing::debug!("rule file unchanged, using graph cache");
        (cache::load(cache_file)?, false)
    } else {
        let lines = reader::read_lines(rule_file)?;
        let parsed = parser::parse(&lines)?;
        (Graph::build(&parsed)?, true)
    };
    let graph = Arc::new(graph);

    if config.target.is_none() && graph.id_of(DEFAULT_TARGET).is_none() {
        eprintln!("maku: no target named and no {DEFAULT_TARGET} rule to fall back to");
        return Err(MakuError::UnknownTarget(DEFAULT_TARGET.to_string()).into());
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(build(graph, cache_stale, jobs, &target))
}

async fn build(graph: Arc<Graph>, cache_stale: bool, jobs: usize, target: &str) -> Result<()> {
    let mut pool = ProcessPool::new(jobs, WorkerCommand::current_exe()?);
    pool.start()?;

    // first build (or stale cache): republish while the build runs
    let persist = cache_stale.then(|| {
        let graph = graph.clone();
        tokio::task::spawn_blocking(move || cache::store(Path::new(cache::CACHE_FILE), &graph))
    });

    let mut scheduler = Scheduler::new(pool);
    let run_result = scheduler.run(&graph, target).await;

    if let Some(task) = persist {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("failed to write graph cache: {e}"),
            Err(e) => tracing::warn!("graph cache writer panicked: {e}"),
        }
    }

    run_result?;
    Ok(())
}
