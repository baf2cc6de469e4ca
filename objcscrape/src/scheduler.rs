//! Task scheduler: a bounded pool of workers, each running one framework
//! batch at a time through the compiler and the extractor.
//!
//! Dispatch is last-idle-first: `submit` hands a task straight to the most
//! recently idled worker, or queues it when every worker is busy. A worker
//! that finishes a task takes the next queued one before reporting idle.
//! Each task runs in its own spawned tokio task so a panic is reported as a
//! per-batch error and never takes the worker (or the pool) down with it.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::error::{BatchError, InvokeError};
use crate::extract::extract_tree;
use crate::invoke::{Frontend, Mode, ParseRequest};
use crate::model::{BatchResult, BatchTask, Extraction, Targets};
use crate::source::SourceCache;

type Reply = oneshot::Sender<Result<BatchResult, BatchError>>;

struct Job {
    task: BatchTask,
    reply: Reply,
}

#[derive(Default)]
struct PoolState {
    /// Idle worker ids; the last one pushed is the first one reused.
    idle: Vec<usize>,
    queue: VecDeque<Job>,
    /// Workers currently holding a job.
    busy: usize,
    closed: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    drained: Notify,
    frontend: Arc<dyn Frontend>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Completion handle for one submitted batch.
pub struct BatchHandle {
    framework: String,
    rx: oneshot::Receiver<Result<BatchResult, BatchError>>,
}

impl BatchHandle {
    pub fn framework(&self) -> &str {
        &self.framework
    }
}

impl Future for BatchHandle {
    type Output = Result<BatchResult, BatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let polled = Pin::new(&mut self.rx).poll(cx);
        polled.map(|reply| {
            reply.unwrap_or_else(|_| {
                Err(BatchError::PoolClosed {
                    framework: self.framework.clone(),
                })
            })
        })
    }
}

/// Bounded worker pool. Must be created inside a tokio runtime.
pub struct WorkerPool {
    shared: Arc<Shared>,
    senders: Vec<mpsc::UnboundedSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(frontend: Arc<dyn Frontend>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                idle: (0..worker_count).rev().collect(),
                ..Default::default()
            }),
            drained: Notify::new(),
            frontend,
        });

        let (senders, workers) = (0..worker_count)
            .map(|id| {
                let (tx, rx) = mpsc::unbounded_channel();
                let handle = tokio::spawn(worker_loop(id, Arc::clone(&shared), rx));
                (tx, handle)
            })
            .unzip::<_, _, Vec<_>, Vec<_>>();

        info!(workers = worker_count, "started worker pool");
        Self {
            shared,
            senders,
            workers,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue `task` and return a handle that resolves once it completes or
    /// fails.
    pub fn submit(&self, task: BatchTask) -> BatchHandle {
        let (reply, rx) = oneshot::channel();
        let framework = task.framework.clone();
        let job = Job { task, reply };

        let mut state = self.shared.lock();
        if state.closed {
            drop(state);
            let _ = job.reply.send(Err(BatchError::PoolClosed {
                framework: framework.clone(),
            }));
        } else if let Some(worker) = state.idle.pop() {
            state.busy += 1;
            drop(state);
            debug!(framework = %framework, worker, "dispatching batch");
            if let Err(mpsc::error::SendError(job)) = self.senders[worker].send(job) {
                let _ = job.reply.send(Err(BatchError::PoolClosed {
                    framework: framework.clone(),
                }));
            }
        } else {
            debug!(framework = %framework, queued = state.queue.len() + 1, "queueing batch");
            state.queue.push_back(job);
        }

        BatchHandle { framework, rx }
    }

    /// Wait for every queued and in-flight batch, then stop all workers.
    pub async fn shutdown(self) {
        self.shared.lock().closed = true;
        loop {
            let drained = self.shared.drained.notified();
            {
                let state = self.shared.lock();
                if state.busy == 0 && state.queue.is_empty() {
                    break;
                }
            }
            drained.await;
        }

        drop(self.senders);
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!("worker failed to stop cleanly: {e}");
            }
        }
        debug!("worker pool shut down");
    }
}

async fn worker_loop(id: usize, shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(mut job) = rx.recv().await {
        loop {
            run_job(id, &shared, job).await;
            let mut state = shared.lock();
            match state.queue.pop_front() {
                Some(next) => job = next,
                None => {
                    state.busy -= 1;
                    state.idle.push(id);
                    if state.busy == 0 {
                        shared.drained.notify_waiters();
                    }
                    break;
                }
            }
        }
    }
}

async fn run_job(worker: usize, shared: &Shared, job: Job) {
    let Job { task, reply } = job;
    let framework = task.framework.clone();
    debug!(framework = %framework, worker, headers = task.headers.len(), "worker picked up batch");

    let outcome = match tokio::spawn(process_batch(Arc::clone(&shared.frontend), task)).await {
        Ok(result) => result,
        Err(e) => Err(panicked(&framework, e)),
    };
    if let Err(e) = &outcome {
        warn!(framework = %framework, worker, "batch failed: {e}");
    }
    // The submitter may have stopped waiting.
    let _ = reply.send(outcome);
}

fn panicked(framework: &str, e: JoinError) -> BatchError {
    let message = if e.is_panic() {
        let payload = e.into_panic();
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    } else {
        e.to_string()
    };
    BatchError::Panicked {
        framework: framework.to_string(),
        message,
    }
}

/// Primary pass in module mode, then a pre-include pass for whatever the
/// primary pass did not produce. Entries from the primary pass are never
/// replaced.
pub async fn process_batch(
    frontend: Arc<dyn Frontend>,
    task: BatchTask,
) -> Result<BatchResult, BatchError> {
    let mut sources = SourceCache::new();

    let primary = match parse_and_extract(&*frontend, &task, Mode::Modules, sources).await {
        Ok((extraction, cache)) => {
            sources = cache;
            Some(extraction)
        }
        Err(PassError::Invoke(e)) => {
            warn!(framework = %task.framework, "module-mode parse failed, trying pre-include mode: {e}");
            sources = SourceCache::new();
            None
        }
        Err(PassError::Join(e)) => return Err(panicked(&task.framework, e)),
    };

    let missing = match &primary {
        Some(extraction) => extraction.missing(&task.targets),
        None => task.targets.clone(),
    };

    let primary_failed = primary.is_none();
    let mut extraction = primary.unwrap_or_default();
    let mut used_fallback = false;
    let mut conflicts = Vec::new();

    if primary_failed || !missing.is_empty() {
        log_missing(&task.framework, &missing);
        match parse_and_extract(&*frontend, &task, Mode::PreInclude, sources).await {
            Ok((fallback, _)) => {
                used_fallback = true;
                conflicts = extraction.merge_missing(fallback);
                if !conflicts.is_empty() {
                    warn!(
                        framework = %task.framework,
                        conflicts = ?conflicts,
                        "module and pre-include passes disagree, keeping module-mode records"
                    );
                }
            }
            Err(PassError::Invoke(source)) if primary_failed => {
                return Err(BatchError::Invocation {
                    framework: task.framework.clone(),
                    header: task.headers.first().cloned().unwrap_or_default(),
                    source,
                });
            }
            Err(PassError::Invoke(e)) => {
                warn!(framework = %task.framework, "pre-include fallback failed, keeping primary results: {e}");
            }
            Err(PassError::Join(e)) => return Err(panicked(&task.framework, e)),
        }
    }

    Ok(BatchResult {
        framework: task.framework,
        targets: task.targets,
        extraction,
        used_fallback,
        conflicts,
        binary: task.binary,
    })
}

enum PassError {
    Invoke(InvokeError),
    Join(JoinError),
}

async fn parse_and_extract(
    frontend: &dyn Frontend,
    task: &BatchTask,
    mode: Mode,
    mut sources: SourceCache,
) -> Result<(Extraction, SourceCache), PassError> {
    let request = ParseRequest::new(task, mode);
    let tree = frontend.parse(&request).await.map_err(PassError::Invoke)?;
    let targets = task.targets.clone();
    let framework = task.framework.clone();
    tokio::task::spawn_blocking(move || {
        let extraction = extract_tree(&tree, &targets, &mut sources);
        debug!(
            framework = %framework,
            ?mode,
            classes = extraction.classes.len(),
            protocols = extraction.protocols.len(),
            integer_enums = extraction.integer_enums.len(),
            string_enums = extraction.string_enums.len(),
            structs = extraction.structs.len(),
            "extracted batch"
        );
        (extraction, sources)
    })
    .await
    .map_err(PassError::Join)
}

fn log_missing(framework: &str, missing: &Targets) {
    debug!(
        framework,
        classes = ?missing.classes,
        protocols = ?missing.protocols,
        integer_enums = ?missing.integer_enums,
        string_enums = ?missing.string_enums,
        "declarations missing after module-mode pass"
    );
}

/// Final state of one submitted batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub framework: String,
    pub targets: Targets,
    pub result: Result<BatchResult, BatchError>,
}

/// Submit every task (largest header count first), wait for all of them,
/// and shut the pool down.
pub async fn run_batches(pool: WorkerPool, mut tasks: Vec<BatchTask>) -> Vec<BatchOutcome> {
    tasks.sort_by(|a, b| b.headers.len().cmp(&a.headers.len()));
    let pending: Vec<(Targets, BatchHandle)> = tasks
        .into_iter()
        .map(|task| {
            let targets = task.targets.clone();
            (targets, pool.submit(task))
        })
        .collect();

    let mut outcomes = Vec::with_capacity(pending.len());
    for (targets, handle) in pending {
        let framework = handle.framework().to_string();
        let result = handle.await;
        outcomes.push(BatchOutcome {
            framework,
            targets,
            result,
        });
    }
    pool.shutdown().await;
    outcomes
}
