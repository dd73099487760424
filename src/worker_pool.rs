//! # Worker Pool Module
//!
//! Executes blocking handler invocations off the request-processing coroutine.
//!
//! ## Features
//!
//! - **Shared queue**: N worker coroutines share one unbounded may channel and load
//!   balance across unordered jobs
//! - **Ordered lanes**: jobs submitted with an ordering key are hashed onto a lane served
//!   by a single coroutine, so jobs with the same key run in submission order
//! - **Panic isolation**: a panicking job is logged and counted; the worker keeps going
//! - **Metrics**: dispatched, completed and panicked counts plus approximate queue depth
//!
//! ## Configuration
//!
//! - `RESTMAP_BLOCKING_WORKERS`: workers on the shared queue (default: 4)
//! - `RESTMAP_ORDERED_LANES`: number of ordered lanes (default: 4)
//! - `RESTMAP_STACK_SIZE`: coroutine stack size, decimal or `0x` hex (default: 0x10000)

use crate::error::RestError;
use crate::runtime_config::RuntimeConfig;
use may::sync::mpsc;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Unit of blocking work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs blocking invocations away from the dispatching coroutine.
pub trait BlockingExecutor: Send + Sync {
    /// Submit `job`. Jobs sharing an `ordering_key` must run in submission order.
    fn execute(&self, ordering_key: Option<&str>, job: Job) -> Result<(), RestError>;
}

/// Runs every job on the caller. Ordering holds trivially.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl BlockingExecutor for InlineExecutor {
    fn execute(&self, _ordering_key: Option<&str>, job: Job) -> Result<(), RestError> {
        job();
        Ok(())
    }
}

/// Configuration for a worker pool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of coroutines on the shared queue
    pub num_workers: usize,
    /// Number of single-coroutine ordered lanes
    pub ordered_lanes: usize,
    /// Stack size for worker coroutines
    pub stack_size: usize,
}

impl WorkerPoolConfig {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        RuntimeConfig::from_env().worker_pool()
    }

    #[must_use]
    pub fn new(num_workers: usize, ordered_lanes: usize, stack_size: usize) -> Self {
        Self {
            num_workers,
            ordered_lanes,
            stack_size,
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            ordered_lanes: 4,
            stack_size: 0x10000, // 64KB
        }
    }
}

/// Metrics for a worker pool
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    dispatched_count: AtomicU64,
    completed_count: AtomicU64,
    panicked_count: AtomicU64,
    queue_depth: AtomicUsize,
}

impl WorkerPoolMetrics {
    fn record_dispatch(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    fn record_completion(&self) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_panic(&self) {
        self.panicked_count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panicked(&self) -> u64 {
        self.panicked_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }
}

/// may-coroutine pool implementing [`BlockingExecutor`].
pub struct WorkerPool {
    name: String,
    config: WorkerPoolConfig,
    shared: Mutex<mpsc::Sender<Job>>,
    lanes: Vec<Mutex<mpsc::Sender<Job>>>,
    metrics: Arc<WorkerPoolMetrics>,
}

fn spawn_worker(
    pool_name: &str,
    worker: String,
    rx: Arc<mpsc::Receiver<Job>>,
    metrics: Arc<WorkerPoolMetrics>,
    stack_size: usize,
) {
    let pool = pool_name.to_string();
    let worker_name = worker.clone();
    // SAFETY: may requires the closure not to block the OS thread on non-may
    // primitives; jobs run handler code that is expected to cooperate with may.
    #[allow(unsafe_code)]
    let spawned = unsafe {
        may::coroutine::Builder::new()
            .name(worker_name)
            .stack_size(stack_size)
            .spawn(move || {
                debug!(pool = %pool, worker = %worker, "worker coroutine started");
                while let Ok(job) = rx.recv() {
                    if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job))
                    {
                        metrics.record_panic();
                        error!(
                            pool = %pool,
                            worker = %worker,
                            panic_message = ?panic,
                            "blocking job panicked"
                        );
                    }
                    metrics.record_completion();
                }
                debug!(pool = %pool, worker = %worker, "worker coroutine exiting");
            })
    };
    if let Err(e) = spawned {
        error!(pool = %pool_name, error = %e, "failed to spawn worker coroutine");
    }
}

impl WorkerPool {
    /// Spawn the shared workers and the ordered lanes.
    pub fn new(name: impl Into<String>, config: WorkerPoolConfig) -> Self {
        let name = name.into();
        let metrics = Arc::new(WorkerPoolMetrics::default());

        info!(
            pool = %name,
            num_workers = config.num_workers,
            ordered_lanes = config.ordered_lanes,
            stack_size = config.stack_size,
            "creating worker pool"
        );

        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(rx);
        for worker_id in 0..config.num_workers.max(1) {
            spawn_worker(
                &name,
                format!("{}-worker-{}", name, worker_id),
                Arc::clone(&rx),
                Arc::clone(&metrics),
                config.stack_size,
            );
        }

        let lanes = (0..config.ordered_lanes)
            .map(|lane_id| {
                let (lane_tx, lane_rx) = mpsc::channel::<Job>();
                spawn_worker(
                    &name,
                    format!("{}-lane-{}", name, lane_id),
                    Arc::new(lane_rx),
                    Arc::clone(&metrics),
                    config.stack_size,
                );
                Mutex::new(lane_tx)
            })
            .collect();

        Self {
            name,
            config,
            shared: Mutex::new(tx),
            lanes,
            metrics,
        }
    }

    fn lane_for(&self, key: &str) -> Option<&Mutex<mpsc::Sender<Job>>> {
        if self.lanes.is_empty() {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.lanes.len() as u64) as usize;
        self.lanes.get(index)
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<WorkerPoolMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }
}

impl BlockingExecutor for WorkerPool {
    fn execute(&self, ordering_key: Option<&str>, job: Job) -> Result<(), RestError> {
        let sender = match ordering_key.and_then(|key| self.lane_for(key)) {
            Some(lane) => lane,
            None => &self.shared,
        };
        self.metrics.record_dispatch();
        if let Err(e) = sender.lock().send(job) {
            self.metrics.record_completion();
            error!(pool = %self.name, error = %e, "worker pool channel disconnected");
            return Err(RestError::Unavailable(
                "blocking workers are not responding".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}
