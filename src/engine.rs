//! Asynchronous query execution.
//!
//! Planning is synchronous; execution is handed to a [`Scheduler`] and the
//! outcome delivered through a [`ResponseListener`]. Each execution owns
//! its operator tree, calls `close()` on every exit path, and invokes
//! exactly one of `on_response`/`on_failure`. A [`ResourceMonitor`] gates
//! each batch step: transient unhealth is retried a bounded number of
//! times with exponential backoff before the query fails.

use crate::data::BindingTuple;
use crate::error::{QueryError, QueryResult};
use crate::executor::{Column, ExplainNode, PhysicalPlan};
use log::{debug, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Rows pulled between resource checks.
const BATCH_SIZE: usize = 1000;

/// Complete result of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub schema: Vec<Column>,
    pub rows: Vec<BindingTuple>,
}

/// Receives the outcome of one execution: exactly one call, either the
/// full result set or a failure. No partial delivery.
pub trait ResponseListener: Send {
    fn on_response(&mut self, response: QueryResponse);
    fn on_failure(&mut self, error: QueryError);
}

/// Receives an explain tree instead of data.
pub trait ExplainListener: Send {
    fn on_explain(&mut self, tree: ExplainNode);
    fn on_failure(&mut self, error: QueryError);
}

/// Fire-and-forget task dispatch provided by the host.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: Box<dyn FnOnce() + Send>);
}

/// Schedules onto a Tokio runtime's blocking pool; the execution loop is
/// synchronous and must not stall async workers.
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Scheduler for the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) {
        self.handle.spawn_blocking(task);
    }
}

/// Runs tasks inline on the calling thread. For tests and embedded use.
pub struct DirectScheduler;

impl Scheduler for DirectScheduler {
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

/// Polled admission check consulted before each batch step.
pub trait ResourceMonitor: Send + Sync {
    fn is_healthy(&self) -> bool;
}

/// Memory-threshold monitor over an externally updated usage counter.
pub struct MemoryMonitor {
    used_bytes: Arc<AtomicUsize>,
    limit_bytes: usize,
}

impl MemoryMonitor {
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            used_bytes: Arc::new(AtomicUsize::new(0)),
            limit_bytes,
        }
    }

    /// Counter the host updates with its current memory usage.
    pub fn usage_counter(&self) -> Arc<AtomicUsize> {
        self.used_bytes.clone()
    }
}

impl ResourceMonitor for MemoryMonitor {
    fn is_healthy(&self) -> bool {
        self.used_bytes.load(Ordering::Relaxed) < self.limit_bytes
    }
}

/// Bounded retry with exponential backoff against transient resource
/// exhaustion. `none()` is the fast-fail variant.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
        }
    }
}

pub struct ExecutionEngine {
    scheduler: Arc<dyn Scheduler>,
    monitor: Arc<dyn ResourceMonitor>,
    retry: RetryPolicy,
}

impl ExecutionEngine {
    pub fn new(scheduler: Arc<dyn Scheduler>, monitor: Arc<dyn ResourceMonitor>) -> Self {
        Self {
            scheduler,
            monitor,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Schedule the open/iterate/close loop; the listener receives the
    /// outcome asynchronously.
    pub fn execute(&self, mut plan: Box<dyn PhysicalPlan>, mut listener: Box<dyn ResponseListener>) {
        let monitor = self.monitor.clone();
        let retry = self.retry;
        self.scheduler.schedule(Box::new(move || {
            let result = run_plan(plan.as_mut(), monitor.as_ref(), retry);
            // close() on every exit path, before delivery.
            plan.close();
            match result {
                Ok(response) => {
                    debug!("query delivered {} row(s)", response.rows.len());
                    listener.on_response(response);
                }
                Err(e) => {
                    warn!("query failed: {}", e);
                    listener.on_failure(e);
                }
            }
        }));
    }

    /// Deliver the plan's explain tree instead of executing it.
    pub fn explain(&self, plan: Box<dyn PhysicalPlan>, mut listener: Box<dyn ExplainListener>) {
        self.scheduler.schedule(Box::new(move || {
            listener.on_explain(plan.explain_node());
        }));
    }
}

fn run_plan(
    plan: &mut dyn PhysicalPlan,
    monitor: &dyn ResourceMonitor,
    retry: RetryPolicy,
) -> QueryResult<QueryResponse> {
    ensure_healthy(monitor, retry)?;
    plan.open()?;
    let mut rows = Vec::new();
    loop {
        if rows.len() % BATCH_SIZE == 0 && !rows.is_empty() {
            ensure_healthy(monitor, retry)?;
        }
        match plan.next()? {
            Some(row) => rows.push(row),
            None => break,
        }
    }
    Ok(QueryResponse {
        schema: plan.schema(),
        rows,
    })
}

fn ensure_healthy(monitor: &dyn ResourceMonitor, retry: RetryPolicy) -> QueryResult<()> {
    if monitor.is_healthy() {
        return Ok(());
    }
    let mut delay = retry.base_delay;
    for attempt in 1..=retry.max_retries {
        warn!(
            "resource monitor unhealthy, retry {}/{} after {:?}",
            attempt, retry.max_retries, delay
        );
        std::thread::sleep(delay);
        if monitor.is_healthy() {
            return Ok(());
        }
        delay *= 2;
    }
    Err(QueryError::resource_fatal(
        "insufficient resources to run the query, quit.",
    ))
}
