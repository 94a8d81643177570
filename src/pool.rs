//! Bounded-concurrency executor for [`Job`]s.
//!
//! The pool runs at most `workers` units at once. Units are pulled from the job in
//! input order as slots free up, so one slow unit never holds back the rest of the
//! batch. Every unit runs on its own runtime task, which gives real parallelism on a
//! multi-threaded runtime and contains panics: a unit that panics yields
//! [`UnitError::Panicked`] at its index while its siblings carry on.
//!
//! Outcomes are written back by index, so [`BatchResults`] is always aligned with the
//! job's inputs regardless of completion order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::error::{Error, Result, UnitError};
use crate::job::{Job, Transform};

/// Outcome of a single unit
pub type UnitResult<T> = std::result::Result<T, UnitError>;

/// Derived classification of a completed batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    /// No unit failed (including the empty batch)
    AllSucceeded,
    /// At least one unit failed and at least one succeeded
    PartiallyFailed {
        /// Number of failed units
        failed: usize,
    },
    /// Every unit failed
    AllFailed {
        /// Number of failed units
        failed: usize,
    },
}

/// Index-aligned outcomes of a batch
///
/// `results[i]` is the outcome of the job's `i`-th input. A failed slot holds only
/// its error, so a failed unit can never be mistaken for data.
#[derive(Debug)]
pub struct BatchResults<T> {
    outcomes: Vec<UnitResult<T>>,
}

impl<T> BatchResults<T> {
    /// Wrap already-computed outcomes, e.g. from a custom executor or a test
    pub fn from_outcomes(outcomes: Vec<UnitResult<T>>) -> Self {
        Self { outcomes }
    }

    /// Number of units in the batch
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true for an empty batch
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcome of the unit at `index`
    pub fn get(&self, index: usize) -> Option<&UnitResult<T>> {
        self.outcomes.get(index)
    }

    /// Iterate over outcomes in input order
    pub fn iter(&self) -> std::slice::Iter<'_, UnitResult<T>> {
        self.outcomes.iter()
    }

    /// Per-index errors, `None` where the unit succeeded
    pub fn errors(&self) -> impl Iterator<Item = Option<&UnitError>> {
        self.outcomes.iter().map(|outcome| outcome.as_ref().err())
    }

    /// Number of failed units
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_err()).count()
    }

    /// Number of successful units
    pub fn succeeded(&self) -> usize {
        self.len() - self.failed()
    }

    /// Classify the batch by its failure count
    pub fn outcome(&self) -> BatchOutcome {
        let failed = self.failed();
        if failed == 0 {
            BatchOutcome::AllSucceeded
        } else if failed == self.len() {
            BatchOutcome::AllFailed { failed }
        } else {
            BatchOutcome::PartiallyFailed { failed }
        }
    }

    /// Consume into the outcome vector
    pub fn into_outcomes(self) -> Vec<UnitResult<T>> {
        self.outcomes
    }

    /// Split into two parallel vectors of equal length
    ///
    /// For every index exactly one of `values[i]` and `errors[i]` is `Some`.
    pub fn into_parts(self) -> (Vec<Option<T>>, Vec<Option<UnitError>>) {
        let mut values = Vec::with_capacity(self.outcomes.len());
        let mut errors = Vec::with_capacity(self.outcomes.len());
        for outcome in self.outcomes {
            match outcome {
                Ok(value) => {
                    values.push(Some(value));
                    errors.push(None);
                }
                Err(e) => {
                    values.push(None);
                    errors.push(Some(e));
                }
            }
        }
        (values, errors)
    }
}

impl<T> IntoIterator for BatchResults<T> {
    type Item = UnitResult<T>;
    type IntoIter = std::vec::IntoIter<UnitResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

/// Executor that runs a job's units with a concurrency ceiling
///
/// The pool itself holds no per-batch state and can be shared between widgets.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    max_workers: usize,
    unit_timeout: Option<Duration>,
    batch_deadline: Option<Duration>,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::from_pool_config(&PoolConfig::default())
    }
}

impl WorkerPool {
    /// Create a pool whose default ceiling is `max_workers`
    ///
    /// A ceiling of zero is accepted here but rejected when a job is executed with it.
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            unit_timeout: None,
            batch_deadline: None,
        }
    }

    /// Create a pool from configuration
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `max_workers` is zero
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        if config.max_workers == 0 {
            return Err(Error::Config {
                message: "max_workers must be at least 1".to_string(),
                key: Some("pool.max_workers".to_string()),
            });
        }
        Ok(Self::from_pool_config(config))
    }

    fn from_pool_config(config: &PoolConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            unit_timeout: config.unit_timeout,
            batch_deadline: config.batch_deadline,
        }
    }

    /// Default concurrency ceiling for jobs that do not request their own
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every unit of `job` and return their index-aligned outcomes
    ///
    /// # Errors
    /// Only whole-batch conditions are errors: a job with a zero concurrency ceiling,
    /// or no tokio runtime to run workers on. Unit failures are reported in the results.
    pub async fn execute<I, T>(&self, job: Job<I, T>) -> Result<BatchResults<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
    {
        self.execute_with_cancel(job, CancellationToken::new()).await
    }

    /// Like [`WorkerPool::execute`], stopping early when `cancel` is triggered
    ///
    /// Units that already finished keep their outcome. Units still running are
    /// aborted and units not yet started are skipped; both report
    /// [`UnitError::Cancelled`].
    ///
    /// # Errors
    /// See [`WorkerPool::execute`]
    pub async fn execute_with_cancel<I, T>(
        &self,
        job: Job<I, T>,
        cancel: CancellationToken,
    ) -> Result<BatchResults<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
    {
        let (inputs, transform, policy) = job.into_parts();
        let units = inputs.len();

        let requested = policy.workers.unwrap_or(self.max_workers);
        if requested == 0 {
            return Err(Error::InvalidJob(
                "concurrency ceiling must be at least 1".to_string(),
            ));
        }

        if units == 0 {
            tracing::debug!("Empty job, nothing to execute");
            return Ok(BatchResults::from_outcomes(Vec::new()));
        }

        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;

        let workers = requested.min(units);
        let unit_timeout = policy.unit_timeout.or(self.unit_timeout);
        let deadline = policy.deadline.or(self.batch_deadline);

        tracing::debug!(
            units = units,
            workers = workers,
            unit_timeout_ms = unit_timeout.map(|d| d.as_millis() as u64),
            deadline_ms = deadline.map(|d| d.as_millis() as u64),
            "Executing job"
        );

        let batch_token = cancel.child_token();
        let deadline_task = deadline.map(|limit| {
            let token = batch_token.clone();
            AbortOnDrop(runtime.spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::warn!(
                    deadline_ms = limit.as_millis() as u64,
                    "Batch deadline reached, cancelling"
                );
                token.cancel();
            }))
        });

        let started = Instant::now();
        let mut slots: Vec<Option<UnitResult<T>>> = (0..units).map(|_| None).collect();

        let mut completed = stream::iter(inputs.into_iter().enumerate())
            .map(|(index, input)| {
                let transform = Arc::clone(&transform);
                let token = batch_token.clone();
                let runtime = runtime.clone();
                async move {
                    let outcome = run_unit(&runtime, transform, input, unit_timeout, token).await;
                    (index, outcome)
                }
            })
            .buffer_unordered(workers);

        while let Some((index, outcome)) = completed.next().await {
            if let Err(e) = &outcome {
                match e {
                    UnitError::Panicked(_) => {
                        tracing::error!(index = index, error = %e, "Unit panicked")
                    }
                    UnitError::Cancelled => {
                        tracing::debug!(index = index, "Unit cancelled")
                    }
                    _ => tracing::debug!(index = index, error = %e, "Unit failed"),
                }
            }
            slots[index] = Some(outcome);
        }
        drop(completed);
        drop(deadline_task);

        // Every index is filled once the stream is drained; an empty slot can only mean
        // the unit never completed.
        let outcomes: Vec<UnitResult<T>> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(UnitError::Cancelled)))
            .collect();
        let results = BatchResults::from_outcomes(outcomes);

        tracing::debug!(
            units = units,
            succeeded = results.succeeded(),
            failed = results.failed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job finished"
        );

        Ok(results)
    }
}

/// Run one unit on its own task, honouring the timeout and the batch cancellation.
async fn run_unit<I, T>(
    runtime: &Handle,
    transform: Arc<dyn Transform<I, T>>,
    input: I,
    timeout: Option<Duration>,
    token: CancellationToken,
) -> UnitResult<T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    if token.is_cancelled() {
        return Err(UnitError::Cancelled);
    }

    let mut task = AbortOnDrop(runtime.spawn(async move {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, transform.apply(input))
                .await
                .unwrap_or(Err(UnitError::TimedOut(limit))),
            None => transform.apply(input).await,
        }
    }));

    tokio::select! {
        biased;
        joined = &mut task.0 => match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Err(UnitError::Panicked(panic_message(e.into_panic()))),
            Err(_) => Err(UnitError::Cancelled),
        },
        () = token.cancelled() => Err(UnitError::Cancelled),
    }
}

/// Extract a readable message from a panic payload.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Aborts the wrapped task when dropped, so abandoned units stop their I/O.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
