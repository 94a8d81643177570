//! Jobs: a batch of independent inputs sharing one transform and one execution policy.
//!
//! A [`Job`] is built right before submission and consumed by
//! [`WorkerPool::execute`](crate::pool::WorkerPool::execute). The transform is bound at
//! construction and cannot be swapped afterwards; submitting the same inputs with a
//! different transform means building a new job.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::UnitError;

/// Capability that turns one input into a typed value
///
/// Implementations may perform I/O (send a request, read and decode the body) but must
/// not mutate state shared with other units: units of the same job run concurrently
/// and in no particular order.
///
/// Any `Fn(I) -> impl Future<Output = Result<T, UnitError>>` closure is a transform.
#[async_trait::async_trait]
pub trait Transform<I, T>: Send + Sync
where
    I: Send + 'static,
    T: Send + 'static,
{
    /// Run the transform on a single input
    async fn apply(&self, input: I) -> std::result::Result<T, UnitError>;
}

#[async_trait::async_trait]
impl<I, T, F, Fut> Transform<I, T> for F
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, UnitError>> + Send + 'static,
{
    async fn apply(&self, input: I) -> std::result::Result<T, UnitError> {
        (self)(input).await
    }
}

/// Execution policy shared by every unit of a job
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobPolicy {
    /// Concurrency ceiling requested by the job (None = pool default)
    pub workers: Option<usize>,
    /// Per-unit timeout (None = pool default)
    pub unit_timeout: Option<Duration>,
    /// Deadline for the whole batch, measured from submission (None = pool default)
    pub deadline: Option<Duration>,
}

/// An ordered batch of inputs bound to a single transform
pub struct Job<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    inputs: Vec<I>,
    transform: Arc<dyn Transform<I, T>>,
    policy: JobPolicy,
}

impl<I, T> Job<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    /// Create a job applying `transform` to every input, in input order
    pub fn new<X>(transform: X, inputs: impl IntoIterator<Item = I>) -> Self
    where
        X: Transform<I, T> + 'static,
    {
        Self {
            inputs: inputs.into_iter().collect(),
            transform: Arc::new(transform),
            policy: JobPolicy::default(),
        }
    }

    /// Request a specific concurrency ceiling for this job
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.policy.workers = Some(workers);
        self
    }

    /// Fail any unit that runs longer than `timeout`
    #[must_use]
    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.policy.unit_timeout = Some(timeout);
        self
    }

    /// Cancel the remainder of the batch once `deadline` has elapsed since submission
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.policy.deadline = Some(deadline);
        self
    }

    /// Number of units in the job
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns true if the job has no units
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// The job's execution policy
    pub fn policy(&self) -> JobPolicy {
        self.policy
    }

    pub(crate) fn into_parts(self) -> (Vec<I>, Arc<dyn Transform<I, T>>, JobPolicy) {
        (self.inputs, self.transform, self.policy)
    }
}

impl<I, T> std::fmt::Debug for Job<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("units", &self.inputs.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
