//! Error types for widget-fetch
//!
//! Errors are split by the scope they apply to:
//! - [`Error`] - whole-batch and setup failures (bad config, no runtime, invalid job)
//! - [`UnitError`] - failure of a single unit of work, stored at that unit's index
//! - [`ContentError`] - the NoContent / PartialContent classification handed to widgets

use std::time::Duration;
use thiserror::Error;

/// Result type alias for widget-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for widget-fetch
///
/// Only conditions that make an entire batch meaningless end up here. A unit that
/// fails never produces an [`Error`]; it produces a [`UnitError`] in its result slot.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pool.max_workers")
        key: Option<String>,
    },

    /// No async runtime is available to run the workers on
    #[error("execution runtime unavailable: {0}")]
    Runtime(String),

    /// The job cannot be executed as submitted
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// Network client setup error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single unit of work
#[derive(Debug, Error)]
pub enum UnitError {
    /// The request could not be sent or the body could not be read
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote answered with a non-success status
    #[error("unexpected status code {status} for {url}, response: {body}")]
    Status {
        /// HTTP status code returned by the remote
        status: u16,
        /// Requested URL
        url: String,
        /// Start of the response body, truncated
        body: String,
    },

    /// The response body could not be decoded into the expected shape
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Requested URL
        url: String,
        /// Underlying decoder error
        #[source]
        source: serde_json::Error,
    },

    /// The transform rejected its input or output
    #[error("{0}")]
    Transform(String),

    /// The unit did not finish within its per-unit timeout
    #[error("unit timed out after {0:?}")]
    TimedOut(Duration),

    /// The unit panicked; the panic was contained at the worker boundary
    #[error("unit panicked: {0}")]
    Panicked(String),

    /// The batch was cancelled before this unit completed
    #[error("cancelled before completion")]
    Cancelled,
}

impl UnitError {
    /// Returns true if this unit did not complete because the batch was cancelled
    pub fn is_cancellation(&self) -> bool {
        matches!(self, UnitError::Cancelled)
    }
}

/// Underlying cause carried by a [`ContentError`]
#[derive(Debug, Error)]
pub enum Cause {
    /// A single representative unit failure
    #[error("{0}")]
    Single(#[source] UnitError),

    /// Several kinds of failure; the first informative one is kept
    #[error("{distinct} distinct errors, first: {first}")]
    Aggregate {
        /// Number of distinct kinds of failure observed
        distinct: usize,
        /// First informative failure in index order
        #[source]
        first: UnitError,
    },
}

/// Classification of a batch that did not fully succeed
///
/// These are the only error kinds the widget layer needs to branch on:
/// [`ContentError::NoContent`] means nothing can be shown, [`ContentError::PartialContent`]
/// means the usable subset should be shown alongside a warning.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The batch produced nothing usable
    #[error("failed to retrieve any content ({failed} failed)")]
    NoContent {
        /// Number of failed units
        failed: usize,
        /// Most informative cause, if any was recorded
        #[source]
        cause: Option<Cause>,
    },

    /// The batch produced some usable results alongside failures
    #[error("failed to retrieve some of the content ({failed} failed)")]
    PartialContent {
        /// Number of failed units
        failed: usize,
        /// Most informative cause, if any was recorded
        #[source]
        cause: Option<Cause>,
    },
}

impl ContentError {
    /// Number of units that failed
    pub fn failed(&self) -> usize {
        match self {
            ContentError::NoContent { failed, .. }
            | ContentError::PartialContent { failed, .. } => *failed,
        }
    }

    /// The wrapped cause, if any
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            ContentError::NoContent { cause, .. }
            | ContentError::PartialContent { cause, .. } => cause.as_ref(),
        }
    }

    /// Returns true for [`ContentError::NoContent`]
    pub fn is_no_content(&self) -> bool {
        matches!(self, ContentError::NoContent { .. })
    }

    /// Returns true for [`ContentError::PartialContent`]
    pub fn is_partial(&self) -> bool {
        matches!(self, ContentError::PartialContent { .. })
    }
}
