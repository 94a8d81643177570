//! Aggregation policy turning batch outcomes into widget-facing content errors.
//!
//! The pool only reports what happened to each unit. What zero or partial results mean
//! for a widget is decided here, one layer up, so batches that cannot tolerate partial
//! failure can use the pool without this policy.

use std::collections::HashSet;

use crate::error::{Cause, ContentError, UnitError};
use crate::pool::BatchResults;

/// Usable results of a batch plus the classification of what was lost
#[derive(Debug)]
pub struct Classified<T> {
    /// Successful values, in input order
    pub items: Vec<T>,
    /// `None` when every unit succeeded
    pub error: Option<ContentError>,
}

impl<T> Classified<T> {
    /// Returns true if no unit failed
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Returns true if there is anything to show
    pub fn has_content(&self) -> bool {
        !self.items.is_empty()
    }
}

/// Keep the successful values of `results` and classify the failures
///
/// - every unit succeeded (or the batch was empty): all values, no error
/// - some units failed: the successful values and [`ContentError::PartialContent`]
/// - every unit failed: no values and [`ContentError::NoContent`]
pub fn classify<T>(results: BatchResults<T>) -> Classified<T> {
    classify_map(results, |_, value| Ok(value))
}

/// Like [`classify`], also letting the caller reject successful values
///
/// `map` receives the unit index and its value. Returning an error counts the unit as
/// failed, e.g. a response that decoded fine but holds no data.
pub fn classify_map<T, U, F>(results: BatchResults<T>, mut map: F) -> Classified<U>
where
    F: FnMut(usize, T) -> std::result::Result<U, UnitError>,
{
    let total = results.len();
    let mut items = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (index, outcome) in results.into_iter().enumerate() {
        match outcome.and_then(|value| map(index, value)) {
            Ok(item) => items.push(item),
            Err(e) => failures.push(e),
        }
    }

    let failed = failures.len();
    if failed == 0 {
        return Classified { items, error: None };
    }

    let cause = summarize(failures);
    let error = if items.is_empty() {
        tracing::error!(failed = failed, total = total, "Batch produced no content");
        ContentError::NoContent { failed, cause }
    } else {
        tracing::warn!(
            failed = failed,
            succeeded = items.len(),
            total = total,
            "Batch produced partial content"
        );
        ContentError::PartialContent { failed, cause }
    };

    Classified {
        items,
        error: Some(error),
    }
}

/// What went wrong with a unit, ignoring per-unit details such as the URL.
#[derive(Debug, PartialEq, Eq, Hash)]
enum FailureKind<'a> {
    Request(&'static str),
    Status(u16),
    Decode,
    Transform(&'a str),
    TimedOut,
    Panicked,
    Cancelled,
}

impl<'a> From<&'a UnitError> for FailureKind<'a> {
    fn from(error: &'a UnitError) -> Self {
        match error {
            UnitError::Request(e) => FailureKind::Request(request_kind(e)),
            UnitError::Status { status, .. } => FailureKind::Status(*status),
            UnitError::Decode { .. } => FailureKind::Decode,
            UnitError::Transform(message) => FailureKind::Transform(message),
            UnitError::TimedOut(_) => FailureKind::TimedOut,
            UnitError::Panicked(_) => FailureKind::Panicked,
            UnitError::Cancelled => FailureKind::Cancelled,
        }
    }
}

fn request_kind(error: &reqwest::Error) -> &'static str {
    if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connect"
    } else if error.is_redirect() {
        "redirect"
    } else if error.is_body() {
        "body"
    } else if error.is_decode() {
        "decode"
    } else if error.is_request() {
        "request"
    } else {
        "other"
    }
}

/// Pick the most informative failure, noting how many distinct kinds of failure there were.
///
/// Cancellations say little about why a source is broken, so the first failure that
/// is not a cancellation wins when there is one.
fn summarize(failures: Vec<UnitError>) -> Option<Cause> {
    let distinct = failures
        .iter()
        .map(FailureKind::from)
        .collect::<HashSet<_>>()
        .len();

    let position = failures
        .iter()
        .position(|e| !e.is_cancellation())
        .unwrap_or(0);
    let first = failures.into_iter().nth(position)?;

    if distinct <= 1 {
        Some(Cause::Single(first))
    } else {
        Some(Cause::Aggregate { distinct, first })
    }
}
