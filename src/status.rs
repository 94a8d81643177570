//! Widget-side handling of a refresh result.
//!
//! A widget records the classification of every refresh in its [`WidgetStatus`] and asks
//! it how to present itself. NoContent is always shown as unavailable; data from an
//! earlier refresh is kept by the widget and flagged as stale. PartialContent shows the
//! new data with a notice.

use chrono::{DateTime, Utc};

use crate::classify::Classified;
use crate::error::ContentError;

/// How a widget should render after its latest refresh
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Presentation {
    /// Show the content as is
    Full,
    /// Show the content with a warning
    Degraded {
        /// Warning shown next to the content
        notice: String,
    },
    /// The latest refresh produced nothing; render the error
    Unavailable {
        /// Error shown in place of the content
        error: String,
        /// Data from an earlier refresh is still held and may be shown as outdated
        stale: bool,
    },
}

/// Refresh state of a single widget
#[derive(Clone, Debug, Default)]
pub struct WidgetStatus {
    content_available: bool,
    error: Option<String>,
    notice: Option<String>,
    last_success: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

impl WidgetStatus {
    /// Status of a widget that has not been refreshed yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the classification error of a refresh
    ///
    /// Returns true if the refresh produced data the widget should use, i.e. on full
    /// success and on PartialContent. On NoContent the widget must keep its old data,
    /// which [`WidgetStatus::presentation`] then reports as stale.
    pub fn record(&mut self, error: Option<&ContentError>) -> bool {
        match error {
            None => {
                self.error = None;
                self.notice = None;
                self.content_available = true;
                self.last_success = Some(Utc::now());
                self.consecutive_failures = 0;
                true
            }
            Some(e) if e.is_partial() => {
                self.error = None;
                self.notice = Some(describe(e));
                self.content_available = true;
                self.last_success = Some(Utc::now());
                self.consecutive_failures += 1;
                tracing::warn!(failed = e.failed(), "Widget updated with partial content");
                true
            }
            Some(e) => {
                self.error = Some(describe(e));
                self.notice = None;
                self.consecutive_failures += 1;
                tracing::error!(
                    failed = e.failed(),
                    stale_content = self.content_available,
                    "Widget update produced no content"
                );
                false
            }
        }
    }

    /// Record the outcome of a classified batch, see [`WidgetStatus::record`]
    pub fn record_classified<T>(&mut self, classified: &Classified<T>) -> bool {
        self.record(classified.error.as_ref())
    }

    /// How the widget should render right now
    pub fn presentation(&self) -> Presentation {
        match (&self.error, &self.notice) {
            (Some(error), _) => Presentation::Unavailable {
                error: error.clone(),
                stale: self.content_available,
            },
            (None, Some(notice)) => Presentation::Degraded {
                notice: notice.clone(),
            },
            (None, None) if !self.content_available => Presentation::Unavailable {
                error: "no content yet".to_string(),
                stale: false,
            },
            (None, None) => Presentation::Full,
        }
    }

    /// Returns true once any refresh has produced data
    pub fn content_available(&self) -> bool {
        self.content_available
    }

    /// Error of the latest refresh, if it produced nothing
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Notice of the latest refresh, if it was partial
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Time of the latest refresh that produced data
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// Number of refreshes in a row that were not fully successful
    ///
    /// A refresh scheduler can use this to retry degraded widgets earlier.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Render an error with its cause, e.g.
/// "failed to retrieve some of the content (2 failed): timeout".
fn describe(error: &ContentError) -> String {
    match error.cause() {
        Some(cause) => format!("{error}: {cause}"),
        None => error.to_string(),
    }
}
