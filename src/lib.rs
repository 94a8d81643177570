//! # widget-fetch
//!
//! Bounded-concurrency batch fetch engine for dashboard widgets.
//!
//! ## Design Philosophy
//!
//! widget-fetch is designed so that:
//! - **One failure never sinks a batch** - every unit reports its own outcome
//! - **Fan-out is always bounded** - a job never runs more than its worker ceiling
//! - **Order is stable** - outcomes line up with inputs, whatever order they finish in
//! - **Policy lives one layer up** - the pool is domain-agnostic, [`classify`] decides
//!   what zero or partial results mean for a widget
//!
//! ## Quick Start
//!
//! ```no_run
//! use widget_fetch::{Config, HttpClient, Job, WorkerPool, classify};
//! use widget_fetch::http::DecodeJson;
//! use url::Url;
//!
//! #[derive(serde::Deserialize)]
//! struct Post {
//!     title: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = HttpClient::new(&config.http)?;
//!     let pool = WorkerPool::from_config(&config.pool)?;
//!
//!     let requests = ["rust", "programming"]
//!         .iter()
//!         .map(|sub| Url::parse(&format!("https://www.reddit.com/r/{sub}/hot.json")))
//!         .collect::<Result<Vec<_>, _>>()?
//!         .into_iter()
//!         .map(|url| client.get(url))
//!         .collect::<Vec<_>>();
//!
//!     let job = Job::new(DecodeJson::<Post>::new(client.clone()), requests);
//!     let classified = classify(pool.execute(job).await?);
//!
//!     for post in &classified.items {
//!         println!("{}", post.title);
//!     }
//!     if let Some(e) = classified.error {
//!         eprintln!("warning: {e}");
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Aggregation policy for batch outcomes
pub mod classify;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Feeds built on the fetch engine
pub mod feed;
/// Shared HTTP client and JSON transform
pub mod http;
/// Jobs and the transform capability
pub mod job;
/// Bounded-concurrency worker pool
pub mod pool;
/// Widget refresh status
pub mod status;

// Re-export commonly used types
pub use classify::{Classified, classify, classify_map};
pub use config::{Config, HttpConfig, PoolConfig};
pub use error::{Cause, ContentError, Error, Result, UnitError};
pub use http::{DecodeJson, HttpClient, fetch_json};
pub use job::{Job, JobPolicy, Transform};
pub use pool::{BatchOutcome, BatchResults, UnitResult, WorkerPool};
pub use status::{Presentation, WidgetStatus};
pub use tokio_util::sync::CancellationToken;
