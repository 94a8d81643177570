//! Feeds built on the fetch engine.
//!
//! Each feed turns widget-level requests into a [`Job`](crate::job::Job), runs it on a
//! [`WorkerPool`](crate::pool::WorkerPool) and classifies the outcome.

pub mod stocks;

pub use stocks::{Stock, StockFeed, StockRequest};
