//! End-to-end tests for the fetch engine through the public API
//!
//! These tests drive [`WorkerPool`] with in-process transforms and a local mock HTTP
//! server, checking the batch-level guarantees a widget relies on:
//! - outcomes stay aligned with inputs
//! - partial failures are classified, not escalated
//! - the concurrency ceiling holds
//! - cancellation and panics stay confined to their units

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use url::Url;
use widget_fetch::feed::{StockFeed, StockRequest};
use widget_fetch::{
    BatchOutcome, CancellationToken, Config, HttpClient, Job, Presentation, UnitError,
    WidgetStatus, WorkerPool, classify, fetch_json,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_units_with_two_failures_is_partial_content() {
    let job = Job::new(
        |i: usize| async move {
            if i == 1 || i == 3 {
                Err(UnitError::Transform(format!("unit {i} failed")))
            } else {
                Ok(i)
            }
        },
        0..5,
    );

    let results = WorkerPool::default().execute(job).await.unwrap();

    let failed: Vec<bool> = results.errors().map(|e| e.is_some()).collect();
    assert_eq!(failed, vec![false, true, false, true, false]);
    assert_eq!(results.outcome(), BatchOutcome::PartiallyFailed { failed: 2 });

    let classified = classify(results);
    assert_eq!(classified.items, vec![0, 2, 4]);
    let error = classified.error.unwrap();
    assert!(error.is_partial());
    assert_eq!(error.failed(), 2);

    let mut status = WidgetStatus::new();
    assert!(status.record(Some(&error)));
    assert!(matches!(status.presentation(), Presentation::Degraded { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_unit_failing_is_no_content_and_unavailable() {
    let job = Job::new(
        |_: usize| async move { Err::<usize, _>(UnitError::Transform("source down".into())) },
        0..4,
    );

    let classified = classify(WorkerPool::default().execute(job).await.unwrap());

    assert!(classified.items.is_empty());
    let error = classified.error.unwrap();
    assert!(error.is_no_content());
    assert_eq!(error.failed(), 4);

    let mut status = WidgetStatus::new();
    assert!(!status.record(Some(&error)));
    assert!(matches!(
        status.presentation(),
        Presentation::Unavailable { stale: false, .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn alignment_holds_for_many_sizes_and_reverse_completion() {
    for units in [0usize, 1, 2, 7, 16] {
        let job = Job::new(
            move |i: usize| async move {
                tokio::time::sleep(Duration::from_millis(((units - i) * 5) as u64)).await;
                if i % 3 == 0 {
                    Err(UnitError::Transform(i.to_string()))
                } else {
                    Ok(i)
                }
            },
            0..units,
        )
        .with_workers(4);

        let results = WorkerPool::default().execute(job).await.unwrap();

        assert_eq!(results.len(), units);
        for (i, outcome) in results.iter().enumerate() {
            match outcome {
                Ok(v) => assert_eq!(*v, i),
                Err(e) => assert_eq!(e.to_string(), i.to_string()),
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ceiling_from_config_bounds_peak_concurrency() {
    let mut config = Config::default();
    config.pool.max_workers = 3;
    let pool = WorkerPool::from_config(&config.pool).unwrap();

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
    let job = Job::new(
        move |i: usize| {
            let active = Arc::clone(&a);
            let peak = Arc::clone(&p);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(15)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, UnitError>(i)
            }
        },
        0..20,
    );

    let results = pool.execute(job).await.unwrap();

    assert_eq!(results.succeeded(), 20);
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_batch_is_classified_without_losing_finished_units() {
    let job = Job::new(
        |i: usize| async move {
            if i == 0 {
                return Ok::<_, UnitError>(i);
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(i)
        },
        0..3,
    );

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let results = WorkerPool::default()
        .execute_with_cancel(job, token)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    let classified = classify(results);
    assert_eq!(classified.items, vec![0]);
    assert_eq!(classified.error.unwrap().failed(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_unit_does_not_abort_siblings() {
    let job = Job::new(
        |i: usize| async move {
            if i == 0 {
                let empty: Vec<usize> = Vec::new();
                return Ok(empty[i]);
            }
            Ok::<_, UnitError>(i)
        },
        0..4,
    );

    let results = WorkerPool::default().execute(job).await.unwrap();

    assert!(matches!(results.get(0), Some(Err(UnitError::Panicked(_)))));
    assert_eq!(results.succeeded(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_client_serves_concurrent_units() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "ok": true }))
                .set_delay(Duration::from_millis(20)),
        )
        .expect(12)
        .mount(&server)
        .await;

    let client = HttpClient::new(&Config::default().http).unwrap();
    let url = Url::parse(&format!("{}/item", server.uri())).unwrap();
    let requests = (0..12).map(|_| client.get(url.clone())).collect();

    let results = fetch_json::<serde_json::Value>(&WorkerPool::new(4), &client, requests)
        .await
        .unwrap();

    assert_eq!(results.len(), 12);
    assert_eq!(results.outcome(), BatchOutcome::AllSucceeded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stock_feed_reports_partial_content_for_one_bad_symbol() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chart/GOOD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "chart": { "result": [{
                "meta": { "symbol": "GOOD", "regularMarketPrice": 10.0 },
                "indicators": { "quote": [{ "close": [8.0, 9.0, 10.0] }] }
            }] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chart/BAD"))
        .respond_with(ResponseTemplate::new(404).set_body_string("unknown symbol"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&Config::default().http).unwrap();
    let chart_url = Url::parse(&format!("{}/chart/", server.uri())).unwrap();
    let feed = StockFeed::with_chart_url(WorkerPool::default(), client, chart_url).unwrap();

    let classified = feed
        .fetch(&[StockRequest::new("GOOD", "Good Co"), StockRequest::new("BAD", "Bad Co")])
        .await
        .unwrap();

    assert_eq!(classified.items.len(), 1);
    assert_eq!(classified.items[0].symbol, "GOOD");
    let error = classified.error.unwrap();
    assert!(error.is_partial());
    assert!(error.cause().unwrap().to_string().contains("404"));
}
