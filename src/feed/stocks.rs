//! Stock quotes from a Yahoo-style chart API.
//!
//! One request per symbol. A symbol fails either at the transport level (network,
//! status, decode) or at the domain level when the response holds no chart data; both
//! count toward the failure count of the resulting [`ContentError`](crate::error::ContentError).

use serde::Deserialize;
use url::Url;

use crate::classify::{Classified, classify_map};
use crate::error::{Error, Result, UnitError};
use crate::http::{DecodeJson, HttpClient};
use crate::job::Job;
use crate::pool::WorkerPool;

/// Default chart endpoint; the symbol is appended as the last path segment
pub const DEFAULT_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";

/// Number of daily closes kept per stock
pub const STOCK_CHART_DAYS: usize = 21;

/// A stock the widget wants to show
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockRequest {
    /// Ticker symbol sent to the API
    pub symbol: String,
    /// Display name
    pub name: String,
}

impl StockRequest {
    /// Create a request for `symbol` shown as `name`
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

/// A fetched quote
#[derive(Clone, Debug, PartialEq)]
pub struct Stock {
    /// Display name from the request
    pub name: String,
    /// Symbol as reported by the API
    pub symbol: String,
    /// Current market price
    pub price: f64,
    /// Change against the previous close, in percent
    pub percent_change: f64,
    /// Recent daily closes, oldest first, missing days removed
    pub closes: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    regular_market_price: f64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Fetches quotes for many symbols through the shared pool and client
#[derive(Clone, Debug)]
pub struct StockFeed {
    pool: WorkerPool,
    client: HttpClient,
    chart_url: Url,
}

impl StockFeed {
    /// Create a feed against [`DEFAULT_CHART_URL`]
    ///
    /// # Errors
    /// Never fails for the built-in URL; the signature matches [`StockFeed::with_chart_url`]
    pub fn new(pool: WorkerPool, client: HttpClient) -> Result<Self> {
        let chart_url = Url::parse(DEFAULT_CHART_URL).map_err(|e| Error::Config {
            message: format!("invalid chart URL: {e}"),
            key: Some("stocks.chart_url".to_string()),
        })?;
        Self::with_chart_url(pool, client, chart_url)
    }

    /// Create a feed against a custom chart endpoint
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `chart_url` cannot have path segments appended
    pub fn with_chart_url(pool: WorkerPool, client: HttpClient, chart_url: Url) -> Result<Self> {
        if chart_url.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("chart URL {chart_url} cannot be used as a base"),
                key: Some("stocks.chart_url".to_string()),
            });
        }
        Ok(Self {
            pool,
            client,
            chart_url,
        })
    }

    /// Fetch quotes for `requests`, in request order
    ///
    /// # Errors
    /// Only whole-batch errors. Per-symbol failures are reported through
    /// [`Classified::error`] as NoContent or PartialContent.
    pub async fn fetch(&self, requests: &[StockRequest]) -> Result<Classified<Stock>> {
        let http_requests = requests
            .iter()
            .map(|r| self.chart_url_for(&r.symbol).map(|url| self.client.get(url)))
            .collect::<Result<Vec<_>>>()?;

        let job = Job::new(
            DecodeJson::<ChartResponse>::new(self.client.clone()),
            http_requests,
        );
        let results = self.pool.execute(job).await?;

        // Panics are already reported at error level by the pool
        for (request, error) in requests.iter().zip(results.errors()) {
            if let Some(e) = error.filter(|e| !matches!(e, UnitError::Panicked(_))) {
                tracing::error!(symbol = %request.symbol, error = %e, "Failed to fetch stock data");
            }
        }

        Ok(classify_map(results, |index, response| {
            let request = &requests[index];
            to_stock(request, response).ok_or_else(|| {
                tracing::error!(symbol = %request.symbol, "Stock response contains no data");
                UnitError::Transform("stock response contains no data".to_string())
            })
        }))
    }

    fn chart_url_for(&self, symbol: &str) -> Result<Url> {
        let mut url = self.chart_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config {
                message: format!("chart URL {} cannot be used as a base", self.chart_url),
                key: Some("stocks.chart_url".to_string()),
            })?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("range", "1mo")
            .append_pair("interval", "1d");
        Ok(url)
    }
}

/// Map a decoded chart to a [`Stock`], `None` if the chart holds no data.
fn to_stock(request: &StockRequest, response: ChartResponse) -> Option<Stock> {
    let result = response.chart.result?.into_iter().next()?;

    let mut closes: Vec<f64> = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|series| series.close.into_iter().map(|c| c.unwrap_or(0.0)).collect())
        .unwrap_or_default();

    if closes.len() > STOCK_CHART_DAYS {
        closes.drain(..closes.len() - STOCK_CHART_DAYS);
    }

    let price = result.meta.regular_market_price;
    let previous = match closes.len() {
        n if n >= 2 && closes[n - 2] != 0.0 => closes[n - 2],
        _ => price,
    };

    closes.retain(|c| *c != 0.0);

    Some(Stock {
        name: request.name.clone(),
        symbol: result.meta.symbol,
        price,
        percent_change: percent_change(price, previous),
        closes,
    })
}

/// Change from `previous` to `current`, in percent.
fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current / previous - 1.0) * 100.0
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::error::Cause;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chart(symbol: &str, price: f64, closes: &[Option<f64>]) -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "meta": { "symbol": symbol, "regularMarketPrice": price },
                    "indicators": { "quote": [{ "close": closes }] }
                }]
            }
        })
    }

    async fn feed(server: &MockServer) -> StockFeed {
        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let chart_url = Url::parse(&format!("{}/v8/finance/chart/", server.uri())).unwrap();
        StockFeed::with_chart_url(WorkerPool::new(4), client, chart_url).unwrap()
    }

    #[test]
    fn percent_change_uses_previous_close() {
        assert!((percent_change(110.0, 100.0) - 10.0).abs() < 1e-9);
        assert!((percent_change(90.0, 100.0) + 10.0).abs() < 1e-9);
        assert_eq!(percent_change(5.0, 0.0), 0.0);
    }

    #[test]
    fn to_stock_trims_history_and_skips_missing_days() {
        let mut closes: Vec<Option<f64>> = (1..=30).map(|d| Some(d as f64)).collect();
        closes[25] = None;
        let response: ChartResponse =
            serde_json::from_value(chart("MSFT", 31.0, &closes)).unwrap();

        let stock = to_stock(&StockRequest::new("MSFT", "Microsoft"), response).unwrap();

        assert_eq!(stock.name, "Microsoft");
        assert_eq!(stock.symbol, "MSFT");
        // 21 most recent days, minus the missing one
        assert_eq!(stock.closes.len(), STOCK_CHART_DAYS - 1);
        assert_eq!(stock.closes.first().copied(), Some(10.0));
        // previous close is day 29
        assert!((stock.percent_change - (31.0 / 29.0 - 1.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn to_stock_falls_back_to_price_without_history() {
        let response: ChartResponse = serde_json::from_value(chart("X", 12.0, &[])).unwrap();
        let stock = to_stock(&StockRequest::new("X", "X Corp"), response).unwrap();
        assert_eq!(stock.percent_change, 0.0);
        assert!(stock.closes.is_empty());
    }

    #[test]
    fn to_stock_rejects_empty_result() {
        let response: ChartResponse =
            serde_json::from_value(json!({ "chart": { "result": [] } })).unwrap();
        assert!(to_stock(&StockRequest::new("X", "X"), response).is_none());

        let response: ChartResponse =
            serde_json::from_value(json!({ "chart": { "result": null } })).unwrap();
        assert!(to_stock(&StockRequest::new("X", "X"), response).is_none());
    }

    #[test]
    fn chart_url_appends_symbol_and_range() {
        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let feed = StockFeed::new(WorkerPool::default(), client).unwrap();

        let url = feed.chart_url_for("BRK-B").unwrap();

        assert_eq!(
            url.as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/BRK-B?range=1mo&interval=1d"
        );
    }

    #[test]
    fn non_base_chart_url_is_rejected() {
        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let result = StockFeed::with_chart_url(
            WorkerPool::default(),
            client,
            Url::parse("mailto:quotes@example.com").unwrap(),
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn transport_and_domain_failures_both_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .and(query_param("range", "1mo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart(
                "AAPL",
                200.0,
                &[Some(190.0), Some(195.0), Some(200.0)],
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/DOWN"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/EMPTY"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "chart": { "result": [] } })),
            )
            .mount(&server)
            .await;

        let requests = vec![
            StockRequest::new("AAPL", "Apple"),
            StockRequest::new("DOWN", "Down Inc"),
            StockRequest::new("EMPTY", "Empty Ltd"),
        ];
        let classified = feed(&server).await.fetch(&requests).await.unwrap();

        assert_eq!(classified.items.len(), 1);
        assert_eq!(classified.items[0].name, "Apple");
        assert!((classified.items[0].percent_change - (200.0 / 195.0 - 1.0) * 100.0).abs() < 1e-9);

        let error = classified.error.unwrap();
        assert!(error.is_partial());
        assert_eq!(error.failed(), 2);
    }

    #[tokio::test]
    async fn every_symbol_failing_the_same_way_is_no_content_with_one_cause() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let requests = vec![
            StockRequest::new("A", "A"),
            StockRequest::new("B", "B"),
            StockRequest::new("C", "C"),
        ];
        let classified = feed(&server).await.fetch(&requests).await.unwrap();

        assert!(classified.items.is_empty());
        let error = classified.error.unwrap();
        assert!(error.is_no_content());
        assert_eq!(error.failed(), 3);
        // Same outage for every symbol reads as one cause, not one per URL
        assert!(matches!(
            error.cause(),
            Some(Cause::Single(UnitError::Status { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn no_symbols_is_complete_and_empty() {
        let server = MockServer::start().await;
        let classified = feed(&server).await.fetch(&[]).await.unwrap();
        assert!(classified.is_complete());
        assert!(!classified.has_content());
    }
}
