//! Shared HTTP client and the JSON decode transform used by feed widgets.
//!
//! One [`HttpClient`] is built per process and cloned into every unit. Clones share
//! reqwest's connection pool, which is safe for concurrent use without extra locking.

use std::marker::PhantomData;

use reqwest::{Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::HttpConfig;
use crate::error::{Result, UnitError};
use crate::job::{Job, Transform};
use crate::pool::{BatchResults, WorkerPool};

/// Process-wide HTTP client handle
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    max_error_body: usize,
}

impl HttpClient {
    /// Build the shared client from configuration
    ///
    /// # Errors
    /// Returns an error if the underlying client cannot be created (e.g. TLS backend failure)
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            inner,
            max_error_body: config.max_error_body,
        })
    }

    /// The underlying reqwest client
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Build a GET request descriptor for `url`
    pub fn get(&self, url: Url) -> Request {
        Request::new(Method::GET, url)
    }

    /// Send `request` and decode a `200 OK` JSON body into `T`
    ///
    /// # Errors
    /// - [`UnitError::Request`] if the request fails or the body cannot be read
    /// - [`UnitError::Status`] for any status other than 200
    /// - [`UnitError::Decode`] if the body is not valid JSON for `T`
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: Request,
    ) -> std::result::Result<T, UnitError> {
        let url = request.url().to_string();
        let response = self.inner.execute(request).await?;
        let status = response.status();

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(UnitError::Status {
                status: status.as_u16(),
                url,
                body: truncate_body(&body, self.max_error_body),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| UnitError::Decode { url, source })
    }
}

/// Transform that sends a request through the shared client and decodes the JSON body
pub struct DecodeJson<T> {
    client: HttpClient,
    _output: PhantomData<fn() -> T>,
}

impl<T> DecodeJson<T> {
    /// Bind the transform to the shared client
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            _output: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<T> Transform<Request, T> for DecodeJson<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn apply(&self, request: Request) -> std::result::Result<T, UnitError> {
        self.client.send_json(request).await
    }
}

/// Fetch and decode every request with bounded concurrency
///
/// Convenience wrapper building a [`Job`] with [`DecodeJson`] and executing it on `pool`.
///
/// # Errors
/// Only whole-batch errors, see [`WorkerPool::execute`]
pub async fn fetch_json<T>(
    pool: &WorkerPool,
    client: &HttpClient,
    requests: Vec<Request>,
) -> Result<BatchResults<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let job = Job::new(DecodeJson::<T>::new(client.clone()), requests);
    pool.execute(job).await
}

/// Truncate `body` to at most `max` bytes without splitting a character.
fn truncate_body(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}
