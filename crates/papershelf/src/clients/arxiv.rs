//! Client implementation for the arXiv API.
//!
//! The client talks to arXiv's Atom query endpoint (`http://export.arxiv.org/api/query`),
//! returning response bodies untouched so that [`Feed`](crate::feed::Feed) can parse them.
//! Failed queries are retried a configurable number of times with a fixed pause in between.
//!
//! # Examples
//!
//! ```no_run
//! use papershelf::{
//!   clients::{ArxivClient, Query},
//!   feed::Feed,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArxivClient::new();
//! let xml = client.search(&Query::ids(["2301.07041"]), 0, 1).await?;
//! let feed = Feed::from_xml(&xml)?;
//! println!("{} entries", feed.entries.len());
//! # Ok(())
//! # }
//! ```

use url::Url;

use super::*;
use crate::config::Config;

/// Default arXiv API endpoint.
pub const DEFAULT_API_URL: &str = "http://export.arxiv.org/api/query";

/// Client for interacting with the arXiv API.
#[derive(Debug, Clone)]
pub struct ArxivClient {
  /// Internal web client used to connect to the API.
  client:      reqwest::Client,
  /// Query endpoint
  base_url:    String,
  /// Attempts after the first failed one
  retry_count: u32,
  /// Pause between attempts
  retry_delay: Duration,
}

impl ArxivClient {
  /// Creates a client for the public arXiv endpoint with three retries, three seconds apart.
  pub fn new() -> Self { Self::with_settings(DEFAULT_API_URL, 3, Duration::from_secs(3)) }

  /// Creates a client using the endpoint and retry settings of `config`.
  pub fn from_config(config: &Config) -> Self {
    Self::with_settings(&config.api_base_url, config.retry_count, config.retry_delay())
  }

  /// Creates a client with explicit settings.
  pub fn with_settings(base_url: &str, retry_count: u32, retry_delay: Duration) -> Self {
    let client = reqwest::Client::builder()
      .user_agent(concat!("papershelf/", env!("CARGO_PKG_VERSION")))
      .build()
      .unwrap_or_else(|_| reqwest::Client::new());
    Self { client, base_url: base_url.to_owned(), retry_count, retry_delay }
  }

  /// Builds the request URL for `query`.
  ///
  /// ```
  /// use papershelf::clients::{ArxivClient, Query};
  ///
  /// let url = ArxivClient::new().query_url(&Query::search("all:electron"), 0, 5).unwrap();
  /// assert_eq!(
  ///   url.as_str(),
  ///   "http://export.arxiv.org/api/query?search_query=all%3Aelectron&start=0&max_results=5"
  /// );
  /// ```
  pub fn query_url(&self, query: &Query, start: usize, max_results: usize) -> Result<Url> {
    let mut url = Url::parse(&self.base_url)?;
    {
      let mut pairs = url.query_pairs_mut();
      match query {
        Query::Search(expression) => pairs.append_pair("search_query", expression),
        Query::Ids(ids) => pairs.append_pair("id_list", &ids.join(",")),
      };
      pairs
        .append_pair("start", &start.to_string())
        .append_pair("max_results", &max_results.to_string());
    }
    Ok(url)
  }

  /// Runs one query and returns the response body.
  ///
  /// # Errors
  ///
  /// - [`ShelfError::Network`] if the request fails
  /// - [`ShelfError::ApiError`] if arXiv answers with an error status
  pub async fn search(&self, query: &Query, start: usize, max_results: usize) -> Result<String> {
    let url = self.query_url(query, start, max_results)?;
    debug!("Fetching from arXiv via: {url}");

    let response = self.client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(ShelfError::ApiError(format!("arXiv answered {status} for {query}")));
    }

    let body = response.text().await?;
    trace!("arXiv response: {body}");
    Ok(body)
  }

  /// Runs a query, retrying failed attempts.
  pub async fn search_with_retry(&self, query: &Query, max_results: usize) -> Result<String> {
    let mut attempt = 0;
    loop {
      match self.search(query, 0, max_results).await {
        Ok(body) => return Ok(body),
        Err(e) if attempt < self.retry_count => {
          attempt += 1;
          warn!("Query {query} failed ({e}), retry {attempt}/{}", self.retry_count);
          tokio::time::sleep(self.retry_delay).await;
        },
        Err(e) => return Err(e),
      }
    }
  }

  /// Downloads a PDF.
  pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
    let response = self.client.get(url).send().await?;
    trace!("{url} response: {response:?}");
    let status = response.status();
    if !status.is_success() {
      return Err(ShelfError::ApiError(format!("download of {url} answered {status}")));
    }
    Ok(response.bytes().await?.to_vec())
  }
}

impl Default for ArxivClient {
  fn default() -> Self { Self::new() }
}

#[async_trait]
impl Fetcher for ArxivClient {
  async fn fetch(&self, query: &Query, max_results: usize) -> Result<String> {
    self.search_with_retry(query, max_results).await
  }

  async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> { self.download(url).await }
}
