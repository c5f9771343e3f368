//! Access to the remote bibliographic API.
//!
//! The rest of the crate only sees the [`Fetcher`] trait: a query goes in, the raw Atom
//! response comes out, and PDF URLs resolve to bytes. [`arxiv::ArxivClient`] is the
//! production implementation; tests substitute canned responses.
//!
//! # Examples
//!
//! ```no_run
//! use papershelf::clients::{arxiv::ArxivClient, Fetcher, Query};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ArxivClient::new();
//! let xml = client.fetch(&Query::search("all:electron"), 5).await?;
//! let same_paper = client.fetch(&Query::ids(["cond-mat/0102536v1"]), 1).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

pub mod arxiv;

pub use arxiv::ArxivClient;

use super::*;

/// A query against the API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Query {
  /// Free-form search expression, e.g. `ti:quantum AND au:smith`
  Search(String),
  /// Exact identifiers; without a version the API answers with the latest one
  Ids(Vec<String>),
}

impl Query {
  /// A free-form search.
  pub fn search(expression: impl Into<String>) -> Self { Query::Search(expression.into()) }

  /// A lookup of exact identifiers.
  pub fn ids<I, T>(ids: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>, {
    Query::Ids(ids.into_iter().map(Into::into).collect())
  }
}

impl fmt::Display for Query {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Query::Search(expression) => write!(f, "search {expression:?}"),
      Query::Ids(ids) => write!(f, "ids [{}]", ids.join(", ")),
    }
  }
}

/// Transport to the metadata API and the PDF host.
#[async_trait]
pub trait Fetcher: Send + Sync {
  /// Runs `query` and returns the raw Atom response, at most `max_results` entries.
  async fn fetch(&self, query: &Query, max_results: usize) -> Result<String>;

  /// Downloads the content behind `url`.
  async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}
