//! Error types for the papershelf library.
//!
//! This module provides a single error type that covers every failure mode of the
//! library, including:
//! - Identifier parsing
//! - Metadata extraction from API documents
//! - Network and API errors
//! - Database and filesystem operations
//! - Configuration loading
//!
//! # Examples
//!
//! ```
//! use papershelf::{errors::ShelfError, identifier::ArxivId};
//!
//! match ArxivId::parse("") {
//!   Err(ShelfError::InvalidIdentifier(raw)) => println!("Could not parse {raw:?}"),
//!   Err(e) => println!("Other error: {e}"),
//!   Ok(id) => println!("Parsed {id}"),
//! }
//! ```

use thiserror::Error;

/// Result type alias used throughout the [`papershelf`](crate) crate.
pub type Result<T> = core::result::Result<T, ShelfError>;

/// Errors that can occur when working with the papershelf library.
///
/// Parsing and extraction errors are returned as values so that batch callers can
/// count a failed item and move on to the next one. Store and filesystem errors are
/// propagated from the [`Database`](crate::database::Database) and
/// [`Library`](crate::library::Library) layers and are converted into booleans at the
/// reconciliation boundary.
#[derive(Error, Debug)]
pub enum ShelfError {
  /// The identifier was empty or reduced to nothing once separators were removed.
  ///
  /// The string parameter holds the raw input for debugging.
  #[error("Invalid identifier: {0:?}")]
  InvalidIdentifier(String),

  /// A metadata document carried no usable `<id>` element.
  #[error("Metadata document has no paper identifier")]
  MissingIdentifier,

  /// A metadata document could not be parsed at all.
  ///
  /// This covers malformed XML as well as structurally broken feeds.
  #[error("Malformed metadata document: {0}")]
  MalformedDocument(String),

  /// A network request failed.
  ///
  /// This can occur when:
  /// - The network is unavailable
  /// - The server is unreachable
  /// - The request times out
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// The requested paper couldn't be found.
  #[error("Paper not found")]
  NotFound,

  /// The remote API answered with an error status.
  #[error("API error: {0}")]
  ApiError(String),

  /// Failed to parse a URL.
  #[error(transparent)]
  InvalidUrl(#[from] url::ParseError),

  /// A SQLite operation failed.
  #[error(transparent)]
  Sqlite(#[from] rusqlite::Error),

  /// An async SQLite operation failed.
  #[error(transparent)]
  AsyncSqlite(#[from] tokio_rusqlite::Error),

  /// A file system operation failed.
  #[error(transparent)]
  Path(#[from] std::io::Error),

  /// The configuration is inconsistent.
  #[error("Configuration error: {0}")]
  Config(String),

  /// The configuration file is not valid TOML for [`Config`](crate::config::Config).
  #[error(transparent)]
  Toml(#[from] toml::de::Error),
}

impl ShelfError {
  /// Checks if this error comes from the record store.
  ///
  /// Store errors never abort a batch; the reconciliation layer logs them and treats
  /// the affected paper as not yet downloaded.
  pub fn is_store_error(&self) -> bool {
    matches!(self, ShelfError::Sqlite(_) | ShelfError::AsyncSqlite(_))
  }

  /// Checks if this error is a per-document extraction failure.
  pub fn is_extraction_error(&self) -> bool {
    matches!(self, ShelfError::MissingIdentifier | ShelfError::MalformedDocument(_))
  }
}
