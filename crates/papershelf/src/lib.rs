//! A library for keeping a local shelf of arXiv papers.
//!
//! `papershelf` turns the many spellings of an arXiv identifier into one canonical form,
//! derives stable storage keys from it, pulls metadata out of arXiv Atom responses, and
//! keeps a SQLite record store consistent with the files actually present in the library
//! directory.
//!
//! The pieces, bottom up:
//! - [`identifier`]: parse `cs/0303006v1`, `cs_0303006v1`, URLs and bare numbers into an
//!   [`ArxivId`](identifier::ArxivId)
//! - [`key`]: simplified identifiers and filesystem-safe storage keys
//! - [`feed`] and [`metadata`]: isolate entries from an API response and extract a
//!   [`MetadataRecord`](metadata::MetadataRecord) from each
//! - [`library`]: the on-disk layout of papers and their metadata artifacts
//! - [`database`]: the record store
//! - [`reconcile`]: keep the store honest about what is on disk
//! - [`shelf`]: batch operations tying everything to an API [`Fetcher`](clients::Fetcher)
//!
//! # Example
//! ```rust,no_run
//! use papershelf::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!   let shelf = Shelf::open(Config::load_or_default(None)?).await?;
//!
//!   let summary = shelf.download_ids(&["2301.07041", "cond-mat/0102536v1"]).await;
//!   println!("{} downloaded, {} failed", summary.succeeded, summary.failed);
//!
//!   Ok(())
//! }
//! ```

#![warn(missing_docs, clippy::missing_docs_in_private_items)]
use std::{
  path::{Path, PathBuf},
  str::FromStr,
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
#[cfg(test)] use tempfile::tempdir;
#[cfg(test)] use tracing_test::traced_test;

pub mod clients;
pub mod config;
pub mod database;
pub mod errors;
pub mod feed;
pub mod identifier;
pub mod key;
pub mod library;
pub mod metadata;
pub mod paper;
pub mod reconcile;
pub mod shelf;

use errors::{Result, ShelfError};

/// Common imports for working with a shelf.
pub mod prelude {
  pub use crate::{
    clients::{arxiv::ArxivClient, Fetcher, Query},
    config::Config,
    database::{Database, PaperStore},
    errors::ShelfError,
    feed::{Feed, MetadataDocument},
    identifier::ArxivId,
    key::{SimplifiedId, StorageKey},
    library::Library,
    metadata::MetadataRecord,
    paper::{PaperRecord, PaperStatus, SearchField},
    reconcile::Reconciler,
    shelf::{BatchSummary, ImportSummary, ProcessOutcome, RegisterSummary, Shelf, UpdateSummary},
  };
}
