//! Paper records as kept by the record store.
//!
//! A [`PaperRecord`] is keyed by the full identifier string of a paper and carries the
//! canonical parts derived from it, display fields and two status flags tracking whether
//! metadata and PDF have been materialized in the [`Library`](crate::library::Library).
//!
//! # Examples
//!
//! ```
//! use papershelf::paper::{PaperRecord, PaperStatus};
//!
//! let record = PaperRecord::new("cond-mat/0102536v1", None).unwrap();
//! assert_eq!(record.category.as_deref(), Some("cond-mat"));
//! assert_eq!(record.id_number, "0102536");
//! assert_eq!(record.directory, "0102536v1");
//! assert_eq!(record.status(), PaperStatus::Missing);
//! ```

use std::fmt;

use super::*;
use crate::{identifier::ArxivId, key::StorageKey};

/// A paper known to the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
  /// Full identifier, the primary key
  pub paper_id:      String,
  /// Category, possibly overridden by the metadata document
  pub category:      Option<String>,
  /// Numeric part of the identifier
  pub id_number:     String,
  /// Version digits
  pub version:       String,
  /// Display title
  pub title:         String,
  /// Authors joined into one string
  pub authors:       String,
  /// When the record was last written
  pub downloaded_at: DateTime<Utc>,
  /// Storage key naming the paper's directory
  pub directory:     String,
  /// Metadata artifacts are present
  pub has_metadata:  bool,
  /// The PDF is present
  pub has_pdf:       bool,
}

impl PaperRecord {
  /// Creates an empty record for `paper_id`, deriving the canonical parts from it.
  ///
  /// A `category` override replaces the category parsed from the identifier.
  pub fn new(paper_id: &str, category: Option<&str>) -> Result<Self> {
    let id = ArxivId::parse(paper_id)?;
    let id = match category {
      Some(category) => id.with_category(Some(category.to_owned())),
      None => id,
    };

    Ok(Self {
      paper_id:      paper_id.to_owned(),
      category:      id.category().map(str::to_owned),
      id_number:     id.id_number().to_owned(),
      version:       id.version().to_owned(),
      title:         String::new(),
      authors:       String::new(),
      downloaded_at: Utc::now(),
      directory:     id.storage_key().as_str().to_owned(),
      has_metadata:  false,
      has_pdf:       false,
    })
  }

  /// The storage key recorded for this paper.
  pub fn storage_key(&self) -> StorageKey { StorageKey::sanitize(&self.directory) }

  /// Status derived from the two flags.
  pub fn status(&self) -> PaperStatus { PaperStatus::from_flags(self.has_metadata, self.has_pdf) }
}

/// How much of a paper has been materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaperStatus {
  /// Metadata and PDF
  Complete,
  /// Metadata without a PDF
  MetadataOnly,
  /// A PDF without metadata
  PdfOnly,
  /// Neither
  Missing,
}

impl PaperStatus {
  /// Maps the two status flags to a status.
  pub fn from_flags(has_metadata: bool, has_pdf: bool) -> Self {
    match (has_metadata, has_pdf) {
      (true, true) => PaperStatus::Complete,
      (true, false) => PaperStatus::MetadataOnly,
      (false, true) => PaperStatus::PdfOnly,
      (false, false) => PaperStatus::Missing,
    }
  }
}

impl fmt::Display for PaperStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PaperStatus::Complete => write!(f, "complete"),
      PaperStatus::MetadataOnly => write!(f, "metadata only"),
      PaperStatus::PdfOnly => write!(f, "pdf only"),
      PaperStatus::Missing => write!(f, "missing"),
    }
  }
}

/// Field restriction for record searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchField {
  /// Match against the title
  Title,
  /// Match against the authors string
  Authors,
  /// Match against the category
  Category,
  /// Match against the full identifier or the id number
  Id,
}

impl fmt::Display for SearchField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SearchField::Title => write!(f, "title"),
      SearchField::Authors => write!(f, "authors"),
      SearchField::Category => write!(f, "category"),
      SearchField::Id => write!(f, "id"),
    }
  }
}

impl FromStr for SearchField {
  type Err = ShelfError;

  fn from_str(s: &str) -> Result<Self> {
    match &s.to_lowercase() as &str {
      "title" => Ok(SearchField::Title),
      "authors" | "author" => Ok(SearchField::Authors),
      "category" => Ok(SearchField::Category),
      "id" => Ok(SearchField::Id),
      s => Err(ShelfError::Config(format!("unknown search field {s:?}"))),
    }
  }
}
