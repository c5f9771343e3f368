//! Extraction of normalized paper metadata from a [`MetadataDocument`].
//!
//! Extraction never fails on missing optional fields. Defaults are filled in instead:
//!
//! | Field            | Default                                      |
//! |------------------|----------------------------------------------|
//! | title            | `"Unknown Title"`                            |
//! | author name      | `"Unknown"`                                  |
//! | affiliation      | `"No affiliation"`                           |
//! | primary category | first `<category>` term, else empty          |
//! | pdf url          | first link titled `pdf` or typed as PDF      |
//!
//! Only a missing `<id>` is fatal, reported as [`ShelfError::MissingIdentifier`] so a batch
//! can count the failure and move on.

use super::*;
use crate::{
  feed::{Link, MetadataDocument},
  identifier::{extract_identifier, ArxivId},
  key::{SimplifiedId, StorageKey},
};

/// Title used when a document has none.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Author name used when an `<author>` has no `<name>`.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Affiliation used when an `<author>` has none.
pub const NO_AFFILIATION: &str = "No affiliation";

/// Normalized metadata for one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
  /// Identifier as it appears in the document, e.g. `cond-mat/0102536v1`
  pub paper_id:                 String,
  /// The raw `<id>` content, usually the abstract page URL
  pub source_url:               String,
  /// Parsed identifier, category as written in the identifier itself
  pub arxiv_id:                 ArxivId,
  /// Category-free identifier
  pub simplified_id:            SimplifiedId,
  /// Directory name in the library
  pub storage_key:              StorageKey,
  /// Paper title
  pub title:                    String,
  /// Author names in document order
  pub authors:                  Vec<String>,
  /// `"name (affiliation)"` per author
  pub authors_with_affiliation: Vec<String>,
  /// Abstract
  pub summary:                  Option<String>,
  /// Publication timestamp as written by the API
  pub published:                Option<String>,
  /// Last update timestamp as written by the API
  pub updated:                  Option<String>,
  /// DOI of the published version
  pub doi:                      Option<String>,
  /// Journal reference
  pub journal_ref:              Option<String>,
  /// Author comment
  pub comment:                  Option<String>,
  /// Primary category, empty when the document has no category at all
  pub primary_category:         String,
  /// Every category term
  pub categories:               Vec<String>,
  /// Every link
  pub links:                    Vec<Link>,
  /// Where to download the PDF from
  pub pdf_url:                  Option<String>,
}

impl MetadataRecord {
  /// The primary category, or `None` when empty.
  pub fn category(&self) -> Option<&str> {
    Some(self.primary_category.as_str()).filter(|c| !c.is_empty())
  }

  /// Author names joined for storage and display.
  pub fn authors_joined(&self) -> String { self.authors.join(", ") }
}

impl TryFrom<&MetadataDocument> for MetadataRecord {
  type Error = ShelfError;

  fn try_from(doc: &MetadataDocument) -> Result<Self> { extract(doc) }
}

/// Extracts a [`MetadataRecord`] from one document.
///
/// # Errors
///
/// - [`ShelfError::MissingIdentifier`] if the document has no `<id>`
/// - [`ShelfError::InvalidIdentifier`] if the `<id>` holds no usable identifier
///
/// # Examples
///
/// ```
/// use papershelf::{feed::MetadataDocument, metadata::extract};
///
/// let doc = MetadataDocument {
///   id: Some("http://arxiv.org/abs/2101.00001v2".into()),
///   ..Default::default()
/// };
/// let record = extract(&doc).unwrap();
/// assert_eq!(record.paper_id, "2101.00001v2");
/// assert_eq!(record.title, "Unknown Title");
/// ```
pub fn extract(doc: &MetadataDocument) -> Result<MetadataRecord> {
  let source_url = doc.id.as_deref().map(str::trim).filter(|id| !id.is_empty());
  let Some(source_url) = source_url else {
    return Err(ShelfError::MissingIdentifier);
  };

  let paper_id = extract_identifier(source_url);
  let primary_category = doc
    .primary_category
    .clone()
    .or_else(|| doc.categories.first().cloned())
    .unwrap_or_default();

  let arxiv_id = ArxivId::parse(&paper_id)?;
  let simplified_id = arxiv_id.simplified();
  let storage_key = simplified_id.storage_key();

  let (authors, authors_with_affiliation): (Vec<String>, Vec<String>) = doc
    .authors
    .iter()
    .map(|author| {
      let name = author.name.clone().unwrap_or_else(|| UNKNOWN_AUTHOR.to_owned());
      let affiliation = author.affiliation.as_deref().unwrap_or(NO_AFFILIATION);
      let detailed = format!("{name} ({affiliation})");
      (name, detailed)
    })
    .unzip();

  let pdf_url = doc.links.iter().find(|link| link.is_pdf()).map(|link| link.href.clone());

  debug!("Extracted metadata for {paper_id} (storage key {storage_key})");

  Ok(MetadataRecord {
    paper_id,
    source_url: source_url.to_owned(),
    arxiv_id,
    simplified_id,
    storage_key,
    title: doc.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_owned()),
    authors,
    authors_with_affiliation,
    summary: doc.summary.clone(),
    published: doc.published.clone(),
    updated: doc.updated.clone(),
    doi: doc.doi.clone(),
    journal_ref: doc.journal_ref.clone(),
    comment: doc.comment.clone(),
    primary_category,
    categories: doc.categories.clone(),
    links: doc.links.clone(),
    pdf_url,
  })
}
