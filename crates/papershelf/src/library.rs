//! The on-disk layout of the paper library.
//!
//! Every paper owns one directory named after its [`StorageKey`]:
//!
//! ```text
//! <root>/
//!   0102536v1/
//!     metadata/
//!       id.txt  title.txt  authors.txt  summary.txt  published.txt  updated.txt
//!       doi.txt  journal_ref.txt  comment.txt  primary_category.txt  category.txt
//!       links.txt  response.xml
//!     pdf/
//!       0102536v1.pdf
//! ```
//!
//! Optional metadata fields that a paper does not have produce no artifact file.

use std::fs;

use super::*;
use crate::{identifier::looks_like_identifier, key::StorageKey, metadata::MetadataRecord};

/// Name of the per-paper metadata directory.
pub const METADATA_DIR: &str = "metadata";

/// Name of the per-paper PDF directory.
pub const PDF_DIR: &str = "pdf";

/// Raw API entry kept in the metadata directory.
pub const RESPONSE_FILE: &str = "response.xml";

/// Read-only view of the filesystem used to detect drift between the record store and disk.
pub trait FilesystemProbe {
  /// Whether `path` is a directory with at least one entry.
  fn dir_non_empty(&self, path: &Path) -> bool;

  /// Whether `path` is an existing regular file.
  fn file_exists(&self, path: &Path) -> bool;
}

/// Which artifacts of a paper are present on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
  /// The metadata directory exists and is non-empty
  pub has_metadata: bool,
  /// The expected PDF file exists
  pub has_pdf:      bool,
}

impl Artifacts {
  /// Both metadata and PDF are present.
  pub fn is_complete(&self) -> bool { self.has_metadata && self.has_pdf }
}

/// Metadata read back from the artifact files of a paper directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredMetadata {
  /// Identifier taken from `id.txt`
  pub paper_id: Option<String>,
  /// Content of `title.txt`
  pub title:    Option<String>,
  /// Author names from `authors.txt`, affiliations dropped
  pub authors:  Vec<String>,
  /// `primary_category.txt`, else the first line of `category.txt`
  pub category: Option<String>,
}

/// A library directory holding one subdirectory per paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
  /// Root directory of the library
  root: PathBuf,
}

impl Library {
  /// Creates a handle for the library rooted at `root`. Nothing is created on disk.
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  /// Root directory of the library.
  pub fn root(&self) -> &Path { &self.root }

  /// Directory owned by the paper stored under `key`.
  pub fn paper_dir(&self, key: &StorageKey) -> PathBuf { self.root.join(key.as_str()) }

  /// Metadata artifact directory for `key`.
  pub fn metadata_dir(&self, key: &StorageKey) -> PathBuf { self.paper_dir(key).join(METADATA_DIR) }

  /// PDF directory for `key`.
  pub fn pdf_dir(&self, key: &StorageKey) -> PathBuf { self.paper_dir(key).join(PDF_DIR) }

  /// The exact PDF file expected for `key`.
  pub fn pdf_path(&self, key: &StorageKey) -> PathBuf { self.pdf_dir(key).join(key.pdf_file_name()) }

  /// Observes which artifacts of `key` are on disk.
  pub fn observe(&self, key: &StorageKey) -> Artifacts {
    Artifacts {
      has_metadata: self.dir_non_empty(&self.metadata_dir(key)),
      has_pdf:      self.file_exists(&self.pdf_path(key)),
    }
  }

  /// Writes one artifact file per metadata field into the metadata directory of `key`.
  ///
  /// Returns the metadata directory.
  pub async fn write_metadata(&self, key: &StorageKey, record: &MetadataRecord) -> Result<PathBuf> {
    let dir = self.metadata_dir(key);
    tokio::fs::create_dir_all(&dir).await?;

    let links = record
      .links
      .iter()
      .map(|l| format!("title: {}, rel: {}, type: {}, href: {}", l.title, l.rel, l.kind, l.href))
      .collect::<Vec<_>>();

    let mut artifacts: Vec<(&str, String)> = vec![
      ("id.txt", record.source_url.clone()),
      ("title.txt", record.title.clone()),
      ("authors.txt", record.authors_with_affiliation.join("\n")),
      ("primary_category.txt", record.primary_category.clone()),
      ("category.txt", record.categories.join("\n")),
      ("links.txt", links.join("\n")),
    ];
    let optional = [
      ("summary.txt", &record.summary),
      ("published.txt", &record.published),
      ("updated.txt", &record.updated),
      ("doi.txt", &record.doi),
      ("journal_ref.txt", &record.journal_ref),
      ("comment.txt", &record.comment),
    ];
    artifacts.extend(optional.into_iter().filter_map(|(name, value)| Some((name, value.clone()?))));

    for (name, content) in artifacts {
      tokio::fs::write(dir.join(name), content).await?;
    }

    debug!("Wrote metadata for {} to {}", record.paper_id, dir.display());
    Ok(dir)
  }

  /// Keeps the raw API entry next to the extracted artifacts as `response.xml`.
  pub async fn write_entry_xml(&self, key: &StorageKey, xml: &str) -> Result<PathBuf> {
    let dir = self.metadata_dir(key);
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(RESPONSE_FILE);
    tokio::fs::write(&path, xml).await?;
    Ok(path)
  }

  /// Reads back the artifacts needed to register a paper directory.
  ///
  /// Missing or empty files leave the corresponding field unset.
  pub async fn read_metadata(&self, key: &StorageKey) -> Result<StoredMetadata> {
    let dir = self.metadata_dir(key);
    let read = |name: &'static str| {
      let path = dir.join(name);
      async move {
        match tokio::fs::read_to_string(&path).await {
          Ok(content) => Ok(Some(content.trim().to_owned()).filter(|c| !c.is_empty())),
          Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
          Err(e) => Err(ShelfError::Path(e)),
        }
      }
    };

    let paper_id = read("id.txt").await?.map(|id| crate::identifier::extract_identifier(&id));
    let title = read("title.txt").await?;
    let authors: Vec<String> = read("authors.txt")
      .await?
      .map(|content| content.lines().map(strip_affiliation).filter(|a| !a.is_empty()).collect())
      .unwrap_or_default();
    let category = match read("primary_category.txt").await? {
      Some(primary) => Some(primary),
      None => read("category.txt").await?.and_then(|c| c.lines().next().map(str::to_owned)),
    };

    Ok(StoredMetadata { paper_id, title, authors, category })
  }

  /// Writes PDF bytes to the expected PDF path of `key`.
  pub async fn write_pdf(&self, key: &StorageKey, bytes: &[u8]) -> Result<PathBuf> {
    let path = self.pdf_path(key);
    tokio::fs::create_dir_all(self.pdf_dir(key)).await?;
    tokio::fs::write(&path, bytes).await?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(path)
  }

  /// Copies an existing PDF into the library under `key`.
  pub async fn import_pdf(&self, key: &StorageKey, source: &Path) -> Result<PathBuf> {
    let path = self.pdf_path(key);
    tokio::fs::create_dir_all(self.pdf_dir(key)).await?;
    tokio::fs::copy(source, &path).await?;
    Ok(path)
  }

  /// Removes the directory of `key`. Returns whether anything was removed.
  pub async fn remove_paper(&self, key: &StorageKey) -> Result<bool> {
    let dir = self.paper_dir(key);
    match tokio::fs::remove_dir_all(&dir).await {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e.into()),
    }
  }

  /// Names of the subdirectories that look like paper directories, sorted.
  ///
  /// A directory qualifies when its name looks like an identifier and it holds a metadata
  /// or PDF directory. A missing library root yields an empty list.
  pub async fn paper_directories(&self) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(&self.root).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
        continue;
      };
      if path.is_dir()
        && looks_like_identifier(&name)
        && (path.join(METADATA_DIR).is_dir() || path.join(PDF_DIR).is_dir())
      {
        names.push(name);
      }
    }
    names.sort();
    Ok(names)
  }
}

impl FilesystemProbe for Library {
  fn dir_non_empty(&self, path: &Path) -> bool {
    fs::read_dir(path).map(|mut entries| entries.next().is_some()).unwrap_or(false)
  }

  fn file_exists(&self, path: &Path) -> bool { path.is_file() }
}

/// `"Name (Affiliation)"` to `"Name"`.
fn strip_affiliation(line: &str) -> String {
  let line = line.trim();
  match line.strip_suffix(')').and_then(|rest| rest.rsplit_once(" (")) {
    Some((name, _)) => name.trim().to_owned(),
    None => line.to_owned(),
  }
}
