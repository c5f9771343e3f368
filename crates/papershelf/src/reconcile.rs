//! Keeping the record store consistent with the library on disk.
//!
//! The store's `has_metadata` and `has_pdf` flags are trusted only as far as "incomplete" goes.
//! Whenever both claim success, [`Reconciler::exists`] checks the disk and corrects the flags
//! if an artifact has gone missing. Store and filesystem failures never escape this layer:
//! they are logged and reported as "not downloaded" so that callers retry the paper.
//!
//! Version resolution lives here too: [`resolve_latest_version`] picks the newest entry for
//! an id number out of an API response and [`needs_update`] compares it to what is stored.

use super::*;
use crate::{
  database::PaperStore,
  feed::MetadataDocument,
  identifier::{version_number, ArxivId},
  key::StorageKey,
  library::{Artifacts, Library},
  paper::PaperRecord,
};

/// Values written by [`Reconciler::record_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration<'a> {
  /// Full identifier, the record key
  pub paper_id:     &'a str,
  /// Display title
  pub title:        &'a str,
  /// Joined author names
  pub authors:      &'a str,
  /// Storage key of the paper directory
  pub directory:    &'a str,
  /// Metadata artifacts are present
  pub has_metadata: bool,
  /// The PDF is present
  pub has_pdf:      bool,
  /// Authoritative category replacing the one parsed from `paper_id`
  pub category:     Option<&'a str>,
}

/// Outcome of registering a paper directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDirectory {
  /// Identifier the directory was recorded under
  pub paper_id: String,
  /// Artifacts found in the directory
  pub found:    Artifacts,
  /// Whether the store accepted the record
  pub recorded: bool,
}

/// The newest version of a paper among a set of candidate entries.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestVersion<'d> {
  /// Version digits of the winning entry
  pub version: String,
  /// Parsed identifier of the winning entry
  pub id:      ArxivId,
  /// The winning entry itself
  pub entry:   &'d MetadataDocument,
}

/// Decision layer between a [`PaperStore`] and a [`Library`].
pub struct Reconciler<'a, S: ?Sized> {
  /// Record store
  store:   &'a S,
  /// On-disk library, also the filesystem probe
  library: &'a Library,
}

impl<'a, S: PaperStore + ?Sized> Reconciler<'a, S> {
  /// Creates a reconciler over `store` and `library`.
  pub fn new(store: &'a S, library: &'a Library) -> Self { Self { store, library } }

  /// Whether `paper_id` is fully downloaded, correcting drifted flags along the way.
  ///
  /// Returns `false` when the record is absent or incomplete, or when the store or disk
  /// could not be consulted.
  pub async fn exists(&self, paper_id: &str) -> bool {
    match self.check_exists(paper_id).await {
      Ok(exists) => exists,
      Err(e) if e.is_store_error() => {
        warn!("Record store unavailable while checking {paper_id}, treating it as missing: {e}");
        false
      },
      Err(e) => {
        warn!("Could not check whether {paper_id} exists, treating it as missing: {e}");
        false
      },
    }
  }

  /// [`Reconciler::exists`] with errors surfaced.
  pub async fn check_exists(&self, paper_id: &str) -> Result<bool> {
    let Some(record) = self.store.get(paper_id).await? else {
      return Ok(false);
    };
    if !(record.has_metadata && record.has_pdf) {
      return Ok(false);
    }

    let found = self.library.observe(&record.storage_key());
    if !found.is_complete() {
      info!(
        "Drift detected for {paper_id}: has_metadata={}, has_pdf={} on disk, correcting record",
        found.has_metadata, found.has_pdf
      );
      self.store.update_status(paper_id, Some(found.has_metadata), Some(found.has_pdf)).await?;
    }
    Ok(found.is_complete())
  }

  /// Inserts or updates the record of `registration.paper_id`. Returns whether it was written.
  pub async fn record_or_update(&self, registration: Registration<'_>) -> bool {
    match self.try_record_or_update(registration).await {
      Ok(()) => true,
      Err(e) => {
        warn!("Could not record {}: {e}", registration.paper_id);
        false
      },
    }
  }

  /// [`Reconciler::record_or_update`] with errors surfaced.
  pub async fn try_record_or_update(&self, registration: Registration<'_>) -> Result<()> {
    let mut record = PaperRecord::new(registration.paper_id, registration.category)?;
    record.title = registration.title.to_owned();
    record.authors = registration.authors.to_owned();
    record.directory = registration.directory.to_owned();
    record.has_metadata = registration.has_metadata;
    record.has_pdf = registration.has_pdf;

    self.store.upsert(&record).await?;
    debug!("Recorded {} as {}", record.paper_id, record.status());
    Ok(())
  }

  /// Sets the status flags that are `Some`, logging instead of failing.
  pub async fn set_status(
    &self,
    paper_id: &str,
    has_metadata: Option<bool>,
    has_pdf: Option<bool>,
  ) -> bool {
    match self.store.update_status(paper_id, has_metadata, has_pdf).await {
      Ok(changed) => changed,
      Err(e) => {
        warn!("Could not update status of {paper_id}: {e}");
        false
      },
    }
  }

  /// Registers the library directory `name` in the store.
  ///
  /// The record is keyed by the identifier in the directory's `id.txt` when present, else by
  /// the directory name. The title defaults to `"Paper: <name>"`.
  pub async fn register_directory(&self, name: &str) -> Result<RegisteredDirectory> {
    let key = StorageKey::sanitize(name);
    let found = self.library.observe(&key);
    let stored = self.library.read_metadata(&key).await?;

    let paper_id = stored.paper_id.clone().unwrap_or_else(|| name.to_owned());
    let title = stored.title.clone().unwrap_or_else(|| format!("Paper: {name}"));
    let authors = stored.authors.join(", ");

    let recorded = self
      .record_or_update(Registration {
        paper_id:     &paper_id,
        title:        &title,
        authors:      &authors,
        directory:    key.as_str(),
        has_metadata: found.has_metadata,
        has_pdf:      found.has_pdf,
        category:     stored.category.as_deref(),
      })
      .await;

    Ok(RegisteredDirectory { paper_id, found, recorded })
  }
}

/// Picks the entry with the numerically greatest version among those whose identifier has
/// exactly `id_number`. The first entry seen wins ties.
///
/// ```
/// use papershelf::{feed::MetadataDocument, reconcile::resolve_latest_version};
///
/// let entries = ["1", "10", "2"]
///   .map(|v| MetadataDocument {
///     id: Some(format!("http://arxiv.org/abs/2101.00001v{v}")),
///     ..Default::default()
///   })
///   .to_vec();
///
/// let latest = resolve_latest_version("2101.00001", &entries).unwrap();
/// assert_eq!(latest.version, "10");
/// ```
pub fn resolve_latest_version<'d>(
  id_number: &str,
  candidates: &'d [MetadataDocument],
) -> Option<LatestVersion<'d>> {
  let mut best: Option<LatestVersion<'d>> = None;
  for entry in candidates {
    let Some(id) = entry.id.as_deref().and_then(|raw| ArxivId::parse(raw).ok()) else {
      continue;
    };
    if id.id_number() != id_number {
      trace!("Ignoring candidate {id} while resolving {id_number}");
      continue;
    }
    if best.as_ref().map_or(true, |b| id.version_number() > b.id.version_number()) {
      best = Some(LatestVersion { version: id.version().to_owned(), id, entry });
    }
  }
  best
}

/// Whether `latest` is strictly newer than `stored`, both compared as integers.
///
/// An empty or non-numeric stored version counts as `0`.
pub fn needs_update(stored: &str, latest: &str) -> bool { version_number(latest) > version_number(stored) }

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{database::Database, paper::SearchField};

  /// A store whose every call fails like a locked database.
  struct BrokenStore;

  /// The error every [`BrokenStore`] call returns.
  fn locked() -> ShelfError { ShelfError::Sqlite(rusqlite::Error::InvalidQuery) }

  #[async_trait]
  impl PaperStore for BrokenStore {
    async fn get(&self, _: &str) -> Result<Option<PaperRecord>> { Err(locked()) }

    async fn upsert(&self, _: &PaperRecord) -> Result<()> { Err(locked()) }

    async fn update_status(&self, _: &str, _: Option<bool>, _: Option<bool>) -> Result<bool> {
      Err(locked())
    }

    async fn update_details(&self, _: &str, _: &str, _: &str, _: Option<&str>) -> Result<bool> {
      Err(locked())
    }

    async fn list_all(&self) -> Result<Vec<PaperRecord>> { Err(locked()) }

    async fn search(
      &self,
      _: Option<&str>,
      _: Option<SearchField>,
      _: usize,
    ) -> Result<Vec<PaperRecord>> {
      Err(locked())
    }

    async fn delete(&self, _: &str) -> Result<bool> { Err(locked()) }

    async fn missing_metadata(&self) -> Result<Vec<PaperRecord>> { Err(locked()) }

    async fn find_by_canonical(&self, _: &str, _: &str) -> Result<Vec<PaperRecord>> {
      Err(locked())
    }
  }

  /// A store and library sharing one temporary directory.
  async fn setup() -> (Database, Library, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("test.db")).await.unwrap();
    let library = Library::new(dir.path().join("library"));
    (db, library, dir)
  }

  /// Writes both artifacts for `paper_id` and records it as complete.
  async fn complete_paper(db: &Database, library: &Library, paper_id: &str) -> StorageKey {
    let key = ArxivId::parse(paper_id).unwrap().storage_key();
    std::fs::create_dir_all(library.metadata_dir(&key)).unwrap();
    std::fs::write(library.metadata_dir(&key).join("title.txt"), "T").unwrap();
    library.write_pdf(&key, b"%PDF").await.unwrap();

    let reconciler = Reconciler::new(db, library);
    assert!(
      reconciler
        .record_or_update(Registration {
          paper_id,
          title: "T",
          authors: "A",
          directory: key.as_str(),
          has_metadata: true,
          has_pdf: true,
          category: None,
        })
        .await
    );
    key
  }

  fn entry(id: &str) -> MetadataDocument {
    MetadataDocument { id: Some(format!("http://arxiv.org/abs/{id}")), ..Default::default() }
  }

  #[traced_test]
  #[tokio::test]
  async fn test_exists_for_complete_paper() {
    let (db, library, _dir) = setup().await;
    complete_paper(&db, &library, "2101.00001v1").await;
    let reconciler = Reconciler::new(&db, &library);

    assert!(reconciler.exists("2101.00001v1").await);
    assert!(reconciler.exists("2101.00001v1").await);
    assert!(!reconciler.exists("2101.00001").await);
    assert!(!logs_contain("Drift detected"));
  }

  #[tokio::test]
  async fn test_incomplete_record_skips_disk_check() {
    let (db, library, _dir) = setup().await;
    let reconciler = Reconciler::new(&db, &library);
    assert!(
      reconciler
        .record_or_update(Registration {
          paper_id:     "2101.00001",
          title:        "T",
          authors:      "",
          directory:    "2101.00001",
          has_metadata: true,
          has_pdf:      false,
          category:     None,
        })
        .await
    );

    // Artifacts on disk do not promote an incomplete record.
    let key = StorageKey::sanitize("2101.00001");
    library.write_pdf(&key, b"%PDF").await.unwrap();
    assert!(!reconciler.exists("2101.00001").await);
    assert!(!db.get("2101.00001").await.unwrap().unwrap().has_pdf);
  }

  #[traced_test]
  #[tokio::test]
  async fn test_drift_is_corrected_once() {
    let (db, library, _dir) = setup().await;
    let key = complete_paper(&db, &library, "cond-mat/0102536v1").await;
    std::fs::remove_file(library.pdf_path(&key)).unwrap();

    let reconciler = Reconciler::new(&db, &library);
    assert!(!reconciler.exists("cond-mat/0102536v1").await);

    let record = db.get("cond-mat/0102536v1").await.unwrap().unwrap();
    assert!(record.has_metadata);
    assert!(!record.has_pdf);
    assert!(logs_contain("Drift detected for cond-mat/0102536v1"));

    // No flapping and no second correction.
    assert!(!reconciler.exists("cond-mat/0102536v1").await);
    logs_assert(|lines: &[&str]| match lines.iter().filter(|l| l.contains("Drift detected")).count() {
      1 => Ok(()),
      n => Err(format!("expected one drift correction, saw {n}")),
    });
  }

  #[tokio::test]
  async fn test_drift_with_emptied_metadata_directory() {
    let (db, library, _dir) = setup().await;
    let key = complete_paper(&db, &library, "2101.00001v2").await;
    std::fs::remove_file(library.metadata_dir(&key).join("title.txt")).unwrap();

    assert!(!Reconciler::new(&db, &library).exists("2101.00001v2").await);
    let record = db.get("2101.00001v2").await.unwrap().unwrap();
    assert!(!record.has_metadata);
    assert!(record.has_pdf);
  }

  #[tokio::test]
  async fn test_record_or_update_applies_category_override() {
    let (db, library, _dir) = setup().await;
    let reconciler = Reconciler::new(&db, &library);
    let registration = Registration {
      paper_id:     "cond-mat/0102536v1",
      title:        "First",
      authors:      "",
      directory:    "0102536v1",
      has_metadata: false,
      has_pdf:      false,
      category:     Some("cond-mat.str-el"),
    };
    assert!(reconciler.record_or_update(registration).await);
    assert!(
      reconciler
        .record_or_update(Registration { title: "Second", has_pdf: true, ..registration })
        .await
    );

    let all = db.list_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Second");
    assert_eq!(all[0].category.as_deref(), Some("cond-mat.str-el"));
    assert!(all[0].has_pdf);

    assert!(!reconciler.record_or_update(Registration { paper_id: "", ..registration }).await);
  }

  #[tokio::test]
  async fn test_register_directory() {
    let (db, library, _dir) = setup().await;
    let reconciler = Reconciler::new(&db, &library);

    let key = StorageKey::sanitize("0303006v1");
    std::fs::create_dir_all(library.metadata_dir(&key)).unwrap();
    std::fs::write(library.metadata_dir(&key).join("id.txt"), "http://arxiv.org/abs/cs/0303006v1")
      .unwrap();
    std::fs::write(library.metadata_dir(&key).join("primary_category.txt"), "cs.DL").unwrap();
    library.write_pdf(&key, b"%PDF").await.unwrap();

    let registered = reconciler.register_directory("0303006v1").await.unwrap();
    assert_eq!(registered.paper_id, "cs/0303006v1");
    assert!(registered.found.is_complete());
    assert!(registered.recorded);

    let record = db.get("cs/0303006v1").await.unwrap().unwrap();
    assert_eq!(record.title, "Paper: 0303006v1");
    assert_eq!(record.category.as_deref(), Some("cs.DL"));
    assert_eq!(record.directory, "0303006v1");
  }

  #[traced_test]
  #[tokio::test]
  async fn test_store_errors_degrade_to_not_downloaded() {
    let dir = tempdir().unwrap();
    let library = Library::new(dir.path());
    let reconciler = Reconciler::new(&BrokenStore, &library);

    assert!(!reconciler.exists("2101.00001v1").await);
    assert!(logs_contain("Record store unavailable while checking 2101.00001v1"));

    let registration = Registration {
      paper_id:     "2101.00001v1",
      title:        "T",
      authors:      "",
      directory:    "2101.00001v1",
      has_metadata: true,
      has_pdf:      true,
      category:     None,
    };
    assert!(!reconciler.record_or_update(registration).await);
    assert!(reconciler.try_record_or_update(registration).await.unwrap_err().is_store_error());
    assert!(!reconciler.set_status("2101.00001v1", Some(true), None).await);
  }

  #[test]
  fn test_resolve_latest_version_compares_numerically() {
    let entries = vec![entry("2101.00001v1"), entry("2101.00001v2"), entry("2101.00001v10")];
    let latest = resolve_latest_version("2101.00001", &entries).unwrap();
    assert_eq!(latest.version, "10");
    assert!(std::ptr::eq(latest.entry, &entries[2]));
  }

  #[test]
  fn test_resolve_latest_version_filters_other_papers() {
    let entries = vec![entry("2101.000012v9"), entry("2101.00001v3"), entry("2101.00002v5")];
    let latest = resolve_latest_version("2101.00001", &entries).unwrap();
    assert_eq!(latest.version, "3");

    assert!(resolve_latest_version("9999.99999", &entries).is_none());
    assert!(resolve_latest_version("2101.00001", &[]).is_none());
    assert!(resolve_latest_version("2101.00001", &[MetadataDocument::default()]).is_none());
  }

  #[test]
  fn test_resolve_latest_version_first_seen_wins_ties() {
    let mut first = entry("2101.00001v2");
    first.title = Some("first".into());
    let mut second = entry("2101.00001v2");
    second.title = Some("second".into());
    let entries = [first, second];
    let latest = resolve_latest_version("2101.00001", &entries).unwrap();
    assert_eq!(latest.entry.title.as_deref(), Some("first"));
  }

  #[test]
  fn test_needs_update() {
    assert!(needs_update("1", "2"));
    assert!(!needs_update("2", "2"));
    assert!(needs_update("", "1"));
    assert!(needs_update("9", "10"));
    assert!(!needs_update("3", "2"));
  }
}
