//! Batch operations over a record store, a library and an API fetcher.
//!
//! A [`Shelf`] processes papers strictly one at a time. Between two remote fetches of a batch
//! it waits [`Config::request_delay`], twice as long after a failure. A failing item is
//! logged and counted in the returned summary, and the batch moves on.
//!
//! # Examples
//!
//! ```no_run
//! use papershelf::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let shelf = Shelf::open(Config::default()).await?;
//!
//! let summary = shelf.search_and_download("ti:\"electron cusp\"", 3).await?;
//! println!("{summary:?}");
//!
//! for record in shelf.find("cusp", Some(SearchField::Title), 10).await? {
//!   println!("{} [{}]", record.paper_id, record.status());
//! }
//! # Ok(())
//! # }
//! ```

use super::*;
use crate::{
  clients::{arxiv::ArxivClient, Fetcher, Query},
  config::Config,
  database::{Database, PaperStore},
  feed::{Feed, MetadataDocument},
  identifier::{extract_identifier, looks_like_identifier, ArxivId},
  key::StorageKey,
  library::Library,
  metadata::{extract, MetadataRecord},
  paper::{PaperRecord, SearchField},
  reconcile::{needs_update, resolve_latest_version, Reconciler, Registration},
};

/// Result of processing one metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessOutcome {
  /// The paper was already complete on the shelf; nothing was fetched.
  AlreadyExists {
    /// Identifier of the paper
    paper_id: String,
  },
  /// The paper was recorded and its artifacts written as far as possible.
  Downloaded {
    /// Identifier of the paper
    paper_id:     String,
    /// Directory the artifacts went to
    storage_key:  StorageKey,
    /// Metadata artifacts are on disk
    has_metadata: bool,
    /// The PDF is on disk
    has_pdf:      bool,
  },
}

/// Counters for a download batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
  /// Items in the batch
  pub total:           usize,
  /// Items processed successfully
  pub succeeded:       usize,
  /// Items skipped because they were already complete
  pub already_present: usize,
  /// Items that failed
  pub failed:          usize,
}

/// Counters for a PDF import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
  /// PDF files found
  pub total:    usize,
  /// Files copied and recorded
  pub imported: usize,
  /// Files whose name is not an identifier or whose paper is already complete
  pub skipped:  usize,
  /// Files that could not be imported
  pub failed:   usize,
}

/// Counters for an update check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
  /// Records checked
  pub total:   usize,
  /// Newer versions downloaded
  pub updated: usize,
  /// Records already at their latest version
  pub skipped: usize,
  /// Records whose check failed
  pub failed:  usize,
}

/// Counters for registering library directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSummary {
  /// Paper directories found
  pub total:         usize,
  /// Directories holding metadata
  pub with_metadata: usize,
  /// Directories holding the expected PDF
  pub with_pdf:      usize,
  /// Directories that could not be registered
  pub failed:        usize,
}

/// A paper library backed by a record store and an API.
pub struct Shelf<S = Database, F = ArxivClient> {
  /// Settings
  config:  Config,
  /// Record store
  store:   S,
  /// API transport
  fetcher: F,
  /// On-disk layout
  library: Library,
}

impl Shelf<Database, ArxivClient> {
  /// Opens the database and library named by `config` and talks to the real arXiv API.
  pub async fn open(config: Config) -> Result<Self> {
    let store = Database::open(&config.database_path).await?;
    let fetcher = ArxivClient::from_config(&config);
    Ok(Self::new(config, store, fetcher))
  }
}

impl<S: PaperStore, F: Fetcher> Shelf<S, F> {
  /// Assembles a shelf from its parts.
  pub fn new(config: Config, store: S, fetcher: F) -> Self {
    let library = Library::new(&config.library_dir);
    Self { config, store, fetcher, library }
  }

  /// Settings in use.
  pub fn config(&self) -> &Config { &self.config }

  /// The record store.
  pub fn store(&self) -> &S { &self.store }

  /// The on-disk library.
  pub fn library(&self) -> &Library { &self.library }

  /// A reconciler over this shelf's store and library.
  pub fn reconciler(&self) -> Reconciler<'_, S> { Reconciler::new(&self.store, &self.library) }

  /// Extracts, records and materializes one paper.
  ///
  /// A paper that [`Reconciler::exists`] is left alone. Otherwise a record is written
  /// first, then the metadata artifacts, then the PDF, each step updating the record's flags.
  /// Failing artifact writes only leave the corresponding flag unset.
  ///
  /// # Errors
  ///
  /// Only extraction errors are returned.
  pub async fn process_document(&self, doc: &MetadataDocument) -> Result<ProcessOutcome> {
    let record = extract(doc)?;
    let paper_id = record.paper_id.clone();
    let reconciler = self.reconciler();

    if reconciler.exists(&paper_id).await {
      info!("{paper_id} is already on the shelf");
      return Ok(ProcessOutcome::AlreadyExists { paper_id });
    }

    let key = record.storage_key.clone();
    let authors = record.authors_joined();
    reconciler
      .record_or_update(Registration {
        paper_id:     &paper_id,
        title:        &record.title,
        authors:      &authors,
        directory:    key.as_str(),
        has_metadata: false,
        has_pdf:      false,
        category:     record.category(),
      })
      .await;

    if let Err(e) = self.library.write_metadata(&key, &record).await {
      warn!("Could not write metadata of {paper_id}: {e}");
    } else if !doc.raw.is_empty() {
      if let Err(e) = self.library.write_entry_xml(&key, &doc.raw).await {
        warn!("Could not keep the API entry of {paper_id}: {e}");
      }
    }
    let has_metadata = self.library.observe(&key).has_metadata;
    reconciler.set_status(&paper_id, Some(has_metadata), None).await;

    match &record.pdf_url {
      Some(url) =>
        if let Err(e) = self.download_pdf(&key, url).await {
          warn!("Could not download the PDF of {paper_id} from {url}: {e}");
        },
      None => warn!("No PDF link for {paper_id}"),
    }
    let has_pdf = self.library.observe(&key).has_pdf;
    reconciler.set_status(&paper_id, None, Some(has_pdf)).await;

    info!("Processed {paper_id}: metadata={has_metadata}, pdf={has_pdf}");
    Ok(ProcessOutcome::Downloaded { paper_id, storage_key: key, has_metadata, has_pdf })
  }

  /// Runs a search and returns the extracted results without downloading anything.
  ///
  /// Entries that fail extraction are logged and left out.
  pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<MetadataRecord>> {
    let feed = self.fetch_feed(&Query::search(query), limit).await?;
    Ok(
      feed
        .entries
        .iter()
        .filter_map(|doc| match extract(doc) {
          Ok(record) => Some(record),
          Err(e) => {
            warn!("Skipping search result: {e}");
            None
          },
        })
        .collect(),
    )
  }

  /// Runs a search and processes every result.
  pub async fn search_and_download(&self, query: &str, limit: usize) -> Result<BatchSummary> {
    let feed = self.fetch_feed(&Query::search(query), limit).await?;
    let mut summary = BatchSummary { total: feed.entries.len(), ..Default::default() };

    for (index, doc) in feed.entries.iter().enumerate() {
      let label = doc.id.clone().unwrap_or_else(|| format!("result {}", index + 1));
      let failed = tally(&mut summary, &label, self.process_document(doc).await);
      if index + 1 < feed.entries.len() {
        self.pause(failed).await;
      }
    }
    Ok(summary)
  }

  /// Downloads papers by identifier, skipping the ones already complete.
  pub async fn download_ids<I: AsRef<str>>(&self, ids: &[I]) -> BatchSummary {
    let mut summary = BatchSummary { total: ids.len(), ..Default::default() };
    let reconciler = self.reconciler();

    for (index, raw) in ids.iter().enumerate() {
      let paper_id = extract_identifier(raw.as_ref());
      if reconciler.exists(&paper_id).await {
        info!("{paper_id} is already on the shelf");
        summary.already_present += 1;
        continue;
      }

      let failed = tally(&mut summary, &paper_id, self.download_one(&paper_id).await);
      if index + 1 < ids.len() {
        self.pause(failed).await;
      }
    }
    summary
  }

  /// [`Shelf::download_ids`] for a file holding one identifier per line.
  ///
  /// Blank lines and lines starting with `#` are ignored.
  pub async fn download_ids_from_file(&self, path: impl AsRef<Path>) -> Result<BatchSummary> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    let ids = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty() && !line.starts_with('#'))
      .collect::<Vec<_>>();
    debug!("Read {} identifiers from {}", ids.len(), path.as_ref().display());
    Ok(self.download_ids(&ids).await)
  }

  /// Copies every `*.pdf` in `dir` into the library, recording each under its file stem.
  pub async fn import_pdfs(&self, dir: impl AsRef<Path>) -> Result<ImportSummary> {
    let mut entries = tokio::fs::read_dir(dir.as_ref()).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      let is_pdf = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
      if is_pdf && path.is_file() {
        files.push(path);
      }
    }
    files.sort();

    let mut summary = ImportSummary { total: files.len(), ..Default::default() };
    for path in &files {
      let Some(paper_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
        summary.skipped += 1;
        continue;
      };
      if !looks_like_identifier(paper_id) {
        warn!("Skipping {}: not named after an arXiv identifier", path.display());
        summary.skipped += 1;
        continue;
      }
      if self.reconciler().exists(paper_id).await {
        summary.skipped += 1;
        continue;
      }

      match self.import_one(paper_id, path).await {
        Ok(()) => summary.imported += 1,
        Err(e) => {
          warn!("Could not import {}: {e}", path.display());
          summary.failed += 1;
        },
      }
    }
    Ok(summary)
  }

  /// Fetches metadata for every record that has a PDF but no metadata.
  pub async fn fetch_missing_metadata(&self) -> Result<BatchSummary> {
    let records = self.store.missing_metadata().await?;
    let mut summary = BatchSummary { total: records.len(), ..Default::default() };

    for (index, record) in records.iter().enumerate() {
      let failed = match self.fetch_metadata_for(record).await {
        Ok(()) => {
          summary.succeeded += 1;
          false
        },
        Err(e) => {
          warn!("Could not fetch metadata for {}: {e}", record.paper_id);
          summary.failed += 1;
          true
        },
      };
      if index + 1 < records.len() {
        self.pause(failed).await;
      }
    }
    Ok(summary)
  }

  /// Looks for newer versions of every recorded paper and downloads them as new records.
  ///
  /// Older records are left untouched. A newer version already recorded under any spelling
  /// of its identifier is not downloaded again.
  pub async fn check_for_updates(&self) -> Result<UpdateSummary> {
    let records = self.store.list_all().await?;
    let mut summary = UpdateSummary { total: records.len(), ..Default::default() };

    for (index, record) in records.iter().enumerate() {
      let failed = match self.update_one(record).await {
        Ok(true) => {
          summary.updated += 1;
          false
        },
        Ok(false) => {
          summary.skipped += 1;
          false
        },
        Err(e) => {
          warn!("Could not check {} for updates: {e}", record.paper_id);
          summary.failed += 1;
          true
        },
      };
      if index + 1 < records.len() {
        self.pause(failed).await;
      }
    }
    Ok(summary)
  }

  /// Records every paper directory found in the library.
  pub async fn register_directories(&self) -> Result<RegisterSummary> {
    let names = self.library.paper_directories().await?;
    let mut summary = RegisterSummary { total: names.len(), ..Default::default() };
    let reconciler = self.reconciler();

    for name in &names {
      match reconciler.register_directory(name).await {
        Ok(registered) if registered.recorded => {
          summary.with_metadata += usize::from(registered.found.has_metadata);
          summary.with_pdf += usize::from(registered.found.has_pdf);
        },
        Ok(_) => summary.failed += 1,
        Err(e) => {
          warn!("Could not register directory {name}: {e}");
          summary.failed += 1;
        },
      }
    }
    Ok(summary)
  }

  /// Every record, most recently written first.
  pub async fn list(&self) -> Result<Vec<PaperRecord>> { self.store.list_all().await }

  /// Records matching `term`, optionally in one field only.
  pub async fn find(
    &self,
    term: &str,
    field: Option<SearchField>,
    limit: usize,
  ) -> Result<Vec<PaperRecord>> {
    self.store.search(Some(term), field, limit).await
  }

  /// Deletes a record and, if asked, its library directory. Returns whether a record existed.
  pub async fn remove(&self, paper_id: &str, delete_files: bool) -> Result<bool> {
    let Some(record) = self.store.get(paper_id).await? else {
      return Ok(false);
    };
    if delete_files && self.library.remove_paper(&record.storage_key()).await? {
      info!("Deleted files of {paper_id}");
    }
    self.store.delete(paper_id).await
  }

  /// Fetches and processes one identifier.
  async fn download_one(&self, paper_id: &str) -> Result<ProcessOutcome> {
    let id = ArxivId::parse(paper_id)?;
    let xml = self.fetcher.fetch(&Query::ids([id.to_string()]), 1).await?;
    let doc = MetadataDocument::from_xml(&xml)?;
    self.process_document(&doc).await
  }

  /// Copies one PDF into the library and records it.
  async fn import_one(&self, paper_id: &str, source: &Path) -> Result<()> {
    let key = ArxivId::parse(paper_id)?.storage_key();
    self.library.import_pdf(&key, source).await?;
    let found = self.library.observe(&key);

    self
      .reconciler()
      .try_record_or_update(Registration {
        paper_id,
        title: &format!("Imported: {paper_id}"),
        authors: "",
        directory: key.as_str(),
        has_metadata: found.has_metadata,
        has_pdf: found.has_pdf,
        category: None,
      })
      .await?;
    info!("Imported {paper_id} from {}", source.display());
    Ok(())
  }

  /// Fetches metadata for a record and writes it into the record's own directory.
  async fn fetch_metadata_for(&self, record: &PaperRecord) -> Result<()> {
    let id = ArxivId::parse(&record.paper_id)?;
    let xml = self.fetcher.fetch(&Query::ids([id.to_string()]), 1).await?;
    let doc = MetadataDocument::from_xml(&xml)?;
    let metadata = extract(&doc)?;

    let key = record.storage_key();
    self.library.write_metadata(&key, &metadata).await?;
    if !doc.raw.is_empty() {
      self.library.write_entry_xml(&key, &doc.raw).await?;
    }
    self.store.update_status(&record.paper_id, Some(true), None).await?;
    self
      .store
      .update_details(&record.paper_id, &metadata.title, &metadata.authors_joined(), metadata.category())
      .await?;
    info!("Fetched metadata for {}", record.paper_id);
    Ok(())
  }

  /// Checks one record for a newer version. Returns whether one was downloaded.
  async fn update_one(&self, record: &PaperRecord) -> Result<bool> {
    let id = ArxivId::parse(&record.paper_id)?;
    let feed = self.fetch_feed(&Query::ids([id.base()]), self.config.max_results).await?;

    let Some(latest) = resolve_latest_version(&record.id_number, &feed.entries) else {
      debug!("No entry for {} in the API response", record.paper_id);
      return Ok(false);
    };
    if !needs_update(&record.version, &latest.version) {
      debug!("{} is at the latest version v{}", record.paper_id, latest.version);
      return Ok(false);
    }
    if !self.store.find_by_canonical(&record.id_number, &latest.version).await?.is_empty() {
      debug!("v{} of {} is already recorded", latest.version, record.id_number);
      return Ok(false);
    }

    info!("Found v{} of {} (have v{})", latest.version, record.id_number, record.version);
    Ok(matches!(self.process_document(latest.entry).await?, ProcessOutcome::Downloaded { .. }))
  }

  /// Runs a query and parses the response.
  async fn fetch_feed(&self, query: &Query, limit: usize) -> Result<Feed> {
    let xml = self.fetcher.fetch(query, limit).await?;
    let feed = Feed::from_xml(&xml)?;
    debug!("{query} returned {} entries", feed.entries.len());
    Ok(feed)
  }

  /// Downloads a PDF into the library.
  async fn download_pdf(&self, key: &StorageKey, url: &str) -> Result<PathBuf> {
    let bytes = self.fetcher.fetch_bytes(url).await?;
    self.library.write_pdf(key, &bytes).await
  }

  /// Waits between two remote fetches of a batch.
  async fn pause(&self, after_failure: bool) {
    let delay = match after_failure {
      true => self.config.request_delay() * 2,
      false => self.config.request_delay(),
    };
    if !delay.is_zero() {
      trace!("Waiting {delay:?} before the next request");
      tokio::time::sleep(delay).await;
    }
  }
}

/// Counts one processing result. Returns whether it failed.
fn tally(summary: &mut BatchSummary, label: &str, result: Result<ProcessOutcome>) -> bool {
  match result {
    Ok(ProcessOutcome::Downloaded { .. }) => summary.succeeded += 1,
    Ok(ProcessOutcome::AlreadyExists { .. }) => summary.already_present += 1,
    Err(e) => {
      let kind = if e.is_extraction_error() {
        "unusable metadata"
      } else if e.is_store_error() {
        "record store error"
      } else {
        "error"
      };
      warn!("Failed to process {label} ({kind}): {e}");
      summary.failed += 1;
      return true;
    },
  }
  false
}

#[cfg(test)]
mod tests {
  use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
  };

  use super::*;

  /// Canned API responses keyed by query.
  #[derive(Default)]
  struct FakeArxiv {
    responses:    HashMap<String, String>,
    failing_pdfs: HashSet<String>,
    queries:      Mutex<Vec<Query>>,
  }

  impl FakeArxiv {
    fn respond(mut self, query: &str, xml: String) -> Self {
      self.responses.insert(query.to_owned(), xml);
      self
    }

    fn queries(&self) -> Vec<Query> { self.queries.lock().unwrap().clone() }
  }

  #[async_trait]
  impl Fetcher for FakeArxiv {
    async fn fetch(&self, query: &Query, _max_results: usize) -> Result<String> {
      self.queries.lock().unwrap().push(query.clone());
      let key = match query {
        Query::Search(expression) => expression.clone(),
        Query::Ids(ids) => ids.join(","),
      };
      self.responses.get(&key).cloned().ok_or(ShelfError::NotFound)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
      match self.failing_pdfs.contains(url) {
        true => Err(ShelfError::ApiError(format!("503 for {url}"))),
        false => Ok(b"%PDF-1.4 fake".to_vec()),
      }
    }
  }

  fn entry(id: &str, title: &str) -> String {
    format!(
      r#"<entry>
        <id>http://arxiv.org/abs/{id}</id>
        <title>{title}</title>
        <author><name>Ada Lovelace</name></author>
        <link href="http://arxiv.org/abs/{id}" rel="alternate" type="text/html"/>
        <link title="pdf" href="http://arxiv.org/pdf/{id}" rel="related" type="application/pdf"/>
        <arxiv:primary_category term="cs.LG"/>
        <category term="cs.LG"/>
      </entry>"#
    )
  }

  fn feed(entries: &[String]) -> String {
    format!(
      r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">{}</feed>"#,
      entries.concat()
    )
  }

  async fn setup(fetcher: FakeArxiv) -> (Shelf<Database, FakeArxiv>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let config = Config {
      library_dir: dir.path().join("library"),
      database_path: dir.path().join("shelf.db"),
      request_delay_secs: 0.0,
      retry_delay_secs: 0.0,
      ..Config::default()
    };
    let store = Database::open(&config.database_path).await.unwrap();
    (Shelf::new(config, store, fetcher), dir)
  }

  #[traced_test]
  #[tokio::test]
  async fn test_batch_continues_past_failed_extraction() {
    let ids = ["2101.00001", "2101.00002", "2101.00003", "2101.00004", "2101.00005"];
    let mut fetcher = FakeArxiv::default();
    for id in ids {
      let response = match id {
        "2101.00003" => feed(&["<entry><title>No identifier</title></entry>".to_owned()]),
        _ => feed(&[entry(&format!("{id}v1"), &format!("Paper {id}"))]),
      };
      fetcher = fetcher.respond(id, response);
    }
    let (shelf, _dir) = setup(fetcher).await;

    let summary = shelf.download_ids(&ids).await;
    assert_eq!(summary, BatchSummary { total: 5, succeeded: 4, already_present: 0, failed: 1 });
    assert_eq!(shelf.fetcher.queries().len(), 5);
    assert!(logs_contain("Failed to process 2101.00003 (unusable metadata)"));

    let records = shelf.list().await.unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.has_metadata && r.has_pdf));
    assert!(shelf.reconciler().exists("2101.00005v1").await);

    // A second run finds the four papers complete.
    let summary = shelf.download_ids(&ids).await;
    assert_eq!(summary, BatchSummary { total: 5, succeeded: 0, already_present: 4, failed: 1 });
  }

  #[tokio::test]
  async fn test_process_document_writes_artifacts() {
    let (shelf, _dir) = setup(FakeArxiv::default()).await;
    let doc = MetadataDocument::from_xml(&feed(&[entry("cs/0303006v1", "Legacy")])).unwrap();

    let outcome = shelf.process_document(&doc).await.unwrap();
    let key = StorageKey::sanitize("0303006v1");
    assert_eq!(outcome, ProcessOutcome::Downloaded {
      paper_id:     "cs/0303006v1".to_owned(),
      storage_key:  key.clone(),
      has_metadata: true,
      has_pdf:      true,
    });
    assert!(shelf.library().pdf_path(&key).is_file());
    assert!(shelf.library().metadata_dir(&key).join("response.xml").is_file());

    let record = shelf.store().get("cs/0303006v1").await.unwrap().unwrap();
    assert_eq!(record.category.as_deref(), Some("cs.LG"));
    assert_eq!(record.authors, "Ada Lovelace");
    assert_eq!(record.directory, "0303006v1");

    assert_eq!(shelf.process_document(&doc).await.unwrap(), ProcessOutcome::AlreadyExists {
      paper_id: "cs/0303006v1".to_owned(),
    });
  }

  #[tokio::test]
  async fn test_failed_pdf_leaves_partial_record() {
    let mut fetcher = FakeArxiv::default();
    fetcher.failing_pdfs.insert("http://arxiv.org/pdf/2101.00001v1".to_owned());
    let (shelf, _dir) = setup(fetcher).await;
    let doc = MetadataDocument::from_xml(&feed(&[entry("2101.00001v1", "T")])).unwrap();

    let outcome = shelf.process_document(&doc).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Downloaded { has_metadata: true, has_pdf: false, .. }));

    let record = shelf.store().get("2101.00001v1").await.unwrap().unwrap();
    assert!(record.has_metadata && !record.has_pdf);
    assert!(!shelf.reconciler().exists("2101.00001v1").await);
  }

  #[tokio::test]
  async fn test_search_skips_bad_entries() {
    let fetcher = FakeArxiv::default().respond(
      "all:electron",
      feed(&[
        entry("2101.00001v1", "One"),
        "<entry><title>Broken</title></entry>".to_owned(),
        entry("2101.00002v3", "Two"),
      ]),
    );
    let (shelf, _dir) = setup(fetcher).await;

    let results = shelf.search("all:electron", 5).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].paper_id, "2101.00002v3");
    assert!(shelf.list().await.unwrap().is_empty());

    let summary = shelf.search_and_download("all:electron", 5).await.unwrap();
    assert_eq!(summary, BatchSummary { total: 3, succeeded: 2, already_present: 0, failed: 1 });
  }

  #[tokio::test]
  async fn test_download_ids_from_file() {
    let fetcher = FakeArxiv::default()
      .respond("2101.00001", feed(&[entry("2101.00001v1", "One")]))
      .respond("cond-mat/0102536v1", feed(&[entry("cond-mat/0102536v1", "Two")]));
    let (shelf, dir) = setup(fetcher).await;

    let list = dir.path().join("ids.txt");
    std::fs::write(&list, "# reading list\n2101.00001\n\n  cond-mat/0102536v1  \nmissing.00000\n").unwrap();

    let summary = shelf.download_ids_from_file(&list).await.unwrap();
    assert_eq!(summary, BatchSummary { total: 3, succeeded: 2, already_present: 0, failed: 1 });
  }

  #[tokio::test]
  async fn test_import_then_fetch_missing_metadata() {
    let fetcher = FakeArxiv::default()
      .respond("cs/0303006v1", feed(&[entry("cs/0303006v1", "Legacy Paper")]))
      .respond("2101.00001", feed(&[entry("2101.00001v2", "Modern Paper")]));
    let (shelf, dir) = setup(fetcher).await;

    let inbox = dir.path().join("inbox");
    std::fs::create_dir_all(&inbox).unwrap();
    for name in ["cs_0303006v1.pdf", "2101.00001.PDF", "holiday photos.pdf", "notes.txt"] {
      std::fs::write(inbox.join(name), b"%PDF").unwrap();
    }

    let summary = shelf.import_pdfs(&inbox).await.unwrap();
    assert_eq!(summary, ImportSummary { total: 3, imported: 2, skipped: 1, failed: 0 });

    let record = shelf.store().get("cs_0303006v1").await.unwrap().unwrap();
    assert_eq!(record.title, "Imported: cs_0303006v1");
    assert!(record.has_pdf && !record.has_metadata);
    assert!(shelf.library().pdf_path(&StorageKey::sanitize("0303006v1")).is_file());

    let summary = shelf.fetch_missing_metadata().await.unwrap();
    assert_eq!(summary, BatchSummary { total: 2, succeeded: 2, already_present: 0, failed: 0 });

    let record = shelf.store().get("cs_0303006v1").await.unwrap().unwrap();
    assert_eq!(record.title, "Legacy Paper");
    assert_eq!(record.category.as_deref(), Some("cs.LG"));
    assert!(shelf.reconciler().exists("cs_0303006v1").await);

    // Metadata lands next to the imported PDF, not under the fetched version's key.
    assert!(shelf.library().metadata_dir(&StorageKey::sanitize("2101.00001")).join("title.txt").is_file());
    assert!(shelf.reconciler().exists("2101.00001").await);
  }

  #[tokio::test]
  async fn test_check_for_updates_is_additive() {
    let fetcher = FakeArxiv::default().respond(
      "2101.00001",
      feed(&[
        entry("2101.00001v1", "Old"),
        entry("2101.00001v2", "New"),
        entry("2101.000011v9", "Unrelated"),
      ]),
    );
    let (shelf, _dir) = setup(fetcher).await;
    let v1 = MetadataDocument::from_xml(&feed(&[entry("2101.00001v1", "Old")])).unwrap();
    shelf.process_document(&v1).await.unwrap();

    let summary = shelf.check_for_updates().await.unwrap();
    assert_eq!(summary, UpdateSummary { total: 1, updated: 1, skipped: 0, failed: 0 });

    let old = shelf.store().get("2101.00001v1").await.unwrap().unwrap();
    assert_eq!(old.title, "Old");
    let new = shelf.store().get("2101.00001v2").await.unwrap().unwrap();
    assert_eq!(new.version, "2");
    assert!(new.has_metadata && new.has_pdf);

    let summary = shelf.check_for_updates().await.unwrap();
    assert_eq!(summary, UpdateSummary { total: 2, updated: 0, skipped: 2, failed: 0 });
  }

  #[tokio::test]
  async fn test_check_for_updates_counts_failures() {
    let (shelf, _dir) = setup(FakeArxiv::default()).await;
    let doc = MetadataDocument::from_xml(&feed(&[entry("2101.00001v1", "T")])).unwrap();
    shelf.process_document(&doc).await.unwrap();

    let summary = shelf.check_for_updates().await.unwrap();
    assert_eq!(summary, UpdateSummary { total: 1, updated: 0, skipped: 0, failed: 1 });
    assert_eq!(shelf.fetcher.queries(), vec![Query::ids(["2101.00001"])]);
  }

  #[tokio::test]
  async fn test_register_directories() {
    let (shelf, _dir) = setup(FakeArxiv::default()).await;
    let key = StorageKey::sanitize("2101.00009v1");
    shelf.library().write_pdf(&key, b"%PDF").await.unwrap();
    std::fs::create_dir_all(shelf.library().root().join("notes").join("pdf")).unwrap();

    let summary = shelf.register_directories().await.unwrap();
    assert_eq!(summary, RegisterSummary { total: 1, with_metadata: 0, with_pdf: 1, failed: 0 });

    let record = shelf.store().get("2101.00009v1").await.unwrap().unwrap();
    assert_eq!(record.title, "Paper: 2101.00009v1");
    assert!(record.has_pdf && !record.has_metadata);
  }

  #[tokio::test]
  async fn test_remove() {
    let (shelf, _dir) = setup(FakeArxiv::default()).await;
    let doc = MetadataDocument::from_xml(&feed(&[entry("2101.00001v1", "T")])).unwrap();
    shelf.process_document(&doc).await.unwrap();
    let key = StorageKey::sanitize("2101.00001v1");

    assert!(shelf.remove("2101.00001v1", true).await.unwrap());
    assert!(!shelf.library().paper_dir(&key).exists());
    assert!(shelf.store().get("2101.00001v1").await.unwrap().is_none());
    assert!(!shelf.remove("2101.00001v1", true).await.unwrap());
  }
}
