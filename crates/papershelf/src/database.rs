//! SQLite-backed record store.
//!
//! [`PaperStore`] is the interface the reconciliation and orchestration layers program
//! against; [`Database`] implements it on top of `tokio-rusqlite`, running every statement
//! on the connection's background thread.

use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::*;
use crate::paper::{PaperRecord, SearchField};

/// Columns selected for every [`PaperRecord`] query, in [`record_from_row`] order.
const COLUMNS: &str = "paper_id, category, id_number, version, title, authors, downloaded_at, \
                       directory, has_metadata, has_pdf";

/// Persistent table of known papers keyed by full identifier.
#[async_trait]
pub trait PaperStore: Send + Sync {
  /// Looks up a record by full identifier.
  async fn get(&self, paper_id: &str) -> Result<Option<PaperRecord>>;

  /// Inserts `record`, or updates title, authors, timestamp, directory, flags and category of
  /// the record with the same full identifier. The derived id number and version of an
  /// existing record are left untouched.
  async fn upsert(&self, record: &PaperRecord) -> Result<()>;

  /// Overwrites the flags that are `Some`. Returns whether a record was changed.
  async fn update_status(
    &self,
    paper_id: &str,
    has_metadata: Option<bool>,
    has_pdf: Option<bool>,
  ) -> Result<bool>;

  /// Overwrites title, authors and, when given, category. Returns whether a record was changed.
  async fn update_details(
    &self,
    paper_id: &str,
    title: &str,
    authors: &str,
    category: Option<&str>,
  ) -> Result<bool>;

  /// Every record, most recently written first.
  async fn list_all(&self) -> Result<Vec<PaperRecord>>;

  /// Records matching `term` by substring, optionally restricted to one field, most recently
  /// written first. Without a term every record matches.
  async fn search(
    &self,
    term: Option<&str>,
    field: Option<SearchField>,
    limit: usize,
  ) -> Result<Vec<PaperRecord>>;

  /// Deletes a record. Returns whether one existed.
  async fn delete(&self, paper_id: &str) -> Result<bool>;

  /// Records that have a PDF but no metadata.
  async fn missing_metadata(&self) -> Result<Vec<PaperRecord>>;

  /// Records sharing an id number and version, whatever their full identifier.
  async fn find_by_canonical(&self, id_number: &str, version: &str) -> Result<Vec<PaperRecord>>;
}

/// Database handle for the shelf.
pub struct Database {
  /// Connection running statements on its own thread
  conn: Connection,
}

impl Database {
  /// Open or create a database at the specified path.
  ///
  /// Parent directories are created as needed.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await?;
    }
    let conn = Connection::open(path).await?;

    // Initialize schema
    conn
      .call(|conn| {
        conn.execute_batch(include_str!(concat!(
          env!("CARGO_MANIFEST_DIR"),
          "/migrations/init.sql"
        )))?;
        Ok(())
      })
      .await?;

    debug!("Opened database at {}", path.display());
    Ok(Self { conn })
  }

  /// Get default database path in user's data directory
  pub fn default_path() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("papershelf").join("papershelf.db")
  }

  /// Runs a `SELECT` over [`COLUMNS`] and collects the records.
  async fn query_records(&self, sql: String, values: Vec<String>) -> Result<Vec<PaperRecord>> {
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), record_from_row)?;
        let mut records = Vec::new();
        for record in rows {
          records.push(record?);
        }
        Ok(records)
      })
      .await
      .map_err(ShelfError::from)
  }
}

#[async_trait]
impl PaperStore for Database {
  async fn get(&self, paper_id: &str) -> Result<Option<PaperRecord>> {
    let paper_id = paper_id.to_owned();
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!("SELECT {COLUMNS} FROM papers WHERE paper_id = ?1"))?;
        Ok(stmt.query_row([&paper_id], record_from_row).optional()?)
      })
      .await
      .map_err(ShelfError::from)
  }

  async fn upsert(&self, record: &PaperRecord) -> Result<()> {
    let record = record.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO papers (
              paper_id, category, id_number, version, title, authors,
              downloaded_at, directory, has_metadata, has_pdf
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT(paper_id) DO UPDATE SET
              title = excluded.title,
              authors = excluded.authors,
              downloaded_at = excluded.downloaded_at,
              directory = excluded.directory,
              has_metadata = excluded.has_metadata,
              has_pdf = excluded.has_pdf,
              category = excluded.category",
          params![
            &record.paper_id,
            &record.category,
            &record.id_number,
            &record.version,
            &record.title,
            &record.authors,
            &record.downloaded_at,
            &record.directory,
            record.has_metadata,
            record.has_pdf,
          ],
        )?;
        Ok(())
      })
      .await
      .map_err(ShelfError::from)
  }

  async fn update_status(
    &self,
    paper_id: &str,
    has_metadata: Option<bool>,
    has_pdf: Option<bool>,
  ) -> Result<bool> {
    let paper_id = paper_id.to_owned();
    self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE papers
             SET has_metadata = COALESCE(?2, has_metadata),
                 has_pdf = COALESCE(?3, has_pdf)
           WHERE paper_id = ?1",
          params![paper_id, has_metadata, has_pdf],
        )?;
        Ok(changed > 0)
      })
      .await
      .map_err(ShelfError::from)
  }

  async fn update_details(
    &self,
    paper_id: &str,
    title: &str,
    authors: &str,
    category: Option<&str>,
  ) -> Result<bool> {
    let (paper_id, title, authors) = (paper_id.to_owned(), title.to_owned(), authors.to_owned());
    let category = category.map(str::to_owned);
    self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE papers
             SET title = ?2, authors = ?3, category = COALESCE(?4, category)
           WHERE paper_id = ?1",
          params![paper_id, title, authors, category],
        )?;
        Ok(changed > 0)
      })
      .await
      .map_err(ShelfError::from)
  }

  async fn list_all(&self) -> Result<Vec<PaperRecord>> {
    self
      .query_records(format!("SELECT {COLUMNS} FROM papers ORDER BY downloaded_at DESC"), Vec::new())
      .await
  }

  async fn search(
    &self,
    term: Option<&str>,
    field: Option<SearchField>,
    limit: usize,
  ) -> Result<Vec<PaperRecord>> {
    let mut sql = format!("SELECT {COLUMNS} FROM papers");
    let mut values = Vec::new();

    if let Some(term) = term.filter(|t| !t.is_empty()) {
      let condition = match field {
        Some(SearchField::Title) => r"title LIKE ?1 ESCAPE '\'",
        Some(SearchField::Authors) => r"authors LIKE ?1 ESCAPE '\'",
        Some(SearchField::Category) => r"category LIKE ?1 ESCAPE '\'",
        Some(SearchField::Id) => r"(paper_id LIKE ?1 ESCAPE '\' OR id_number LIKE ?1 ESCAPE '\')",
        None => concat!(
          r"(title LIKE ?1 ESCAPE '\' OR authors LIKE ?1 ESCAPE '\' OR category LIKE ?1 ESCAPE '\'",
          r" OR paper_id LIKE ?1 ESCAPE '\' OR id_number LIKE ?1 ESCAPE '\')",
        ),
      };
      sql.push_str(" WHERE ");
      sql.push_str(condition);
      values.push(format!("%{}%", escape_like(term)));
    }
    sql.push_str(&format!(" ORDER BY downloaded_at DESC LIMIT {limit}"));

    trace!("Record search: {sql} with {values:?}");
    self.query_records(sql, values).await
  }

  async fn delete(&self, paper_id: &str) -> Result<bool> {
    let paper_id = paper_id.to_owned();
    self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM papers WHERE paper_id = ?1", [&paper_id])? > 0))
      .await
      .map_err(ShelfError::from)
  }

  async fn missing_metadata(&self) -> Result<Vec<PaperRecord>> {
    self
      .query_records(
        format!(
          "SELECT {COLUMNS} FROM papers WHERE has_pdf = 1 AND has_metadata = 0 ORDER BY paper_id"
        ),
        Vec::new(),
      )
      .await
  }

  async fn find_by_canonical(&self, id_number: &str, version: &str) -> Result<Vec<PaperRecord>> {
    self
      .query_records(
        format!("SELECT {COLUMNS} FROM papers WHERE id_number = ?1 AND version = ?2"),
        vec![id_number.to_owned(), version.to_owned()],
      )
      .await
  }
}

/// Maps a row selected with [`COLUMNS`] to a record.
fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PaperRecord> {
  Ok(PaperRecord {
    paper_id:      row.get(0)?,
    category:      row.get(1)?,
    id_number:     row.get(2)?,
    version:       row.get(3)?,
    title:         row.get(4)?,
    authors:       row.get(5)?,
    downloaded_at: row.get(6)?,
    directory:     row.get(7)?,
    has_metadata:  row.get(8)?,
    has_pdf:       row.get(9)?,
  })
}

/// Escapes LIKE wildcards so the term matches literally under `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
  term.replace('\\', r"\\").replace('%', r"\%").replace('_', r"\_")
}
