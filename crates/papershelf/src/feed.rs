//! Parsing of arXiv Atom responses into per-paper metadata documents.
//!
//! The arXiv API answers every query with an Atom `<feed>` holding zero or more `<entry>`
//! elements, mixing the Atom, OpenSearch and arXiv namespaces. This module walks the
//! response with `quick-xml`'s event reader, matching elements by local name so that
//! namespace prefixes do not matter, and isolates every entry into a
//! [`MetadataDocument`]. Interpretation of the fields is left to
//! [`metadata::extract`](crate::metadata::extract).
//!
//! # Examples
//!
//! ```
//! use papershelf::feed::Feed;
//!
//! let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
//!   <entry>
//!     <id>http://arxiv.org/abs/2101.00001v1</id>
//!     <title>An Example</title>
//!   </entry>
//! </feed>"#;
//!
//! let feed = Feed::from_xml(xml).unwrap();
//! assert_eq!(feed.entries.len(), 1);
//! assert_eq!(feed.entries[0].id.as_deref(), Some("http://arxiv.org/abs/2101.00001v1"));
//! ```

use quick_xml::{
  events::{BytesStart, Event},
  Reader,
};

use super::*;

/// A parsed API response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feed {
  /// `opensearch:totalResults`, when the response carries it
  pub total_results: Option<u64>,
  /// Entries in document order
  pub entries:       Vec<MetadataDocument>,
}

/// One paper's metadata, isolated from a feed.
///
/// Every field is kept as found in the document: text is trimmed but otherwise untouched,
/// and absent elements stay `None` or empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
  /// Content of `<id>`, usually the abstract page URL
  pub id:               Option<String>,
  /// Content of `<title>`
  pub title:            Option<String>,
  /// Content of `<summary>`
  pub summary:          Option<String>,
  /// Content of `<published>`
  pub published:        Option<String>,
  /// Content of `<updated>`
  pub updated:          Option<String>,
  /// Content of `<arxiv:doi>`
  pub doi:              Option<String>,
  /// Content of `<arxiv:journal_ref>`
  pub journal_ref:      Option<String>,
  /// Content of `<arxiv:comment>`
  pub comment:          Option<String>,
  /// Every `<author>` in order
  pub authors:          Vec<DocumentAuthor>,
  /// Every `<link>` in order
  pub links:            Vec<Link>,
  /// `term` of `<arxiv:primary_category>`
  pub primary_category: Option<String>,
  /// `term` of every `<category>`, order and duplicates preserved
  pub categories:       Vec<String>,
  /// The entry's own XML text
  pub raw:              String,
}

/// An `<author>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAuthor {
  /// Content of `<name>`
  pub name:        Option<String>,
  /// Content of `<arxiv:affiliation>`
  pub affiliation: Option<String>,
}

/// A `<link>` element, attributes kept verbatim (missing ones are empty).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  /// The `rel` attribute
  pub rel:   String,
  /// The `href` attribute
  pub href:  String,
  /// The `title` attribute
  pub title: String,
  /// The `type` attribute
  #[serde(rename = "type")]
  pub kind:  String,
}

impl Link {
  /// Whether this link points at the paper's PDF.
  pub fn is_pdf(&self) -> bool { self.title == "pdf" || self.kind == "application/pdf" }
}

impl Feed {
  /// Parses an Atom response.
  ///
  /// A bare `<entry>` document is accepted as a feed of one.
  ///
  /// # Errors
  ///
  /// Returns [`ShelfError::MalformedDocument`] when the text is not well-formed XML, is
  /// truncated, or has a root element other than `<feed>` or `<entry>`.
  pub fn from_xml(xml: &str) -> Result<Self> {
    let mut reader = Reader::from_str(xml);
    let mut feed = Feed::default();

    // Local names of the currently open elements.
    let mut path: Vec<String> = Vec::new();
    let mut entry: Option<(usize, MetadataDocument)> = None;
    let mut author: Option<DocumentAuthor> = None;
    let mut text = String::new();
    let mut seen_root = false;

    loop {
      let offset = reader.buffer_position() as usize;
      match reader.read_event().map_err(malformed)? {
        Event::Start(e) => {
          let name = local_name(&e);
          check_root(&mut seen_root, &path, &name)?;
          let parent = path.last().map(String::as_str);
          match name.as_str() {
            "entry" => entry = Some((offset, MetadataDocument::default())),
            "author" if parent == Some("entry") => author = Some(DocumentAuthor::default()),
            _ =>
              if let (Some("entry"), Some((_, doc))) = (parent, entry.as_mut()) {
                apply_attributes(doc, &name, &e)?;
              },
          }
          path.push(name);
          text.clear();
        },
        Event::Empty(e) => {
          let name = local_name(&e);
          check_root(&mut seen_root, &path, &name)?;
          if let (Some("entry"), Some((_, doc))) = (path.last().map(String::as_str), entry.as_mut()) {
            apply_attributes(doc, &name, &e)?;
          }
        },
        Event::Text(t) => text.push_str(&t.unescape().map_err(malformed)?),
        Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
        Event::End(_) => {
          let name = path.pop().unwrap_or_default();
          let value = non_empty(text.trim());
          text.clear();

          match (name.as_str(), path.last().map(String::as_str)) {
            ("entry", _) =>
              if let Some((start, mut doc)) = entry.take() {
                let end = reader.buffer_position() as usize;
                doc.raw = xml.get(start..end).unwrap_or_default().trim().to_owned();
                feed.entries.push(doc);
              },
            ("author", Some("entry")) =>
              if let (Some(done), Some((_, doc))) = (author.take(), entry.as_mut()) {
                doc.authors.push(done);
              },
            ("name", Some("author")) =>
              if let Some(current) = author.as_mut() {
                current.name = value;
              },
            ("affiliation", Some("author")) =>
              if let Some(current) = author.as_mut() {
                current.affiliation = value;
              },
            ("totalResults", Some("feed")) =>
              feed.total_results = value.and_then(|v| v.parse().ok()),
            (field, Some("entry")) =>
              if let Some((_, doc)) = entry.as_mut() {
                set_scalar(doc, field, value);
              },
            _ => {},
          }
        },
        Event::Eof => break,
        _ => {},
      }
    }

    if !seen_root {
      return Err(ShelfError::MalformedDocument("document contains no elements".into()));
    }
    if !path.is_empty() {
      return Err(ShelfError::MalformedDocument(format!("unclosed element <{}>", path.join("/"))));
    }

    debug!("Parsed feed with {} entries", feed.entries.len());
    Ok(feed)
  }
}

impl MetadataDocument {
  /// Parses `xml` and returns its first entry.
  ///
  /// # Errors
  ///
  /// Returns [`ShelfError::NotFound`] when the feed is empty, and the errors of
  /// [`Feed::from_xml`] otherwise.
  pub fn from_xml(xml: &str) -> Result<Self> {
    Feed::from_xml(xml)?.entries.into_iter().next().ok_or(ShelfError::NotFound)
  }
}

/// Converts a `quick-xml` error into a malformed-document error.
fn malformed(e: impl std::fmt::Display) -> ShelfError { ShelfError::MalformedDocument(e.to_string()) }

/// Validates the root element of the document.
fn check_root(seen_root: &mut bool, path: &[String], name: &str) -> Result<()> {
  if path.is_empty() {
    if *seen_root || !matches!(name, "feed" | "entry") {
      return Err(ShelfError::MalformedDocument(format!(
        "expected a single Atom <feed> or <entry> root, found <{name}>"
      )));
    }
    *seen_root = true;
  }
  Ok(())
}

/// The element name without its namespace prefix.
fn local_name(e: &BytesStart<'_>) -> String {
  String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Attribute value by local name, empty when missing.
fn attribute(e: &BytesStart<'_>, key: &str) -> Result<String> {
  for attr in e.attributes() {
    let attr = attr.map_err(malformed)?;
    if attr.key.local_name().as_ref() == key.as_bytes() {
      return Ok(attr.unescape_value().map_err(malformed)?.into_owned());
    }
  }
  Ok(String::new())
}

/// Records the attribute-carrying children of `<entry>`.
fn apply_attributes(doc: &mut MetadataDocument, name: &str, e: &BytesStart<'_>) -> Result<()> {
  match name {
    "link" => doc.links.push(Link {
      rel:   attribute(e, "rel")?,
      href:  attribute(e, "href")?,
      title: attribute(e, "title")?,
      kind:  attribute(e, "type")?,
    }),
    "category" => {
      let term = attribute(e, "term")?;
      if !term.is_empty() {
        doc.categories.push(term);
      }
    },
    "primary_category" => doc.primary_category = non_empty(&attribute(e, "term")?),
    _ => {},
  }
  Ok(())
}

/// Records the text-carrying children of `<entry>`.
fn set_scalar(doc: &mut MetadataDocument, field: &str, value: Option<String>) {
  let slot = match field {
    "id" => &mut doc.id,
    "title" => &mut doc.title,
    "summary" => &mut doc.summary,
    "published" => &mut doc.published,
    "updated" => &mut doc.updated,
    "doi" => &mut doc.doi,
    "journal_ref" => &mut doc.journal_ref,
    "comment" => &mut doc.comment,
    _ => return,
  };
  *slot = value;
}

/// `Some(owned)` unless `s` is empty.
fn non_empty(s: &str) -> Option<String> { (!s.is_empty()).then(|| s.to_owned()) }

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  /// A two-entry response shaped like the arXiv API output.
  pub(crate) const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:electron</title>
  <id>http://arxiv.org/api/cHxbiOdZaP56ODnBPIenZhzg5f8</id>
  <opensearch:totalResults>2</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/cond-mat/0102536v1</id>
    <updated>2001-02-28T20:12:09Z</updated>
    <published>2001-02-28T20:12:09Z</published>
    <title>Impact of Electron-Electron Cusp
  on Configuration Interaction Energies</title>
    <summary>  The effect of the electron-electron cusp on the convergence of configuration
interaction (CI) wave functions is examined.</summary>
    <author>
      <name>David Prendergast</name>
      <arxiv:affiliation>Department of Physics</arxiv:affiliation>
    </author>
    <author>
      <name>M. Nolan</name>
    </author>
    <arxiv:doi>10.1063/1.1383585</arxiv:doi>
    <link title="doi" href="http://dx.doi.org/10.1063/1.1383585" rel="related"/>
    <arxiv:comment>11 pages, 6 figures, 3 tables, LaTeX209, submitted to The Journal of
  Chemical Physics</arxiv:comment>
    <arxiv:journal_ref>J. Chem. Phys. 115, 1626 (2001)</arxiv:journal_ref>
    <link href="http://arxiv.org/abs/cond-mat/0102536v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/cond-mat/0102536v1" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cond-mat.str-el" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cond-mat.str-el" scheme="http://arxiv.org/schemas/atom"/>
    <category term="physics.chem-ph" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/1909.03550v2</id>
    <title>Modern &amp; Plain</title>
    <link href="http://arxiv.org/abs/1909.03550v2" rel="alternate" type="text/html"/>
    <category term="cs.LG"/>
  </entry>
</feed>"#;

  #[test]
  fn test_parse_sample_feed() {
    let feed = Feed::from_xml(SAMPLE_FEED).unwrap();
    assert_eq!(feed.total_results, Some(2));
    assert_eq!(feed.entries.len(), 2);

    let first = &feed.entries[0];
    assert_eq!(first.id.as_deref(), Some("http://arxiv.org/abs/cond-mat/0102536v1"));
    assert_eq!(
      first.title.as_deref(),
      Some("Impact of Electron-Electron Cusp\n  on Configuration Interaction Energies")
    );
    assert!(first.summary.as_deref().unwrap().starts_with("The effect"));
    assert_eq!(first.doi.as_deref(), Some("10.1063/1.1383585"));
    assert_eq!(first.journal_ref.as_deref(), Some("J. Chem. Phys. 115, 1626 (2001)"));
    assert_eq!(first.authors.len(), 2);
    assert_eq!(first.authors[0].affiliation.as_deref(), Some("Department of Physics"));
    assert_eq!(first.authors[1].affiliation, None);
    assert_eq!(first.links.len(), 3);
    assert!(first.links[2].is_pdf());
    assert_eq!(first.primary_category.as_deref(), Some("cond-mat.str-el"));
    assert_eq!(first.categories, vec!["cond-mat.str-el", "physics.chem-ph"]);
    assert!(first.raw.starts_with("<entry>"));
    assert!(first.raw.ends_with("</entry>"));

    let second = &feed.entries[1];
    assert_eq!(second.title.as_deref(), Some("Modern & Plain"));
    assert_eq!(second.primary_category, None);
    assert!(second.authors.is_empty());
  }

  #[test]
  fn test_feed_title_does_not_leak_into_entries() {
    let feed = Feed::from_xml(SAMPLE_FEED).unwrap();
    assert!(feed.entries.iter().all(|e| e.title.as_deref() != Some("ArXiv Query: search_query=all:electron")));
  }

  #[test]
  fn test_bare_entry_document() {
    let doc = MetadataDocument::from_xml(
      "<entry><id>http://arxiv.org/abs/2101.00001</id><category term=\"a\"/><category term=\"a\"/></entry>",
    )
    .unwrap();
    assert_eq!(doc.id.as_deref(), Some("http://arxiv.org/abs/2101.00001"));
    assert_eq!(doc.categories, vec!["a", "a"]);
  }

  #[test]
  fn test_empty_feed() {
    let feed = Feed::from_xml("<feed xmlns=\"http://www.w3.org/2005/Atom\"></feed>").unwrap();
    assert!(feed.entries.is_empty());
    assert!(matches!(
      MetadataDocument::from_xml("<feed></feed>"),
      Err(ShelfError::NotFound)
    ));
  }

  #[test]
  fn test_malformed_documents() {
    for xml in [
      "",
      "not xml at all",
      "<feed><entry><id>x</id></feed>",
      "<feed><entry>",
      "<html><body/></html>",
    ] {
      assert!(
        matches!(Feed::from_xml(xml), Err(ShelfError::MalformedDocument(_))),
        "expected {xml:?} to be rejected"
      );
    }
  }
}
