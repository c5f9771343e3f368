//! Parsing of arXiv paper identifiers into their canonical parts.
//!
//! arXiv identifiers come in several historical shapes, and this crate sees them both as
//! typed by users and as written back onto disk:
//!
//! | Input                                   | category   | id_number    | version |
//! |-----------------------------------------|------------|--------------|---------|
//! | `1909.03550v1`                          | (none)     | `1909.03550` | `1`     |
//! | `cond-mat/0102536v1`                    | `cond-mat` | `0102536`    | `1`     |
//! | `math.GT_0512630`                       | `math.GT`  | `0512630`    | `1`     |
//! | `cs_0303006v1`                          | `cs`       | `0303006`    | `1`     |
//! | `http://arxiv.org/abs/hep-th/9901001v3` | `hep-th`   | `9901001`    | `3`     |
//!
//! The layout is picked from [`IdFormat::PRECEDENCE`], first match wins. Underscore form is
//! tried before slash form because directory names written by older tooling replace the
//! slash with an underscore, and the category itself may contain dots and dashes.
//!
//! # Examples
//!
//! ```
//! use papershelf::identifier::ArxivId;
//!
//! let id = ArxivId::parse("cond-mat/0102536v1").unwrap();
//! assert_eq!(id.category(), Some("cond-mat"));
//! assert_eq!(id.id_number(), "0102536");
//! assert_eq!(id.version(), "1");
//! assert!(id.version_explicit());
//! ```

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use super::*;

/// Path segments that introduce an identifier in arXiv URLs.
const VIEW_SEGMENTS: [&str; 2] = ["/abs/", "/pdf/"];

/// Version assumed when the input carries no version marker.
pub const DEFAULT_VERSION: &str = "1";

/// The layout of an identifier string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdFormat {
  /// `category_number[vN]`, the layout used by legacy directory names.
  Underscore,
  /// `category/number[vN]`, the pre-2007 arXiv layout.
  Slash,
  /// `number[vN]` without any category, the modern arXiv layout.
  Plain,
}

impl IdFormat {
  /// Layouts in the order they are tried.
  pub const PRECEDENCE: [IdFormat; 3] = [IdFormat::Underscore, IdFormat::Slash, IdFormat::Plain];

  /// The separator between category and number, if the layout has one.
  pub fn separator(self) -> Option<char> {
    match self {
      IdFormat::Underscore => Some('_'),
      IdFormat::Slash => Some('/'),
      IdFormat::Plain => None,
    }
  }

  /// Splits `input` into an optional category and the remainder, or returns `None`
  /// when this layout does not apply.
  fn split(self, input: &str) -> Option<(Option<&str>, &str)> {
    match self.separator() {
      Some(separator) => input.split_once(separator).map(|(category, rest)| (Some(category), rest)),
      None => Some((None, input)),
    }
  }

  /// Returns the first layout in [`IdFormat::PRECEDENCE`] that applies to `input`.
  pub fn detect(input: &str) -> IdFormat {
    Self::PRECEDENCE
      .into_iter()
      .find(|format| format.split(input).is_some())
      .unwrap_or(IdFormat::Plain)
  }
}

/// A paper identifier decomposed into category, number and version.
///
/// Constructed only through [`ArxivId::parse`] (or [`FromStr`]), which guarantees that
/// `id_number` is non-empty and free of `/` and `.pdf`, and that `version` is a
/// non-empty string of digits. Whether the version was written out in the source text
/// is kept separately in [`ArxivId::version_explicit`], since `v1` and no marker at all
/// both resolve to version `"1"` but simplify differently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArxivId {
  /// Subject class prefix of legacy identifiers
  category:         Option<String>,
  /// The numeric part of the identifier
  id_number:        String,
  /// Version digits, `"1"` when absent from the input
  version:          String,
  /// Whether the input spelled out a `vN` suffix
  version_explicit: bool,
  /// Layout the identifier was parsed from
  format:           IdFormat,
}

impl ArxivId {
  /// Parses a raw identifier or identifier-bearing URL.
  ///
  /// Anything that is not obviously broken parses: unknown shapes degrade to the whole
  /// cleaned string as `id_number` with version `"1"`.
  ///
  /// # Errors
  ///
  /// Returns [`ShelfError::InvalidIdentifier`] when the cleaned input is empty or consists
  /// only of separators and version markers.
  ///
  /// # Examples
  ///
  /// ```
  /// use papershelf::identifier::ArxivId;
  ///
  /// let id = ArxivId::parse("https://arxiv.org/pdf/1909.03550v2.pdf").unwrap();
  /// assert_eq!(id.category(), None);
  /// assert_eq!(id.id_number(), "1909.03550");
  /// assert_eq!(id.version(), "2");
  ///
  /// assert!(ArxivId::parse("   ").is_err());
  /// ```
  pub fn parse(raw: &str) -> Result<Self> {
    let cleaned = clean(raw);
    trace!("Cleaned identifier {raw:?} to {cleaned:?}");

    let format = IdFormat::detect(&cleaned);
    let (category, remainder) = format.split(&cleaned).unwrap_or((None, cleaned.as_str()));

    // A second slash can only appear after an underscore split; keep the last segment.
    let remainder = remainder.rsplit('/').next().unwrap_or(remainder);
    let (id_number, version) = split_version(remainder);

    if id_number.is_empty() {
      return Err(ShelfError::InvalidIdentifier(raw.to_owned()));
    }

    Ok(Self {
      category: category.filter(|c| !c.is_empty()).map(str::to_owned),
      id_number: id_number.to_owned(),
      version: version.unwrap_or(DEFAULT_VERSION).to_owned(),
      version_explicit: version.is_some(),
      format,
    })
  }

  /// The category prefix, absent for modern identifiers.
  pub fn category(&self) -> Option<&str> { self.category.as_deref() }

  /// The numeric part of the identifier.
  pub fn id_number(&self) -> &str { &self.id_number }

  /// The version digits.
  pub fn version(&self) -> &str { &self.version }

  /// The version as an integer, see [`version_number`].
  pub fn version_number(&self) -> u64 { version_number(&self.version) }

  /// Whether the source text carried an explicit `vN` suffix.
  pub fn version_explicit(&self) -> bool { self.version_explicit }

  /// The layout the identifier was parsed from.
  pub fn format(&self) -> IdFormat { self.format }

  /// Replaces the category, e.g. with the authoritative one from a metadata document.
  pub fn with_category(mut self, category: Option<String>) -> Self {
    self.category = category.filter(|c| !c.is_empty());
    self
  }

  /// The identifier without its version suffix, used to query every version of a paper.
  pub fn base(&self) -> String {
    match &self.category {
      Some(category) => format!("{category}/{}", self.id_number),
      None => self.id_number.clone(),
    }
  }
}

impl fmt::Display for ArxivId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.base())?;
    if self.version_explicit {
      write!(f, "v{}", self.version)?;
    }
    Ok(())
  }
}

impl FromStr for ArxivId {
  type Err = ShelfError;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

/// Interprets a version string as an integer.
///
/// Empty or non-numeric strings count as `0`, so that any real version compares as newer.
pub fn version_number(version: &str) -> u64 {
  version.trim().trim_start_matches('v').parse().unwrap_or(0)
}

/// Extracts the identifier portion of `raw`.
///
/// Strips surrounding whitespace, an `arXiv:` prefix, URL wrappers and a trailing `.pdf`.
///
/// ```
/// use papershelf::identifier::extract_identifier;
///
/// assert_eq!(extract_identifier("http://arxiv.org/abs/cond-mat/0102536v1"), "cond-mat/0102536v1");
/// assert_eq!(extract_identifier("https://example.org/files/2101.00001.PDF"), "2101.00001");
/// ```
pub fn extract_identifier(raw: &str) -> String { clean(raw) }

/// Shared preprocessing for [`ArxivId::parse`] and [`extract_identifier`].
fn clean(raw: &str) -> String {
  let trimmed = raw.trim();
  let trimmed = match trimmed.get(..6) {
    Some(prefix) if prefix.eq_ignore_ascii_case("arxiv:") => &trimmed[6..],
    _ => trimmed,
  };

  let extracted = match Url::parse(trimmed) {
    Ok(url) if url.has_host() => from_url_path(url.path()),
    // `arxiv.org/abs/...` without a scheme
    _ => after_view_segment(trimmed).unwrap_or_else(|| trimmed.to_owned()),
  };

  strip_pdf_suffix(&extracted).to_owned()
}

/// Picks the identifier out of a URL path.
fn from_url_path(path: &str) -> String {
  after_view_segment(path).unwrap_or_else(|| {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default().to_owned()
  })
}

/// Everything after the first `/abs/` or `/pdf/`, query and fragment dropped.
fn after_view_segment(s: &str) -> Option<String> {
  let (_, rest) = VIEW_SEGMENTS.iter().find_map(|segment| s.split_once(segment))?;
  let rest = rest.split(|c| c == '?' || c == '#').next().unwrap_or_default();
  Some(rest.trim_end_matches('/').to_owned())
}

/// Removes a case-insensitive `.pdf` suffix.
fn strip_pdf_suffix(s: &str) -> &str {
  match s.len().checked_sub(4).and_then(|at| s.get(at..).map(|suffix| (at, suffix))) {
    Some((at, suffix)) if suffix.eq_ignore_ascii_case(".pdf") => &s[..at],
    _ => s,
  }
}

/// Splits at the last `v` when it is followed by nothing but digits.
fn split_version(s: &str) -> (&str, Option<&str>) {
  match s.rsplit_once('v') {
    Some((id_number, version))
      if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) =>
      (id_number, Some(version)),
    _ => (s, None),
  }
}

/// Checks whether a directory name looks like a paper identifier.
///
/// Accepts modern (`2101.00001v1`), legacy (`cond-mat/0102536v1`), underscore
/// (`math.GT_0512630`) and bare legacy number (`0102536v1`) names. The last shape is
/// what storage keys of legacy papers look like.
pub fn looks_like_identifier(name: &str) -> bool {
  lazy_static! {
    static ref MODERN: Regex = Regex::new(r"^\d{4}\.\d{4,5}(v\d+)?$").unwrap();
    static ref LEGACY: Regex = Regex::new(r"^[A-Za-z\-\.]+/\d{7}(v\d+)?$").unwrap();
    static ref UNDERSCORE: Regex = Regex::new(r"^[A-Za-z\-\.]+_\d{7}(v\d+)?$").unwrap();
    static ref NUMBER: Regex = Regex::new(r"^\d{7}(v\d+)?$").unwrap();
  }

  MODERN.is_match(name) || LEGACY.is_match(name) || UNDERSCORE.is_match(name) || NUMBER.is_match(name)
}
