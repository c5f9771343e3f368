//! Derivation of simplified identifiers and filesystem-safe storage keys.
//!
//! A [`SimplifiedId`] drops the category of an [`ArxivId`] and keeps the version only when
//! the source text spelled one out. A [`StorageKey`] is the simplified identifier with every
//! character outside `[A-Za-z0-9_.-]` replaced by `_`; it names the paper's directory in the
//! [`Library`](crate::library::Library) and the PDF file inside it.
//!
//! # Examples
//!
//! ```
//! use papershelf::{identifier::ArxivId, key::SimplifiedId};
//!
//! let id = ArxivId::parse("cond-mat/0102536v1").unwrap();
//! assert_eq!(id.simplified().as_str(), "0102536v1");
//!
//! let id = ArxivId::parse("math.GT_0512630").unwrap();
//! assert_eq!(SimplifiedId::new(&id).storage_key().as_str(), "0512630");
//! ```

use std::fmt;

use super::*;
use crate::identifier::ArxivId;

/// An identifier with its category stripped.
///
/// Equal to `id_number`, or `id_number + "v" + version` when the identifier it came from
/// carried an explicit version marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimplifiedId(String);

impl SimplifiedId {
  /// Simplifies a parsed identifier.
  pub fn new(id: &ArxivId) -> Self {
    if id.version_explicit() {
      Self(format!("{}v{}", id.id_number(), id.version()))
    } else {
      Self(id.id_number().to_owned())
    }
  }

  /// The simplified identifier as a string slice.
  pub fn as_str(&self) -> &str { &self.0 }

  /// Derives the filesystem-safe storage key.
  pub fn storage_key(&self) -> StorageKey { StorageKey::sanitize(&self.0) }
}

impl fmt::Display for SimplifiedId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for SimplifiedId {
  fn as_ref(&self) -> &str { &self.0 }
}

/// A directory-safe rendering of a [`SimplifiedId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey(String);

impl StorageKey {
  /// Replaces every character outside `[A-Za-z0-9_.-]` with `_`.
  ///
  /// Each disallowed character, including multi-byte ones, becomes exactly one `_`.
  ///
  /// ```
  /// use papershelf::key::StorageKey;
  ///
  /// assert_eq!(StorageKey::sanitize("a b/c–d.e_f-g").as_str(), "a_b_c_d.e_f-g");
  /// ```
  pub fn sanitize(name: &str) -> Self {
    Self(
      name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect(),
    )
  }

  /// The key as a string slice.
  pub fn as_str(&self) -> &str { &self.0 }

  /// Name of the PDF file stored under this key.
  pub fn pdf_file_name(&self) -> String { format!("{}.pdf", self.0) }
}

impl fmt::Display for StorageKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for StorageKey {
  fn as_ref(&self) -> &str { &self.0 }
}

impl AsRef<Path> for StorageKey {
  fn as_ref(&self) -> &Path { Path::new(&self.0) }
}

impl ArxivId {
  /// The simplified form of this identifier, see [`SimplifiedId`].
  pub fn simplified(&self) -> SimplifiedId { SimplifiedId::new(self) }

  /// The storage key of this identifier, see [`StorageKey`].
  pub fn storage_key(&self) -> StorageKey { self.simplified().storage_key() }
}

/// Parses `raw` and returns its simplified form.
pub fn simplify(raw: &str) -> Result<SimplifiedId> { Ok(ArxivId::parse(raw)?.simplified()) }

/// Parses `raw` and returns its storage key.
pub fn storage_key(raw: &str) -> Result<StorageKey> { Ok(ArxivId::parse(raw)?.storage_key()) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_simplify_keeps_explicit_version_only() {
    assert_eq!(simplify("cond-mat/0102536v1").unwrap().as_str(), "0102536v1");
    assert_eq!(simplify("cond-mat/0102536").unwrap().as_str(), "0102536");
    assert_eq!(simplify("1909.03550v1").unwrap().as_str(), "1909.03550v1");
    assert_eq!(simplify("1909.03550").unwrap().as_str(), "1909.03550");
    assert_eq!(simplify("cs_0303006v1").unwrap().as_str(), "0303006v1");
  }

  #[test]
  fn test_explicit_and_implicit_v1_do_not_collide() {
    let explicit = simplify("2101.00001v1").unwrap();
    let implicit = simplify("2101.00001").unwrap();
    assert_ne!(explicit, implicit);
    assert_ne!(explicit.storage_key(), implicit.storage_key());
  }

  #[test]
  fn test_category_with_v_does_not_mark_version() {
    // The `v` in `solv-int` is not a version marker.
    assert_eq!(simplify("solv-int/9901001").unwrap().as_str(), "9901001");
  }

  #[test]
  fn test_simplify_is_a_fixed_point() {
    for raw in [
      "cond-mat/0102536v1",
      "cond-mat/0102536",
      "1909.03550v2",
      "1909.03550",
      "math.GT_0512630",
      "cs_0303006v1",
      "https://arxiv.org/abs/hep-th/9901001v3",
    ] {
      let once = simplify(raw).unwrap();
      let twice = simplify(once.as_str()).unwrap();
      assert_eq!(once, twice, "simplify is not stable for {raw:?}");
    }
  }

  #[test]
  fn test_sanitize_replaces_disallowed_characters() {
    let key = StorageKey::sanitize("a paper/with spaces\u{2014}and\u{201c}quotes\u{201d}.v2");
    assert_eq!(key.as_str(), "a_paper_with_spaces_and_quotes_.v2");
    assert_eq!(StorageKey::sanitize("AZaz09-_.").as_str(), "AZaz09-_.");
    assert_eq!(StorageKey::sanitize("é").as_str(), "_");
  }

  #[test]
  fn test_storage_key_is_deterministic() {
    assert_eq!(storage_key("2101.00001v1").unwrap(), storage_key("2101.00001v1").unwrap());
    assert_eq!(storage_key("2101.00001v1").unwrap().pdf_file_name(), "2101.00001v1.pdf");
  }
}
