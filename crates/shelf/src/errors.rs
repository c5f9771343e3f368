//! Error types for the shelf CLI application.
//!
//! The CLI wraps errors from the papershelf library, user prompts, the file system and glob
//! patterns. Every variant is transparent so the user sees the underlying message.

use thiserror::Error;

/// Errors that can occur during CLI operations.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
///
/// use shelf::errors::ShelfCliError;
///
/// # fn example() -> Result<(), ShelfCliError> {
/// std::fs::create_dir_all(PathBuf::from("some/path"))?;
/// let confirmed = dialoguer::Confirm::new().with_prompt("Continue?").interact()?;
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum ShelfCliError {
  /// Errors from user interaction dialogs
  #[error(transparent)]
  Dialoguer(#[from] dialoguer::Error),

  /// Errors from the underlying papershelf library
  #[error(transparent)]
  Shelf(#[from] papershelf::errors::ShelfError),

  /// File system and IO operation errors
  #[error(transparent)]
  IO(#[from] std::io::Error),

  /// Glob pattern matching errors
  #[error(transparent)]
  Glob(#[from] glob::PatternError),
}
