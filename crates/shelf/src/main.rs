use std::path::{Path, PathBuf};

use clap::{builder::ArgAction, Parser, Subcommand};
use console::{style, Emoji};
use errors::ShelfCliError;
use papershelf::{
  config::Config,
  database::Database,
  metadata::MetadataRecord,
  paper::{PaperRecord, SearchField},
  shelf::{BatchSummary, Shelf},
};
use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

pub mod errors;

static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
static BOOKS: Emoji<'_, '_> = Emoji("📚 ", "");
static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static PAPER: Emoji<'_, '_> = Emoji("📄 ", "");
static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "");
static SUCCESS: Emoji<'_, '_> = Emoji("✨ ", "");

#[derive(Parser)]
#[command(author, version, about = "Keep a local shelf of arXiv papers and their metadata")]
struct Cli {
  /// Verbose mode (-v, -vv, -vvv)
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Configuration file, defaults to the user's config directory
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Library directory, overriding the configuration
  #[arg(long, global = true)]
  library: Option<PathBuf>,

  /// Database file, overriding the configuration
  #[arg(long, global = true)]
  db: Option<PathBuf>,

  /// Skip confirmation prompts
  #[arg(long, global = true)]
  accept_defaults: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Write a configuration file and create the library and database
  Init,
  /// Search arXiv
  Search {
    /// Query, e.g. `ti:transformer AND au:vaswani`
    query:    String,
    /// Maximum number of results
    #[arg(long, short)]
    limit:    Option<usize>,
    /// Download every result
    #[arg(long, short)]
    download: bool,
  },
  /// Download papers by arXiv identifier
  Download {
    /// Identifiers or arXiv URLs
    ids:  Vec<String>,
    /// File with one identifier per line
    #[arg(long, short)]
    file: Option<PathBuf>,
  },
  /// List every paper on the shelf
  List,
  /// Find papers on the shelf
  Find {
    /// Text to look for
    term:  String,
    /// Restrict the match to one field (title, authors, category, id)
    #[arg(long, short, value_parser = parse_field)]
    field: Option<SearchField>,
    /// Maximum number of results
    #[arg(long, short, default_value_t = 100)]
    limit: usize,
  },
  /// Import PDFs named after their arXiv identifier
  Import {
    /// Directory holding the PDFs
    dir: PathBuf,
  },
  /// Fetch metadata for papers that only have a PDF
  FetchMetadata,
  /// Download newer versions of papers on the shelf
  CheckUpdates,
  /// Record paper directories already present in the library
  Register,
  /// Remove a paper from the shelf
  Remove {
    /// Full identifier as listed
    id:           String,
    /// Also delete the paper's directory
    #[arg(long)]
    delete_files: bool,
  },
  /// Removes the entire database
  Clean,
}

/// Parses a `--field` value.
fn parse_field(s: &str) -> Result<SearchField, String> { s.parse().map_err(|e| format!("{e}")) }

/// Setup logging with the specified verbosity level
fn setup_logging(verbosity: u8) {
  let filter = match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true)
    .init();
}

/// Loads the configuration and applies the command line overrides.
fn load_config(cli: &Cli) -> Result<Config, ShelfCliError> {
  let mut config = Config::load_or_default(cli.config.as_deref())?;
  if let Some(library) = &cli.library {
    config.library_dir = library.clone();
  }
  if let Some(db) = &cli.db {
    config.database_path = db.clone();
  }
  trace!("Using configuration: {config:?}");
  Ok(config)
}

/// Asks for confirmation unless prompts are skipped.
fn confirm(accept_defaults: bool, prompt: &str) -> Result<bool, ShelfCliError> {
  if accept_defaults {
    return Ok(true);
  }
  Ok(dialoguer::Confirm::new().with_prompt(prompt).default(false).wait_for_newline(true).interact()?)
}

/// Removes the database file and its SQLite side files.
fn remove_database(path: &Path) -> Result<(), ShelfCliError> {
  std::fs::remove_file(path)?;
  for file in glob::glob(&format!("{}*", path.display()))?.flatten() {
    std::fs::remove_file(file)?;
  }
  Ok(())
}

fn print_record(index: usize, record: &PaperRecord) {
  println!("\n{}. {}", style(index + 1).yellow(), style(&record.title).white().bold());
  println!("   {} {}", style("ID:").green(), style(&record.paper_id).yellow());
  let authors = match record.authors.is_empty() {
    true => style("No authors listed").red().italic().to_string(),
    false => style(&record.authors).white().to_string(),
  };
  println!("   {} {}", style("Authors:").green(), authors);
  if let Some(category) = &record.category {
    println!("   {} {}", style("Category:").green(), style(category).cyan());
  }
  println!(
    "   {} {} ({})",
    style("Status:").green(),
    style(record.status()).cyan(),
    style(record.downloaded_at.format("%Y-%m-%d %H:%M")).dim()
  );
}

fn print_search_hit(index: usize, record: &MetadataRecord) {
  println!("\n{}. {}", style(index + 1).yellow(), style(&record.title).white().bold());
  println!("   {} {}", style("ID:").green(), style(&record.paper_id).yellow());
  println!("   {} {}", style("Authors:").green(), style(record.authors_joined()).white());
  if let Some(category) = record.category() {
    println!("   {} {}", style("Category:").green(), style(category).cyan());
  }
  if let Some(published) = &record.published {
    println!("   {} {}", style("Published:").green(), style(published).white());
  }
  if let Some(url) = &record.pdf_url {
    println!("   {} {}", style("PDF URL:").green(), style(url).blue().underlined());
  }
  if let Some(summary) = &record.summary {
    let preview = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    let preview = match preview.chars().count() > 100 {
      true => format!("{}...", preview.chars().take(100).collect::<String>()),
      false => preview,
    };
    println!("   {} {}", style("Abstract:").green(), style(preview).white().italic());
  }
}

fn print_batch(summary: &BatchSummary) {
  println!(
    "\n{} {} of {} downloaded, {} already present, {} failed",
    style(SAVE).green(),
    style(summary.succeeded).green(),
    style(summary.total).yellow(),
    style(summary.already_present).cyan(),
    style(summary.failed).red()
  );
}

#[tokio::main]
async fn main() -> Result<(), ShelfCliError> {
  let cli = Cli::parse();
  setup_logging(cli.verbose);
  let config = load_config(&cli)?;

  match cli.command {
    Commands::Init => {
      let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
      if config_path.exists() {
        println!(
          "{} Using configuration at: {}",
          style(BOOKS).cyan(),
          style(config_path.display()).yellow()
        );
      } else {
        config.save(&config_path)?;
        println!(
          "{} Wrote configuration to: {}",
          style(BOOKS).cyan(),
          style(config_path.display()).yellow()
        );
      }

      let path = &config.database_path;
      if path.exists() && !cli.accept_defaults {
        println!(
          "{} Database already exists at: {}",
          style(WARNING).yellow(),
          style(path.display()).yellow()
        );

        let reinitialize = dialoguer::Confirm::new()
          .with_prompt(
            "Do you want to reinitialize this database? This will erase all existing records",
          )
          .default(false)
          .interact()?;

        if reinitialize {
          // Require typing INIT for final confirmation
          let input = dialoguer::Input::<String>::new()
            .with_prompt(format!(
              "{} Type {} to confirm reinitialization",
              style("⚠️").red(),
              style("INIT").red().bold()
            ))
            .interact_text()?;

          if input == "INIT" {
            println!("{} Removing existing database", style(WARNING).yellow());
            remove_database(path)?;
          } else {
            println!("{} Keeping existing database", style("ℹ").blue());
          }
        } else {
          println!("{} Keeping existing database", style("ℹ").blue());
        }
      }

      trace!("Creating library directory: {}", config.library_dir.display());
      std::fs::create_dir_all(&config.library_dir)?;

      println!(
        "{} Initializing database at: {}",
        style(ROCKET).cyan(),
        style(path.display()).yellow()
      );
      Database::open(path).await?;

      println!(
        "{} Shelf initialized successfully! Library: {}",
        style(SUCCESS).green(),
        style(config.library_dir.display()).yellow()
      );
      Ok(())
    },

    Commands::Search { query, limit, download } => {
      let limit = limit.unwrap_or(config.max_results);
      let shelf = Shelf::open(config).await?;
      println!("{} Searching arXiv for: {}", style(LOOKING_GLASS).cyan(), style(&query).yellow());

      if download {
        let summary = shelf.search_and_download(&query, limit).await?;
        print_batch(&summary);
        return Ok(());
      }

      let results = shelf.search(&query, limit).await?;
      if results.is_empty() {
        println!("{} No papers found matching: {}", style(WARNING).yellow(), style(&query).yellow());
      } else {
        println!("\n{} Found {} papers:", style(SUCCESS).green(), style(results.len()).yellow());
        for (i, record) in results.iter().enumerate() {
          debug!("Search result: {record:?}");
          print_search_hit(i, record);
        }
        println!(
          "\n{} Tip: add {} to download these results",
          style("💡").yellow(),
          style("--download").yellow().italic()
        );
      }
      Ok(())
    },

    Commands::Download { ids, file } => {
      let shelf = Shelf::open(config).await?;
      let mut summary = BatchSummary::default();

      if !ids.is_empty() {
        println!("{} Downloading {} papers", style(PAPER).cyan(), style(ids.len()).yellow());
        summary = shelf.download_ids(&ids).await;
      }
      if let Some(file) = file {
        println!(
          "{} Downloading papers listed in: {}",
          style(PAPER).cyan(),
          style(file.display()).yellow()
        );
        let from_file = shelf.download_ids_from_file(&file).await?;
        summary.total += from_file.total;
        summary.succeeded += from_file.succeeded;
        summary.already_present += from_file.already_present;
        summary.failed += from_file.failed;
      }
      if summary.total == 0 {
        println!("{} Nothing to download, pass identifiers or --file", style(WARNING).yellow());
        return Ok(());
      }
      print_batch(&summary);
      Ok(())
    },

    Commands::List => {
      let shelf = Shelf::open(config).await?;
      let records = shelf.list().await?;
      if records.is_empty() {
        println!("{} The shelf is empty", style(WARNING).yellow());
      } else {
        println!("{} {} papers on the shelf:", style(BOOKS).cyan(), style(records.len()).yellow());
        for (i, record) in records.iter().enumerate() {
          print_record(i, record);
        }
      }
      Ok(())
    },

    Commands::Find { term, field, limit } => {
      let shelf = Shelf::open(config).await?;
      println!("{} Looking for: {}", style(LOOKING_GLASS).cyan(), style(&term).yellow());

      let records = shelf.find(&term, field, limit).await?;
      if records.is_empty() {
        println!("{} No papers found matching: {}", style(WARNING).yellow(), style(&term).yellow());
      } else {
        println!("\n{} Found {} papers:", style(SUCCESS).green(), style(records.len()).yellow());
        for (i, record) in records.iter().enumerate() {
          print_record(i, record);
        }
      }
      Ok(())
    },

    Commands::Import { dir } => {
      let shelf = Shelf::open(config).await?;
      println!("{} Importing PDFs from: {}", style(PAPER).cyan(), style(dir.display()).yellow());

      let summary = shelf.import_pdfs(&dir).await?;
      println!(
        "{} {} of {} imported, {} skipped, {} failed",
        style(SAVE).green(),
        style(summary.imported).green(),
        style(summary.total).yellow(),
        style(summary.skipped).cyan(),
        style(summary.failed).red()
      );
      Ok(())
    },

    Commands::FetchMetadata => {
      let shelf = Shelf::open(config).await?;
      println!("{} Fetching missing metadata", style(LOOKING_GLASS).cyan());
      let summary = shelf.fetch_missing_metadata().await?;
      if summary.total == 0 {
        println!("{} Every paper already has metadata", style(SUCCESS).green());
      } else {
        print_batch(&summary);
      }
      Ok(())
    },

    Commands::CheckUpdates => {
      let shelf = Shelf::open(config).await?;
      println!("{} Checking for newer versions", style(LOOKING_GLASS).cyan());
      let summary = shelf.check_for_updates().await?;
      println!(
        "{} {} checked, {} updated, {} current, {} failed",
        style(SUCCESS).green(),
        style(summary.total).yellow(),
        style(summary.updated).green(),
        style(summary.skipped).cyan(),
        style(summary.failed).red()
      );
      Ok(())
    },

    Commands::Register => {
      let shelf = Shelf::open(config).await?;
      println!(
        "{} Registering directories in: {}",
        style(BOOKS).cyan(),
        style(shelf.library().root().display()).yellow()
      );
      let summary = shelf.register_directories().await?;
      println!(
        "{} {} directories registered, {} with metadata, {} with PDF, {} failed",
        style(SAVE).green(),
        style(summary.total - summary.failed).yellow(),
        style(summary.with_metadata).cyan(),
        style(summary.with_pdf).cyan(),
        style(summary.failed).red()
      );
      Ok(())
    },

    Commands::Remove { id, delete_files } => {
      let shelf = Shelf::open(config).await?;
      if delete_files && !confirm(cli.accept_defaults, &format!("Delete the files of {id}?"))? {
        println!("{} Operation cancelled", style("✖").red());
        return Ok(());
      }

      if shelf.remove(&id, delete_files).await? {
        println!("{} Removed {}", style(SUCCESS).green(), style(&id).yellow());
      } else {
        println!("{} Paper not found: {}", style(WARNING).yellow(), style(&id).yellow());
      }
      Ok(())
    },

    Commands::Clean => {
      let path = config.database_path;
      if path.exists() {
        println!(
          "{} Database found at: {}",
          style(WARNING).yellow(),
          style(path.display()).yellow()
        );

        if !confirm(cli.accept_defaults, "Are you sure you want to delete this database?")? {
          println!("{} Operation cancelled", style("✖").red());
          return Ok(());
        }

        if !cli.accept_defaults {
          // Require typing DELETE for final confirmation
          let input = dialoguer::Input::<String>::new()
            .with_prompt(format!(
              "{} Type {} to confirm deletion",
              style("⚠️").red(),
              style("DELETE").red().bold()
            ))
            .interact_text()?;

          if input != "DELETE" {
            println!("{} Operation cancelled", style("✖").red());
            return Ok(());
          }
        }

        println!(
          "{} Removing database: {}",
          style(WARNING).yellow(),
          style(path.display()).yellow()
        );
        remove_database(&path)?;
        println!("{} Database files cleaned", style(SUCCESS).green());
      } else {
        println!(
          "{} No database found at: {}",
          style(WARNING).yellow(),
          style(path.display()).yellow()
        );
      }
      Ok(())
    },
  }
}
