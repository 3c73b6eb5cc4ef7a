//! Shelfsync CLI
//!
//! Offline tools for backup documents and change logs.
//!
//! # Commands
//!
//! - `fingerprint` - Print the content hash of a document
//! - `merge` - Merge a client document into a canonical one
//! - `patch` - Replay a change batch onto a document
//! - `inspect` - Display document statistics and orphans
//! - `import-kotatsu` - Convert an unpacked Kotatsu backup
//! - `timeline` / `prune-timeline` - Read and trim a stored change log

mod commands;

use clap::{Parser, Subcommand};
use commands::patch::LogSource;
use shelfsync_storage::UserId;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shelfsync command-line tools.
#[derive(Parser)]
#[command(name = "shelfsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fingerprint of a document
    Fingerprint {
        /// Document file
        doc: PathBuf,
    },

    /// Merge a client document into a canonical one
    Merge {
        /// Canonical document
        #[arg(long)]
        old: PathBuf,

        /// Client document
        #[arg(long)]
        new: PathBuf,

        /// Deletion and chapter intents (changedItems JSON)
        #[arg(long)]
        changes: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay a change batch onto a document
    Patch {
        /// Document file
        #[arg(long)]
        doc: PathBuf,

        /// Change records (sync request body or array)
        #[arg(long)]
        changes: PathBuf,

        /// Use the change log stored in this data directory
        #[arg(long, requires = "user")]
        data_dir: Option<PathBuf>,

        /// User whose change log is used
        #[arg(long)]
        user: Option<UserId>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display document statistics and orphans
    Inspect {
        /// Document file
        doc: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Convert an unpacked Kotatsu backup directory into a document
    ImportKotatsu {
        /// Directory holding the archive entries
        dir: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List change log entries, newest first
    Timeline {
        /// Data directory
        #[arg(long)]
        data_dir: PathBuf,

        /// User id
        #[arg(long)]
        user: UserId,

        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Drop change log entries older than a client timestamp
    PruneTimeline {
        /// Data directory
        #[arg(long)]
        data_dir: PathBuf,

        /// User id
        #[arg(long)]
        user: UserId,

        /// Entries with a smaller clientDate are removed
        #[arg(long)]
        before: i64,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fingerprint { doc } => commands::fingerprint::run(&doc)?,
        Commands::Merge {
            old,
            new,
            changes,
            output,
        } => commands::merge::run(&old, &new, changes.as_deref(), output.as_deref())?,
        Commands::Patch {
            doc,
            changes,
            data_dir,
            user,
            output,
        } => {
            let log = match (data_dir.as_deref(), user) {
                (Some(data_dir), Some(user)) => LogSource::Store { data_dir, user },
                (Some(_), None) => return Err("--data-dir requires --user".into()),
                (None, _) => LogSource::Memory,
            };
            commands::patch::run(&doc, &changes, log, output.as_deref())?;
        }
        Commands::Inspect { doc, format } => commands::inspect::run(&doc, &format)?,
        Commands::ImportKotatsu { dir, output } => {
            commands::import_kotatsu::run(&dir, output.as_deref())?
        }
        Commands::Timeline {
            data_dir,
            user,
            limit,
            format,
        } => commands::timeline::list(&data_dir, user, limit, &format)?,
        Commands::PruneTimeline {
            data_dir,
            user,
            before,
        } => commands::timeline::prune(&data_dir, user, before)?,
        Commands::Version => {
            println!("shelfsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Supported document versions: {}",
                shelfsync_model::SUPPORTED_VERSIONS.join(", ")
            );
        }
    }

    Ok(())
}
