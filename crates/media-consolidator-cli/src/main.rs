use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use media_consolidator_core::{organize, Config, Consolidator, DupAction};

#[derive(Parser)]
#[command(name = "media-consolidator")]
#[command(about = "Consolidate scattered photos and videos into one tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a root folder, rename media to canonical names, segregate duplicates
    Consolidate {
        /// Root folder to scan recursively
        root: PathBuf,

        /// Name of the destination subtree created under the root
        #[arg(long, default_value = "all_photos")]
        dest_name: String,

        /// Run without making changes
        #[arg(long)]
        dry_run: bool,

        /// Folder-name substring to exclude from the scan (repeatable)
        #[arg(long = "exclude")]
        excluded: Vec<String>,

        /// Place files into per-year subfolders of the destination
        #[arg(long)]
        organize_by_year: bool,

        /// Skip content hashing; confirm duplicates by timestamp and size only
        #[arg(long)]
        no_hash: bool,

        /// What to do with confirmed duplicates
        #[arg(long, value_enum, default_value = "move")]
        dup_action: DupActionArg,

        /// Prefer the newest metadata date instead of the oldest
        #[arg(long)]
        prefer_newest: bool,

        /// Path or command name of the exiftool binary
        #[arg(long, default_value = "exiftool")]
        exiftool: String,

        /// Do not use exiftool; derive timestamps from file mtimes
        #[arg(long)]
        no_exiftool: bool,

        /// Per-file exiftool timeout in seconds
        #[arg(long, default_value_t = 10)]
        exiftool_timeout: u64,

        /// Write a CSV log of every outcome to this path
        #[arg(long)]
        log_csv: Option<PathBuf>,

        /// Number of worker threads (0 = auto)
        #[arg(long, default_value_t = 0)]
        threads: usize,

        /// Path to a JSON configuration file; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Move canonically named files of a flat destination into year folders
    OrganizeYears {
        /// The destination folder produced by a consolidate run
        dest_root: PathBuf,

        /// Run without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "media-consolidator.json")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum DupActionArg {
    Move,
    Skip,
    Delete,
}

impl From<DupActionArg> for DupAction {
    fn from(arg: DupActionArg) -> Self {
        match arg {
            DupActionArg::Move => DupAction::Move,
            DupActionArg::Skip => DupAction::Skip,
            DupActionArg::Delete => DupAction::Delete,
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Initialize logger
    env_logger::init();

    // Parse command line arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::Consolidate {
            root,
            dest_name,
            dry_run,
            excluded,
            organize_by_year,
            no_hash,
            dup_action,
            prefer_newest,
            exiftool,
            no_exiftool,
            exiftool_timeout,
            log_csv,
            threads,
            config,
        } => {
            // Set up configuration
            let mut config = if let Some(config_path) = config {
                // Load config from file
                Config::from_file(&config_path)?
            } else {
                Config::default()
            };

            // Override config with command line arguments
            config.dry_run = dry_run;
            config.dest_name = dest_name;
            config.organize_by_year = organize_by_year;
            config.hash_duplicates = !no_hash;
            config.dup_action = dup_action.into();
            config.prefer_newest = prefer_newest;
            config.exiftool = exiftool;
            config.no_exiftool = no_exiftool;
            config.exiftool_timeout_secs = exiftool_timeout;
            config.threads = threads;
            if !excluded.is_empty() {
                config.excluded_folders = excluded;
            }
            if log_csv.is_some() {
                config.log_csv = log_csv;
            }

            let consolidator = Consolidator::new(config, &root)?;

            info!("Starting media consolidation...");
            let summary = consolidator.run()?;
            info!("Consolidation complete");

            println!(
                "Renamed: {} | Duplicates: {} | In place: {} | Excluded: {} | Unsupported: {} | Failed: {}",
                summary.renamed,
                summary.duplicates,
                summary.already_in_place,
                summary.skipped_excluded,
                summary.skipped_unsupported,
                summary.failed
            );

            // File-scoped failures are reported, never silently dropped;
            // they surface in the exit status as well
            if summary.has_failures() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::OrganizeYears { dest_root, dry_run } => {
            let summary = organize::organize_by_year(&dest_root, dry_run)?;
            println!("Moved: {} | Skipped: {}", summary.moved, summary.skipped);
            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}
