use clap::{Parser, Subcommand, ValueEnum};
use graphdown::validation::validate_dataset_dir;
use graphdown::{
    compute_schema_fingerprint, compute_snapshot_fingerprint, export_snapshot_zip,
    load_repo_snapshot_from_zip_file, ExportMode, Snapshot, ValidationOptions, ValidationReport,
};
use std::path::PathBuf;
use std::process;

const EXIT_OK: i32 = 0;
const EXIT_INVALID: i32 = 1;
const EXIT_FAILURE: i32 = 2;

/// Graphdown CLI: validate, hash and archive Markdown datasets
#[derive(Parser)]
#[command(name = "graphdown", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Do not require a datasets/ manifest
    #[arg(long, global = true)]
    no_dataset_manifest: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Dataset directory to validate
    path: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    DatasetOnly,
    WholeRepo,
}

impl From<ModeArg> for ExportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::DatasetOnly => ExportMode::DatasetOnly,
            ModeArg::WholeRepo => ExportMode::WholeRepo,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Check a dataset directory and list every error
    Validate {
        /// Dataset directory
        path: PathBuf,
    },

    /// Print the gdhash-v1 fingerprint of a dataset
    Hash {
        /// Dataset directory
        path: PathBuf,
        /// Hash only type definitions
        #[arg(long)]
        schema_only: bool,
    },

    /// Write a dataset or repository to a zip archive
    Export {
        /// Repository directory
        path: PathBuf,
        /// Destination zip file
        #[arg(long)]
        out: PathBuf,
        /// What to include
        #[arg(long, value_enum, default_value = "dataset-only")]
        mode: ModeArg,
    },

    /// Unpack a zip archive into a directory
    Import {
        /// Source zip file
        zip: PathBuf,
        /// Destination directory
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(EXIT_FAILURE);
        }
    }
}

fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    let options = ValidationOptions {
        require_dataset_manifest: !cli.no_dataset_manifest,
    };

    let command = match (cli.command, cli.path) {
        (Some(command), _) => command,
        (None, Some(path)) => Command::Validate { path },
        (None, None) => {
            eprintln!("usage: graphdown [validate] <datasetPath>");
            eprintln!("       graphdown hash <datasetPath> [--schema-only]");
            eprintln!("       graphdown export <repoPath> --out <zip> [--mode dataset-only|whole-repo]");
            eprintln!("       graphdown import <zip> --out <dir>");
            return Ok(EXIT_FAILURE);
        }
    };

    match command {
        Command::Validate { path } => {
            let report = validate_dataset_dir(&path, &options)?;
            print_report(&report, cli.format)?;
            Ok(if report.is_ok() { EXIT_OK } else { EXIT_INVALID })
        }

        Command::Hash { path, schema_only } => {
            let snapshot = Snapshot::load_from_dir(&path)?;
            let (label, digest) = if schema_only {
                ("schema", compute_schema_fingerprint(&snapshot)?)
            } else {
                ("snapshot", compute_snapshot_fingerprint(&snapshot)?)
            };
            match cli.format {
                OutputFormat::Text => println!("{digest}"),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "algorithm": "gdhash-v1",
                        "scope": label,
                        "digest": digest,
                    }))?
                ),
            }
            Ok(EXIT_OK)
        }

        Command::Export { path, out, mode } => {
            let snapshot = Snapshot::load_from_dir(&path)?;
            let bytes = export_snapshot_zip(&snapshot, mode.into())?;
            std::fs::write(&out, &bytes)
                .map_err(|e| format!("Failed to write '{}': {e}", out.display()))?;
            log::info!("Wrote {} bytes to {}", bytes.len(), out.display());
            Ok(EXIT_OK)
        }

        Command::Import { zip, out } => {
            let snapshot = load_repo_snapshot_from_zip_file(&zip)?;
            snapshot.write_to_dir(&out)?;
            log::info!("Extracted {} files to {}", snapshot.len(), out.display());
            Ok(EXIT_OK)
        }
    }
}

fn print_report(report: &ValidationReport, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            if report.is_ok() {
                println!("OK");
            } else {
                for error in &report.errors {
                    println!("{error}");
                }
                println!("{} error(s)", report.errors.len());
            }
        }
    }
    Ok(())
}
