//! Object Store CLI
//!
//! Validates, normalizes, fingerprints and compares object-store XML files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rx_objectstore::config::{ObjectStoreConfig, OutputFormat};
use rx_objectstore::document::{diff_documents, validate_tree, DiffTag};
use rx_objectstore::validation::{validate, ValidationReport};
use rx_objectstore::xml::WriteOptions;
use rx_objectstore::ObjectDocument;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "objectstore")]
#[command(about = "Validate and inspect object-store XML documents")]
struct Cli {
    /// Configuration file (layered over the default locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate documents (directories are searched for *.xml)
    Validate {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rewrite a document in normalized form
    Format {
        file: PathBuf,
        /// Single-line output
        #[arg(long)]
        compact: bool,
        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the fingerprint of each document
    Fingerprint {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show what changed between two documents
    Diff { old: PathBuf, new: PathBuf },

    /// List data sets of an application that answer the same request
    Duplicates { file: PathBuf },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration to a file
    Init {
        #[arg(default_value = "objectstore.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match ObjectStoreConfig::load_from(cli.config.as_deref().and_then(Path::to_str)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    match run(cli, config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `false` when the command completed but found problems
fn run(cli: Cli, mut config: ObjectStoreConfig) -> Result<bool> {
    match cli.command {
        Commands::Validate { paths, strict, json } => {
            if strict {
                config.validation.warnings_as_errors = true;
            }
            let mut reports = Vec::new();
            for path in &paths {
                if path.is_dir() {
                    reports.extend(validate_tree(path, &config.validation));
                } else {
                    let document = load(path)?;
                    let report = validate(&document, &config.validation)
                        .into_report(path.display().to_string());
                    reports.push(report);

                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                print_reports(&reports);
            }
            Ok(reports.iter().all(ValidationReport::is_valid))
        }

        Commands::Format {
            file,
            compact,
            output,
        } => {
            let document = load(&file)?;
            let mut options = WriteOptions::from(&config.output);
            if compact {
                options.format = OutputFormat::Compact;
            }
            let text = document.to_xml_string(&options)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("✅ Wrote {}", path.display());
                }
                None => println!("{}", text),
            }
            Ok(true)
        }

        Commands::Fingerprint { files } => {
            for file in &files {
                let document = load(file)?;
                println!("{}  {}", document.fingerprint()?, file.display());
            }
            Ok(true)
        }

        Commands::Diff { old, new } => {
            let old_doc = load(&old)?;
            let new_doc = load(&new)?;
            if old_doc == new_doc {
                println!("✅ No changes");
                return Ok(true);
            }

            println!("--- {}", old.display());
            println!("+++ {}", new.display());
            for line in diff_documents(&old_doc, &new_doc)? {
                match line.tag {
                    DiffTag::Removed => println!("-{}", line.line),
                    DiffTag::Added => println!("+{}", line.line),
                    DiffTag::Unchanged => println!(" {}", line.line),
                }
            }
            Ok(false)
        }

        Commands::Duplicates { file } => {
            let document = load(&file)?;
            let Some(app) = document.as_application() else {
                bail!("{} holds a <{}>, not an application", file.display(), document.node_name());
            };

            let duplicates = app.find_duplicate_request_pages();
            if duplicates.is_empty() {
                println!("✅ No duplicate request pages in {}", app.name());
                return Ok(true);
            }
            println!("❌ {} duplicate request page(s) in {}:", duplicates.len(), app.name());
            for (i, j) in duplicates {
                let (a, b) = (&app.data_sets()[i], &app.data_sets()[j]);
                let page = a.requestor.as_ref().map(|r| r.request_page()).unwrap_or_default();
                println!("   └─ '{}' and '{}' on '{}'", a.name(), b.name(), page);
            }
            Ok(false)
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(true)
            }
            ConfigAction::Init { path, force } => {
                if path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", path.display());
                }
                let path_str = path.to_str().context("configuration path is not valid UTF-8")?;
                ObjectStoreConfig::default()
                    .save(path_str)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("✅ Wrote default configuration to {}", path.display());
                Ok(true)
            }
        },
    }
}

fn load(path: &Path) -> Result<ObjectDocument> {
    ObjectDocument::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn print_reports(reports: &[ValidationReport]) {
    let mut failed = 0;
    for report in reports {
        if report.is_valid() {
            println!("✅ {}", report.subject);
        } else {
            failed += 1;
            println!("❌ {}", report.subject);
        }
        for issue in &report.errors {
            println!("   └─ error [{}] {}: {}", issue.code, issue.path, issue.message);
        }
        for issue in &report.warnings {
            println!("   └─ warning [{}] {}: {}", issue.code, issue.path, issue.message);
        }
    }
    println!();
    if failed == 0 {
        println!("✅ {} document(s) valid", reports.len());
    } else {
        println!("❌ {} of {} document(s) invalid", failed, reports.len());
    }
}
