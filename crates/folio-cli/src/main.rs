//! folio command-line client.
//!
//! Drives a local or cloud storage provider described by a TOML config.
//!
//! Usage:
//!   # Local working tree in the current directory
//!   folio ls /
//!   folio status
//!
//!   # Cloud project from a config file
//!   folio --config cloud.toml write /guides/setup.md < setup.md
//!   folio --config cloud.toml pending --json
//!
//!   # Apply SEARCH/REPLACE blocks from a saved chat response
//!   folio edit /guides/setup.md response.txt --dry-run

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

use folio_storage::constants::DEFAULT_CONFIG_FILE;
use folio_storage::{
    CloudStorageProvider, FolioConfig, ListOptions, LogOptions, StorageError, StorageMode,
    StorageProvider, apply_response_to_file, open_cloud_provider, open_provider,
    parse_and_match_edits,
};
use folio_types::FileEntry;

/// Local and cloud document storage from the command line.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Read, write and version documents in a folio project")]
struct Args {
    /// Config file (used when present)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Working tree root for local mode (overrides the config file)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Include dotfiles
        #[arg(short, long)]
        all: bool,
        /// Only files with these extensions (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        ext: Vec<String>,
    },
    /// Print a document
    Cat { path: String },
    /// Write stdin to a document
    Write { path: String },
    /// Delete a file or directory
    Rm { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Move a file or directory
    Mv { from: String, to: String },
    /// Check whether a path exists
    Exists { path: String },
    /// Working tree status
    Status,
    /// Commit history
    Log {
        /// Only commits touching this path
        path: Option<String>,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Stage paths (all changes when none are given)
    Add { paths: Vec<String> },
    /// Record a commit
    Commit {
        #[arg(short, long)]
        message: String,
    },
    /// Push to the remote
    Push,
    /// Pull from the remote
    Pull,
    /// Discard uncommitted changes to a path
    Restore { path: String },
    /// Current branch
    Branch,
    /// Remote URL
    Remote,
    /// Pending changes (cloud projects)
    Pending,
    /// Fold pending changes into committed content (cloud projects)
    Promote,
    /// Drop every pending change (cloud projects)
    Discard,
    /// Apply SEARCH/REPLACE blocks from a response file to a document
    Edit {
        path: String,
        response: PathBuf,
        /// Show what would match without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries command output.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e
                .downcast_ref::<StorageError>()
                .map(StorageError::kind)
                .unwrap_or("error");
            eprintln!("{kind}: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<FolioConfig> {
    let mut config = if args.config.exists() {
        FolioConfig::load(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        FolioConfig::default()
    };
    if let Some(root) = &args.root {
        config.root = Some(root.clone());
    }
    if config.mode == StorageMode::Local && config.root.is_none() {
        config.root = Some(std::env::current_dir()?);
    }
    Ok(config)
}

fn cloud_only(config: &FolioConfig, command: &str) -> Result<CloudStorageProvider> {
    if config.mode != StorageMode::Cloud {
        bail!("`{command}` needs a cloud project (mode = \"cloud\")");
    }
    Ok(open_cloud_provider(config)?)
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let json = args.json;

    match args.command {
        Command::Pending => {
            let changes = cloud_only(&config, "pending")?.pending_changes()?;
            if json {
                return print_json(&changes);
            }
            for change in changes {
                println!("{:<9} /{}", change.action, change.path);
            }
            Ok(())
        }
        Command::Promote => {
            let count = cloud_only(&config, "promote")?.promote_pending().await?;
            output(json, &count, || println!("promoted {count} change(s)"))
        }
        Command::Discard => {
            let count = cloud_only(&config, "discard")?.discard_all().await?;
            output(json, &count, || println!("discarded {count} change(s)"))
        }
        command => {
            let provider = open_provider(&config)?;
            run_provider(provider, command, json).await
        }
    }
}

async fn run_provider(
    provider: Arc<dyn StorageProvider>,
    command: Command,
    json: bool,
) -> Result<()> {
    match command {
        Command::Ls { path, all, ext } => {
            let mut options = ListOptions::default().with_extensions(ext);
            options.show_hidden = all;
            let entries = provider.list_directory(&path, &options).await?;
            if json {
                return print_json(&entries);
            }
            for entry in &entries {
                println!("{}", format_entry(entry));
            }
            Ok(())
        }
        Command::Cat { path } => {
            let content = provider.read_file(&path).await?;
            output(json, &content, || print!("{content}"))
        }
        Command::Write { path } => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("reading stdin")?;
            provider.write_file(&path, &content).await?;
            tracing::info!(path = %path, bytes = content.len(), "written");
            Ok(())
        }
        Command::Rm { path } => Ok(provider.delete_file(&path).await?),
        Command::Mkdir { path } => Ok(provider.create_directory(&path).await?),
        Command::Mv { from, to } => Ok(provider.rename(&from, &to).await?),
        Command::Exists { path } => {
            let exists = provider.exists(&path).await?;
            output(json, &exists, || println!("{exists}"))
        }
        Command::Status => {
            let status = provider.status().await?;
            if json {
                return print_json(&status);
            }
            println!(
                "On branch {} (ahead {}, behind {})",
                status.branch, status.ahead, status.behind
            );
            for entry in &status.staged {
                println!("  staged    {:<9} {}", entry.status, entry.path);
            }
            for entry in &status.unstaged {
                println!("  unstaged  {:<9} {}", entry.status, entry.path);
            }
            for path in &status.untracked {
                println!("  untracked           {path}");
            }
            Ok(())
        }
        Command::Log { path, limit } => {
            let commits = provider.log(&LogOptions { limit, path }).await?;
            if json {
                return print_json(&commits);
            }
            for commit in &commits {
                println!(
                    "{} {} <{}> {}  {}",
                    commit.short_sha,
                    commit.author.name,
                    commit.author.email,
                    commit.date,
                    commit.message
                );
            }
            Ok(())
        }
        Command::Add { paths } => Ok(provider.add(&paths).await?),
        Command::Commit { message } => {
            let sha = provider.commit(&message).await?;
            output(json, &sha, || println!("{sha}"))
        }
        Command::Push => Ok(provider.push().await?),
        Command::Pull => {
            let result = provider.pull().await?;
            output(json, &result, || {
                if result.has_conflicts() {
                    println!("conflicts:");
                    for path in &result.conflicts {
                        println!("  {path}");
                    }
                } else {
                    println!("pulled {} commit(s)", result.commits);
                }
            })
        }
        Command::Restore { path } => Ok(provider.restore(&path).await?),
        Command::Branch => {
            let branch = provider.get_current_branch().await?;
            output(json, &branch, || println!("{branch}"))
        }
        Command::Remote => {
            let remote = provider.get_remote_url().await?;
            output(json, &remote, || println!("{}", remote.as_deref().unwrap_or("(none)")))
        }
        Command::Edit {
            path,
            response,
            dry_run,
        } => edit(provider.as_ref(), &path, &response, dry_run, json).await,
        Command::Pending | Command::Promote | Command::Discard => {
            unreachable!("cloud-only commands are handled before a provider is opened")
        }
    }
}

async fn edit(
    provider: &dyn StorageProvider,
    path: &str,
    response_file: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let response = std::fs::read_to_string(response_file)
        .with_context(|| format!("reading {}", response_file.display()))?;

    if dry_run {
        let doc = provider.read_file(path).await?;
        let parsed = parse_and_match_edits(&response, &doc);
        if json {
            return print_json(&parsed);
        }
        for (index, block) in parsed.blocks.iter().enumerate() {
            match block.match_index {
                Some(at) => println!("block {index}: matches at byte {at}"),
                None => println!("block {index}: no match"),
            }
        }
        for (a, b) in &parsed.overlaps {
            println!("blocks {a} and {b} overlap");
        }
        println!(
            "+{} -{} lines",
            parsed.stats.insertions, parsed.stats.deletions
        );
        return Ok(());
    }

    let report = apply_response_to_file(provider, path, &response).await?;
    output(json, &report, || {
        println!(
            "applied {}, stale {}, unmatched {}",
            report.applied.len(),
            report.stale.len(),
            report.unmatched.len()
        )
    })
}

fn format_entry(entry: &FileEntry) -> String {
    if entry.is_dir() {
        format!("{:>10}  {}/", "-", entry.path)
    } else {
        format!("{:>10}  {}", entry.size.unwrap_or(0), entry.path)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// JSON when asked for, otherwise the human rendering.
fn output<T: Serialize + ?Sized>(json: bool, value: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        print_json(value)
    } else {
        human();
        Ok(())
    }
}
