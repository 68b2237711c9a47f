use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use sg_preview::config::{load_from_path, PreviewConfig};
use sg_preview::edit::atomic_write;
use sg_preview::search::{backend_from_config, SearchQuery, SearchResultStreamer};
use sg_preview::session::{ChannelHost, HostCommand};
use sg_preview::sg::detect;
use sg_preview::{Message, PreviewController};
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "sg-preview.toml";

#[derive(Parser)]
#[command(name = "sg-preview")]
#[command(about = "Replace previews for ast-grep structural search", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a sg-preview.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the preview controller over JSON lines on stdin/stdout
    Serve {
        /// Workspace root (overrides workspace_roots from the config)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// Print the diff each file would get from a rewrite
    Preview(RewriteArgs),

    /// Rewrite files in place
    Apply {
        #[command(flatten)]
        rewrite: RewriteArgs,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
}

#[derive(Args)]
struct RewriteArgs {
    /// ast-grep pattern to search for
    #[arg(short, long)]
    pattern: String,

    /// Rewrite template; matches are deleted when empty
    #[arg(short, long, default_value = "")]
    rewrite: String,

    /// Language override (otherwise inferred from each file's extension)
    #[arg(short, long)]
    lang: Option<String>,

    /// Files or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { workspace } => cmd_serve(config, workspace).await,
        Commands::Preview(args) => cmd_preview(config, args).await,
        Commands::Apply { rewrite, dry_run } => cmd_apply(config, rewrite, dry_run).await,
    }
}

/// Log to stderr so stdout stays a clean message channel for `serve`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("SG_PREVIEW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(explicit: Option<&Path>) -> Result<PreviewConfig> {
    if let Some(path) = explicit {
        return load_from_path(path).with_context(|| format!("loading {}", path.display()));
    }

    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    if fallback.exists() {
        return load_from_path(fallback).with_context(|| format!("loading {DEFAULT_CONFIG_FILE}"));
    }

    Ok(PreviewConfig::default())
}

async fn cmd_serve(mut config: PreviewConfig, workspace: Option<PathBuf>) -> Result<()> {
    if let Some(root) = workspace {
        config.workspace_roots = vec![root];
    }

    let (host, mut commands) = ChannelHost::channel();
    let mut controller = PreviewController::from_config(&config, host)
        .context("resolving workspace roots")?;

    let (inbox_tx, inbox) = mpsc::unbounded_channel();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(message) => {
                    if inbox_tx.send(message).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "ignoring malformed message"),
            }
        }
        Ok::<_, std::io::Error>(())
    });

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(command) = commands.recv().await {
            write_command(&mut stdout, &command).await?;
        }
        Ok::<_, anyhow::Error>(())
    });

    tracing::info!(roots = ?config.workspace_roots, "serving");
    controller.run(inbox).await;
    // Closes the host channel so the writer drains and exits.
    drop(controller);

    reader.await?.context("reading messages from stdin")?;
    writer.await??;
    Ok(())
}

async fn write_command(stdout: &mut tokio::io::Stdout, command: &HostCommand) -> Result<()> {
    let mut line = serde_json::to_vec(command)?;
    line.push(b'\n');
    stdout.write_all(&line).await?;
    stdout.flush().await?;
    Ok(())
}

/// Outcome of rewriting one file.
struct FileRewrite {
    path: PathBuf,
    original: Vec<u8>,
    rewritten: Vec<u8>,
    matches: usize,
}

impl FileRewrite {
    fn changed(&self) -> bool {
        self.original != self.rewritten
    }
}

async fn rewrite_files(config: &PreviewConfig, args: &RewriteArgs) -> Result<Vec<FileRewrite>> {
    let mut search = config.search.clone();
    if args.lang.is_some() {
        search.language = args.lang.clone();
    }
    let streamer = SearchResultStreamer::new(backend_from_config(&search));
    let query = SearchQuery::new(&args.pattern, &args.rewrite);

    let mut rewrites = Vec::new();
    for path in collect_files(&args.paths, &config.forbidden, search.language.as_deref())? {
        let original = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let patch = streamer
            .patch(&query, &path, &original)
            .await
            .with_context(|| format!("searching {}", path.display()))?;

        rewrites.push(FileRewrite {
            path,
            original,
            rewritten: patch.content,
            matches: patch.records.len(),
        });
    }
    Ok(rewrites)
}

/// Expand directories into the files ast-grep can parse.
///
/// Files named explicitly are always kept so an unsupported one fails loudly.
fn collect_files(
    paths: &[PathBuf],
    forbidden: &[PathBuf],
    language: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }

        let walker = WalkDir::new(path).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !forbidden.iter().any(|dir| entry.file_name() == dir.as_os_str())
        });
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && detect(entry.path(), language).is_ok() {
                files.push(entry.path().to_path_buf());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Show unified diff between original and rewritten content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn show(rewrite: &FileRewrite) {
    display_diff(
        &rewrite.path,
        &String::from_utf8_lossy(&rewrite.original),
        &String::from_utf8_lossy(&rewrite.rewritten),
    );
}

async fn cmd_preview(config: PreviewConfig, args: RewriteArgs) -> Result<()> {
    let rewrites = rewrite_files(&config, &args).await?;

    let mut changed = 0;
    for rewrite in rewrites.iter().filter(|r| r.changed()) {
        show(rewrite);
        changed += 1;
    }

    println!();
    println!(
        "{} of {} files would change",
        format!("{}", changed).green(),
        rewrites.len()
    );
    Ok(())
}

async fn cmd_apply(config: PreviewConfig, args: RewriteArgs, dry_run: bool) -> Result<()> {
    let rewrites = rewrite_files(&config, &args).await?;

    if dry_run {
        println!("{}", "[DRY RUN - showing what would be applied]".cyan());
    }

    let mut total_rewritten = 0;
    let mut total_unchanged = 0;
    let mut total_failed = 0;

    for rewrite in &rewrites {
        if !rewrite.changed() {
            total_unchanged += 1;
            continue;
        }

        if dry_run {
            println!(
                "{} Would rewrite {} ({} matches)",
                "✓".green(),
                rewrite.path.display(),
                rewrite.matches
            );
            show(rewrite);
            total_rewritten += 1;
            continue;
        }

        match atomic_write(&rewrite.path, &rewrite.rewritten) {
            Ok(()) => {
                println!(
                    "{} Rewrote {} ({} matches)",
                    "✓".green(),
                    rewrite.path.display(),
                    rewrite.matches
                );
                total_rewritten += 1;
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), rewrite.path.display(), e);
                total_failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} rewritten", format!("{}", total_rewritten).green());
    println!("  {} unchanged", format!("{}", total_unchanged).yellow());
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
