//! # gql-weave
//!
//! CLI tool that merges GraphQL schema fragments and generates TypeScript
//! schema and resolver types.
//!
//! ## Usage
//!
//! ```bash
//! # Merge fragments and write every artifact once
//! gql-weave generate
//!
//! # Use other fragment locations
//! gql-weave generate --schema 'api/**/*.graphql' --schema 'shared/*.graphql'
//!
//! # Preview without writing
//! gql-weave generate --dry-run
//!
//! # Development mode: regenerate and reload on every schema change
//! gql-weave watch
//!
//! # Fail (exit code 2) when the artifacts on disk are stale
//! gql-weave check
//!
//! # Initialize configuration
//! gql-weave init
//! ```

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use gql_weave::{
    artifact::{ArtifactId, ArtifactSet},
    config::{CliArgs, Config, ConfigManager, CONFIG_FILENAME},
    error::{WeaveError, WeaveResult},
    host::{FsHost, Host},
    pipeline::Pipeline,
    watcher::{FileWatcher, RoundOutcome, WatchSession},
    writer::{ArtifactWriter, WriteResult},
};

#[derive(Parser)]
#[command(name = "gql-weave")]
#[command(author, version, about = "Merge GraphQL schema fragments and generate TypeScript types", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Log errors only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the schema and write every artifact once
    Generate {
        #[command(flatten)]
        project: ProjectArgs,

        /// Preview changes without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Watch schema fragments, regenerating and reloading on change
    Watch {
        #[command(flatten)]
        project: ProjectArgs,

        /// Debounce window for filesystem events, in milliseconds
        #[arg(long)]
        debounce: Option<u64>,
    },

    /// Check that the artifacts on disk are up-to-date
    Check {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Initialize a new gql-weave configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        output: PathBuf,

        /// Overwrite existing configuration file
        #[arg(long)]
        force: bool,
    },
}

/// Options shared by every command that runs the pipeline.
#[derive(Args)]
struct ProjectArgs {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project root for relative schema patterns
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Schema fragment glob (repeatable, replaces configured patterns)
    #[arg(short, long)]
    schema: Vec<String>,

    /// Output directory for generated artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disallow extra keys on resolver argument types
    #[arg(long)]
    no_index_signature: bool,
}

impl ProjectArgs {
    fn load(&self, debounce_ms: Option<u64>) -> WeaveResult<Config> {
        let config = ConfigManager::load(self.config.as_deref())?;
        Ok(ConfigManager::merge_cli_args(
            config,
            &CliArgs {
                root: self.root.clone(),
                schema: self.schema.clone(),
                output: self.output.clone(),
                use_index_signature: self.no_index_signature.then_some(false),
                debounce_ms,
            },
        ))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.quiet, cli.verbose) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            match e {
                WeaveError::Validation(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("GQL_WEAVE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn run(cli: Cli) -> WeaveResult<()> {
    match cli.command {
        Commands::Generate { project, dry_run } => cmd_generate(project.load(None)?, dry_run),
        Commands::Watch { project, debounce } => cmd_watch(project.load(debounce)?),
        Commands::Check { project } => cmd_check(project.load(None)?),
        Commands::Init { output, force } => cmd_init(output, force),
    }
}

fn runtime() -> WeaveResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Run one regeneration round outside watch mode.
fn build_once(config: &Config) -> WeaveResult<ArtifactSet> {
    let pipeline = Pipeline::new(config)?;
    runtime()?.block_on(pipeline.regenerate())
}

/// Generate command implementation.
fn cmd_generate(config: Config, dry_run: bool) -> WeaveResult<()> {
    println!("{}", "Merging schema fragments...".cyan());

    let artifacts = build_once(&config)?;

    let mut host = FsHost::new(config, ArtifactWriter::new(dry_run));
    host.on_ready(&artifacts)?;

    for result in host.take_results() {
        print_write_result(result);
    }

    Ok(())
}

/// Watch command implementation.
fn cmd_watch(config: Config) -> WeaveResult<()> {
    let pipeline = Pipeline::new(&config)?;
    let watcher =
        FileWatcher::for_patterns(pipeline.patterns()).with_debounce(config.watch.debounce_ms);

    println!("{}", "Starting watch mode...".cyan());
    for root in watcher.roots() {
        println!("  Watching: {}", root.display());
    }
    println!("  Patterns: {}", config.schema.to_vec().join(", "));
    println!("  Press Ctrl+C to stop\n");

    let host = FsHost::new(config, ArtifactWriter::new(false));

    runtime()?.block_on(async move {
        let mut session = WatchSession::new(pipeline, host);

        // Arm the watcher first so edits made during the initial build are seen.
        let (_handle, mut rx) = watcher.watch()?;

        match session.start(&mut rx).await {
            RoundOutcome::Failed(e) => {
                println!("{} {}", "Initial build failed:".red(), e);
                println!("  Fix the schema; artifacts are written on the first good build");
            }
            RoundOutcome::Ready | RoundOutcome::Reloaded => {
                println!("{} Artifacts ready", "✓".green());
            }
        }

        println!("\n{}", "Watching for changes...".cyan());

        let stats = session.run(rx).await;
        tracing::info!(
            rounds = stats.rounds,
            coalesced = stats.coalesced,
            ignored = stats.ignored,
            "watch stopped"
        );
        Ok::<(), WeaveError>(())
    })
}

/// Check command implementation.
fn cmd_check(config: Config) -> WeaveResult<()> {
    println!("{}", "Checking generated artifacts...".cyan());

    let artifacts = build_once(&config)?;

    let mut stale = Vec::new();
    for id in ArtifactId::ALL {
        let path = config.artifact_path(id);
        let current = std::fs::read_to_string(&path).ok();
        if current.as_deref() == Some(artifacts.get(id).content.as_str()) {
            println!("  {} {}", "✓".green(), path.display());
        } else {
            println!("  {} {}", "✗".red(), path.display());
            stale.push(id.as_str());
        }
    }

    if stale.is_empty() {
        println!("{} Artifacts are up-to-date", "✓".green());
        Ok(())
    } else {
        println!("  Run 'gql-weave generate' to update");
        Err(WeaveError::Validation(format!(
            "Artifacts are out of date: {}",
            stale.join(", ")
        )))
    }
}

/// Init command implementation.
fn cmd_init(output: PathBuf, force: bool) -> WeaveResult<()> {
    if output.exists() && !force {
        println!(
            "{} Configuration file already exists: {}",
            "Error:".red(),
            output.display()
        );
        println!("  Use --force to overwrite");
        return Err(WeaveError::Validation(
            "Configuration file already exists".to_string(),
        ));
    }

    std::fs::write(&output, ConfigManager::default_config_content())?;

    println!(
        "{} Created configuration file: {}",
        "✓".green(),
        output.display()
    );

    Ok(())
}

fn print_write_result(result: WriteResult) {
    match result {
        WriteResult::Written { path, bytes } => {
            println!(
                "{} Written {} bytes to {}",
                "✓".green(),
                bytes,
                path.display()
            );
        }
        WriteResult::Unchanged { path } => {
            println!("{} Unchanged {}", "·".dimmed(), path.display());
        }
        WriteResult::DryRun { path, content } => {
            println!(
                "{} Would write to {}:",
                "[dry-run]".yellow(),
                path.display()
            );
            println!("{}", "─".repeat(60).dimmed());
            println!("{}", content);
            println!("{}", "─".repeat(60).dimmed());
        }
    }
}

/// Print an error with formatting.
fn print_error(error: &WeaveError) {
    eprintln!("{} {}", "Error:".red().bold(), error);
    if let WeaveError::SchemaParse(e) = error {
        if let (Some(line), Some(column)) = (e.line, e.column) {
            eprintln!("  at merged schema {}:{}", line, column);
        }
    }
}
