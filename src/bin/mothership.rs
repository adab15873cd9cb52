use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use mothership::config::CONFIG_FILE;
use mothership::coordinator::OperationReport;
use mothership::external::{self, Invocation, RunTarget};
use mothership::workspace::discover_modules;
use mothership::{git, Coordinator, Level, ModuleDescriptor, WorkspaceConfig};

#[derive(Parser)]
#[command(
    name = "mothership",
    version,
    about = "Coordinate versions and manifests across the modules of a workspace"
)]
struct Cli {
    /// Workspace root containing .modules.config
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Increment the version of every module (default: patch level)
    IncrementVersion {
        #[arg(default_value = "patch", value_parser = parse_level)]
        level: Level,

        /// Show the changes without writing them
        #[arg(long)]
        dry_run: bool,

        /// Do not commit the written manifests
        #[arg(long)]
        no_commit: bool,
    },

    /// Create a release branch taking the current module configurations
    Tag {
        /// Release label (default: each module's own version)
        label: Option<String>,

        /// Write manifests only, without creating branches or commits
        #[arg(long)]
        no_commit: bool,
    },

    /// Rewrite all manifests from the current versions and commit them
    Bump {
        #[arg(long)]
        no_commit: bool,
    },

    /// Check that workspace dependencies match the modules' versions
    CheckVersions,

    /// Git status for all modules
    Status,

    /// Run the configured build command in every module
    Build,

    /// Run the configured publish command in every module
    Publish,

    /// Pull every module
    Pull,

    /// Push every module
    Push,

    /// Check out a branch, or each module's configured branch, in every module
    Checkout {
        /// Branch to check out (default: the branch in .modules.config)
        branch: Option<String>,
    },

    /// Pull every module, then run the build command
    Update,

    /// Execute a git command in every module
    Git {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Write .modules.config from the module folders found under the root
    Init {
        /// Manifest filename to look for
        #[arg(long, default_value = "package.json")]
        manifest: String,
    },
}

fn parse_level(s: &str) -> std::result::Result<Level, String> {
    s.parse::<Level>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "mothership=debug"
    } else {
        "mothership=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let root = cli.root;
    let verbose = cli.verbose;

    match cli.command {
        Commands::Init { manifest } => init(&root, &manifest),
        Commands::IncrementVersion {
            level,
            dry_run,
            no_commit,
        } => {
            let report = open(&root)?.increment_all(level, dry_run)?;
            report.print();
            if dry_run || no_commit {
                return Ok(ExitCode::SUCCESS);
            }
            Ok(commit_written(&report, &format!("Increment {} version", level)))
        }
        Commands::Tag { label, no_commit } => {
            let report = open(&root)?.tag(label.as_deref())?;
            report.print();
            if no_commit {
                return Ok(ExitCode::SUCCESS);
            }
            Ok(release_written(&report))
        }
        Commands::Bump { no_commit } => {
            let report = open(&root)?.bump()?;
            report.print();
            if no_commit {
                return Ok(ExitCode::SUCCESS);
            }
            Ok(commit_written(&report, "Bump module versions"))
        }
        Commands::CheckVersions => {
            let report = open(&root)?.check()?;
            report.print();
            Ok(if report.has_issues() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Status => Ok(status(&open(&root)?, verbose)),
        Commands::Build => {
            let coordinator = open(&root)?;
            let command = coordinator.config().commands.build.clone();
            run_everywhere(&coordinator, &command, verbose).await
        }
        Commands::Publish => {
            let coordinator = open(&root)?;
            let command = coordinator.config().commands.publish.clone();
            run_everywhere(&coordinator, &command, verbose).await
        }
        Commands::Git { args } => Ok(exit_code(run_git(&open(&root)?, &args, verbose).await)),
        Commands::Pull => Ok(exit_code(run_git(&open(&root)?, &git_args("pull"), verbose).await)),
        Commands::Push => Ok(exit_code(run_git(&open(&root)?, &git_args("push"), verbose).await)),
        Commands::Checkout { branch } => checkout(&open(&root)?, branch.as_deref(), verbose).await,
        Commands::Update => {
            let coordinator = open(&root)?;
            if !run_git(&coordinator, &git_args("pull"), verbose).await {
                return Ok(ExitCode::from(1));
            }
            let command = coordinator.config().commands.build.clone();
            run_everywhere(&coordinator, &command, verbose).await
        }
    }
}

/// Module folders that exist on disk, in configuration order.
fn cloned_modules(coordinator: &Coordinator) -> Vec<(&ModuleDescriptor, RunTarget)> {
    let config = coordinator.config();
    config
        .modules
        .iter()
        .map(|m| {
            let target = RunTarget {
                module: m.name.clone(),
                folder: config.module_folder(coordinator.root(), m),
            };
            (m, target)
        })
        .filter(|(_, t)| t.folder.is_dir())
        .collect()
}

fn git_args(subcommand: &str) -> Vec<String> {
    vec![subcommand.to_string()]
}

/// Run `git args..` in every cloned module; `true` when all succeeded.
async fn run_git(coordinator: &Coordinator, args: &[String], verbose: bool) -> bool {
    let targets: Vec<RunTarget> = cloned_modules(coordinator)
        .into_iter()
        .map(|(_, target)| target)
        .collect();
    let runs = external::run_in_modules(&targets, "git", args).await;
    external::print_runs(&runs, verbose);
    runs.iter().all(|r| r.success)
}

async fn checkout(
    coordinator: &Coordinator,
    branch: Option<&str>,
    verbose: bool,
) -> Result<ExitCode> {
    let mut invocations = Vec::new();
    for (descriptor, target) in cloned_modules(coordinator) {
        match external::checkout_args(descriptor, branch) {
            Some(args) => invocations.push(Invocation { target, args }),
            None => println!(
                "  {} {} (no branch configured)",
                "skipped".dimmed(),
                descriptor.name
            ),
        }
    }

    let runs = external::run_invocations(&invocations, "git").await;
    external::print_runs(&runs, verbose);
    Ok(exit_code(runs.iter().all(|r| r.success)))
}

fn open(root: &Path) -> Result<Coordinator> {
    Coordinator::open(root).context("Failed to load workspace")
}

/// Commit every written manifest in its module's repository.
fn commit_written(report: &OperationReport, message: &str) -> ExitCode {
    let mut ok = true;
    for written in &report.written {
        if !git::is_repository(&written.folder) {
            tracing::info!(module = %written.module, "not a git repository, skipping commit");
            continue;
        }
        match git::commit_paths(&written.folder, &[written.path.clone()], message) {
            Ok(Some(oid)) => println!("  {} {} {}", "committed".green(), written.module, oid),
            Ok(None) => println!("  {} {}", "unchanged".dimmed(), written.module),
            Err(e) => {
                ok = false;
                eprintln!("  {} {}: {:#}", "✗".red(), written.module, e);
            }
        }
    }
    exit_code(ok)
}

/// Create the release branch of every written manifest and commit it there.
fn release_written(report: &OperationReport) -> ExitCode {
    let mut ok = true;
    for written in &report.written {
        let Some(label) = written.label.as_deref() else {
            continue;
        };
        if !git::is_repository(&written.folder) {
            tracing::info!(module = %written.module, "not a git repository, skipping branch");
            continue;
        }
        match git::commit_release(&written.folder, label, &[written.path.clone()]) {
            Ok(_) => println!("  {} {} on {}", "released".green(), written.module, label),
            Err(e) => {
                ok = false;
                eprintln!("  {} {}: {:#}", "✗".red(), written.module, e);
            }
        }
    }
    exit_code(ok)
}

fn status(coordinator: &Coordinator, verbose: bool) -> ExitCode {
    let config = coordinator.config();
    for module in &config.modules {
        let folder = config.module_folder(coordinator.root(), module);
        if !folder.is_dir() {
            println!("{} {}", "-".dimmed(), format!("{} (missing)", module.name).dimmed());
            continue;
        }
        match git::status(&folder) {
            Ok(status) => {
                let icon = if status.is_dirty {
                    "✗".yellow()
                } else {
                    "✓".green()
                };
                println!(
                    "{} {} {}",
                    icon,
                    module.name.bright_white().bold(),
                    format!("[{}]", status.branch).dimmed()
                );
                if status.is_dirty {
                    println!("    {} dirty file(s)", status.dirty_files.len());
                    if verbose {
                        for file in &status.dirty_files {
                            println!("    • {}", file.dimmed());
                        }
                    }
                }
            }
            Err(e) => println!("{} {}: {:#}", "?".red(), module.name, e),
        }
    }
    ExitCode::SUCCESS
}

async fn run_everywhere(
    coordinator: &Coordinator,
    command: &[String],
    verbose: bool,
) -> Result<ExitCode> {
    let Some((program, args)) = command.split_first() else {
        bail!("Empty command in {}", CONFIG_FILE);
    };

    let table = coordinator.table()?;
    let targets: Vec<RunTarget> = table
        .entries()
        .map(|entry| RunTarget {
            module: entry.name().to_string(),
            folder: entry.folder.clone(),
        })
        .collect();

    let runs = external::run_in_modules(&targets, program, args).await;
    external::print_runs(&runs, verbose);
    Ok(exit_code(runs.iter().all(|r| r.success)))
}

fn init(root: &Path, manifest: &str) -> Result<ExitCode> {
    if root.join(CONFIG_FILE).exists() {
        bail!("{} already exists in {}", CONFIG_FILE, root.display());
    }

    let modules = discover_modules(root, manifest)?;
    if modules.is_empty() {
        bail!("No folders containing {} found under {}", manifest, root.display());
    }

    let mut config = WorkspaceConfig::new(modules);
    config.manifest = manifest.to_string();
    let path = config.save(root)?;

    println!(
        "{} {} module(s) written to {}",
        "✓".green().bold(),
        config.modules.len(),
        path.display().to_string().bright_white()
    );
    for module in &config.modules {
        println!("  {} {}", module.name, module.folder.display().to_string().dimmed());
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
