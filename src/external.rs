//! Running external commands (build, publish, git) in every module folder.
//!
//! Invocations run concurrently, are never retried, and each module's outcome
//! is reported on its own.

use colored::Colorize;
use std::path::PathBuf;

use crate::config::ModuleDescriptor;
use std::process::Stdio;
use tokio::process::Command;
use tokio::task::JoinHandle;

/// A module folder to run a command in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    pub module: String,
    pub folder: PathBuf,
}

/// Outcome of one command in one module folder.
#[derive(Debug, Clone)]
pub struct ModuleRun {
    pub module: String,
    pub folder: PathBuf,
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// A target together with the arguments passed to the program there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub target: RunTarget,
    pub args: Vec<String>,
}

/// Arguments for `git` switching a module to `requested`, or to the branch
/// configured for it. `None` when neither is known.
pub fn checkout_args(
    descriptor: &ModuleDescriptor,
    requested: Option<&str>,
) -> Option<Vec<String>> {
    let branch = requested.or(descriptor.branch.as_deref())?;
    Some(vec!["checkout".to_string(), branch.to_string()])
}

/// Run `program args..` inside each target folder concurrently.
///
/// Results come back in the order of `targets`.
pub async fn run_in_modules(
    targets: &[RunTarget],
    program: &str,
    args: &[String],
) -> Vec<ModuleRun> {
    let invocations: Vec<Invocation> = targets
        .iter()
        .map(|target| Invocation {
            target: target.clone(),
            args: args.to_vec(),
        })
        .collect();
    run_invocations(&invocations, program).await
}

/// Run `program` once per invocation, each with its own arguments.
pub async fn run_invocations(invocations: &[Invocation], program: &str) -> Vec<ModuleRun> {
    let mut handles: Vec<(RunTarget, JoinHandle<ModuleRun>)> = Vec::new();

    for invocation in invocations {
        let task_target = invocation.target.clone();
        let program = program.to_string();
        let args = invocation.args.clone();

        let handle = tokio::spawn(async move { run_one(task_target, program, args).await });
        handles.push((invocation.target.clone(), handle));
    }

    let mut results = Vec::new();
    for (target, handle) in handles {
        match handle.await {
            Ok(run) => results.push(run),
            Err(e) => {
                tracing::warn!(module = %target.module, "task panicked: {}", e);
                results.push(ModuleRun {
                    module: target.module,
                    folder: target.folder,
                    success: false,
                    code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                });
            }
        }
    }

    results
}

async fn run_one(target: RunTarget, program: String, args: Vec<String>) -> ModuleRun {
    let output = Command::new(&program)
        .args(&args)
        .current_dir(&target.folder)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    match output {
        Ok(output) => {
            if !output.status.success() {
                tracing::warn!(
                    module = %target.module,
                    code = ?output.status.code(),
                    "{} failed",
                    program
                );
            }
            ModuleRun {
                module: target.module,
                folder: target.folder,
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
        }
        Err(e) => {
            tracing::warn!(module = %target.module, "failed to run {}: {}", program, e);
            ModuleRun {
                module: target.module,
                folder: target.folder,
                success: false,
                code: None,
                stdout: String::new(),
                stderr: format!("failed to run {}: {}", program, e),
            }
        }
    }
}

/// Print per-module outcomes.
pub fn print_runs(runs: &[ModuleRun], verbose: bool) {
    for run in runs {
        let icon = if run.success {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("{} {}", icon, run.module.bright_white().bold());

        let output = if run.success { &run.stdout } else { &run.stderr };
        let lines: Vec<&str> = output.lines().collect();
        let shown = if verbose || !run.success {
            lines.len()
        } else {
            lines.len().min(3)
        };
        for line in lines.iter().take(shown) {
            println!("    {}", line.dimmed());
        }
        if shown < lines.len() {
            println!(
                "    {} {} more line(s) (use --verbose)",
                "...".dimmed(),
                (lines.len() - shown).to_string().dimmed()
            );
        }
    }
}
