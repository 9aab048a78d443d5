use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::command::{Command, CommandGetter};
use crate::console::Console;
use crate::error::Error;

/// How a batch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every accepted file already satisfied the policy.
    NothingToDo,
    /// The operator declined; nothing was executed.
    Aborted,
    /// The operator confirmed and every command was attempted.
    Executed,
}

/// Counters describing one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    /// Commands collected during discovery.
    pub planned: usize,
    /// Commands whose execution was started.
    pub attempted: usize,
    /// Commands that completed without error.
    pub succeeded: usize,
    /// Files (or directory entries) that could not be inspected.
    pub skipped: usize,
    /// `"<description> (<error>)"` for every failed command, in execution order.
    pub failures: Vec<String>,
}

impl BatchReport {
    fn new(outcome: BatchOutcome, planned: usize, skipped: usize) -> Self {
        BatchReport {
            outcome,
            planned,
            attempted: 0,
            succeeded: 0,
            skipped,
            failures: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

pub const PREVIEW_HEADER: &str = "The following operations will be performed :";
pub const CONFIRM_QUESTION: &str =
    "The operation is not reversible. Do you wish to continue ? (y/N): ";
pub const NOTHING_TO_DO: &str = "There is no operation to be performed";
pub const ABORTED: &str = "The operation was aborted, no changes were made";

/// Walks `root_dir` recursively, asks `cmd_getter` for a command for every
/// file accepted by `predicate`, previews the collected commands and, once
/// the operator confirmed, executes them in discovery order.
///
/// Files that cannot be inspected are reported and skipped. A fatal getter
/// error (see [`Error::is_fatal`]) aborts the run before anything is shown.
/// A failing command does not stop the following ones.
pub fn update_files<P, G, C>(
    root_dir: impl AsRef<Path>,
    predicate: P,
    cmd_getter: &G,
    console: &mut C,
) -> Result<BatchReport, Error>
where
    P: Fn(&Path) -> bool,
    G: CommandGetter + ?Sized,
    C: Console + ?Sized,
{
    let root_dir = root_dir.as_ref();
    if !root_dir.is_dir() {
        return Err(Error::InvalidOptions(format!(
            "Input path is not a valid directory: {:?}",
            root_dir
        )));
    }

    // 1. Discover
    info!("Discovering files in {:?}...", root_dir);
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message("inspected");

    let mut commands = Vec::new();
    let mut skipped = 0;
    for entry in WalkDir::new(root_dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let shown = e
                    .path()
                    .map(|p| relative_display(root_dir, p))
                    .unwrap_or_else(|| root_dir.display().to_string());
                warn!("Cannot read directory entry {}: {}", shown, e);
                spinner.suspend(|| console.print(&format!("SKIPPED : {} ({})", shown, e)));
                skipped += 1;
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !predicate(path) {
            continue;
        }
        spinner.inc(1);
        debug!("Inspecting {:?}", path);
        match cmd_getter.get_command(path) {
            Ok(Some(command)) => commands.push(command),
            Ok(None) => debug!("Nothing to do for {:?}", path),
            Err(e) if e.is_fatal() => {
                spinner.finish_and_clear();
                error!("{}", e);
                return Err(e);
            }
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                spinner.suspend(|| {
                    console.print(&format!(
                        "SKIPPED : {} ({})",
                        relative_display(root_dir, path),
                        e
                    ))
                });
                skipped += 1;
            }
        }
    }
    spinner.finish_and_clear();
    info!(
        "Found {} operations to perform, {} files skipped.",
        commands.len(),
        skipped
    );

    // 2. Preview and confirm
    if commands.is_empty() {
        console.print(NOTHING_TO_DO);
        return Ok(BatchReport::new(BatchOutcome::NothingToDo, 0, skipped));
    }

    console.print(PREVIEW_HEADER);
    for command in &commands {
        console.print(&command.description());
    }

    if !console.confirm(CONFIRM_QUESTION) {
        console.print(ABORTED);
        info!("Batch aborted by the operator.");
        return Ok(BatchReport::new(
            BatchOutcome::Aborted,
            commands.len(),
            skipped,
        ));
    }

    // 3. Execute
    let mut report = BatchReport::new(BatchOutcome::Executed, commands.len(), skipped);
    for command in commands {
        let description = command.description();
        report.attempted += 1;
        match command.execute() {
            Ok(()) => {
                report.succeeded += 1;
                console.print(&format!("DONE : {}", description));
            }
            Err(e) => {
                error!("{}: {}", description, e);
                console.print(&format!("FAILED : {} ({})", description, e));
                report.failures.push(format!("{} ({})", description, e));
            }
        }
    }

    console.print(&format!(
        "{}/{} operations were performed with success.",
        report.succeeded, report.attempted
    ));
    info!(
        "Batch complete. {} operations succeeded, {} failed.",
        report.succeeded,
        report.failed()
    );
    Ok(report)
}

fn relative_display(root_dir: &Path, path: &Path) -> String {
    pathdiff::diff_paths(path, root_dir)
        .filter(|relative| !relative.as_os_str().is_empty())
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
