//! Applies an [`UninstallPlan`].
//!
//! Absent paths are not errors, so removing a package twice is the same as
//! removing it once. Paths that exist but cannot be removed are collected
//! and reported together at the end.

use anyhow::{Result, bail};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::descriptor::UninstallPlan;
use crate::runtime::Runtime;
use crate::template::Context;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UninstallReport {
    pub removed: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

#[tracing::instrument(skip(runtime, plan, context))]
pub fn apply_uninstall_plan<R: Runtime + ?Sized>(
    runtime: &R,
    plan: &UninstallPlan,
    context: &Context,
) -> Result<UninstallReport> {
    let delete = plan
        .delete
        .iter()
        .map(|path| context.render_path(path))
        .collect::<Result<Vec<_>>>()?;
    let rmdir = plan
        .rmdir
        .iter()
        .map(|path| context.render_path(path))
        .collect::<Result<Vec<_>>>()?;

    for label in &plan.launchctl {
        unload_service(runtime, label);
    }
    for bundle_id in &plan.quit {
        quit_application(runtime, bundle_id);
    }

    let mut report = UninstallReport::default();
    let mut failures = Vec::new();

    for path in delete {
        match remove_path(runtime, &path) {
            Ok(true) => {
                info!("Removed {:?}", path);
                report.removed.push(path);
            }
            Ok(false) => {
                debug!("{:?} does not exist, skipping", path);
                report.missing.push(path);
            }
            Err(e) => failures.push(format!("{}: {:#}", path.display(), e)),
        }
    }

    for dir in rmdir {
        if !runtime.is_dir(&dir) || runtime.is_symlink(&dir) {
            report.missing.push(dir);
            continue;
        }
        match runtime.read_dir(&dir) {
            Ok(entries) if !entries.is_empty() => {
                debug!("{:?} is not empty, keeping it", dir);
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                failures.push(format!("{}: {:#}", dir.display(), e));
                continue;
            }
        }
        match runtime.remove_dir(&dir) {
            Ok(()) => report.removed.push(dir),
            Err(e) => failures.push(format!("{}: {:#}", dir.display(), e)),
        }
    }

    if !failures.is_empty() {
        bail!("Failed to remove:\n  {}", failures.join("\n  "));
    }
    Ok(report)
}

/// Returns `false` if nothing was there.
fn remove_path<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<bool> {
    if runtime.is_symlink(path) {
        runtime.remove_symlink(path)?;
    } else if runtime.is_dir(path) {
        runtime.remove_dir_all(path)?;
    } else if runtime.exists(path) {
        runtime.remove_file(path)?;
    } else {
        return Ok(false);
    }
    Ok(true)
}

fn unload_service<R: Runtime + ?Sized>(runtime: &R, label: &str) {
    if runtime.os() != "macos" {
        debug!("Skipping launchctl for {} on {}", label, runtime.os());
        return;
    }
    let args = vec!["remove".to_string(), label.to_string()];
    match runtime.run_command("launchctl", &args) {
        Ok(output) if output.success => debug!("Unloaded {}", label),
        Ok(output) => debug!("launchctl remove {}: {}", label, output.stderr.trim()),
        Err(e) => warn!("Failed to run launchctl for {}: {:#}", label, e),
    }
}

fn quit_application<R: Runtime + ?Sized>(runtime: &R, bundle_id: &str) {
    if runtime.os() != "macos" {
        return;
    }
    let script = format!("tell application id \"{}\" to quit", bundle_id);
    let args = vec!["-e".to_string(), script];
    match runtime.run_command("osascript", &args) {
        Ok(output) if output.success => debug!("Quit {}", bundle_id),
        Ok(output) => debug!("Could not quit {}: {}", bundle_id, output.stderr.trim()),
        Err(e) => warn!("Failed to run osascript for {}: {:#}", bundle_id, e),
    }
}
