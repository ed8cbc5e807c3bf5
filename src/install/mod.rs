//! Applies an [`InstallPlan`] to the filesystem.
//!
//! All templates are rendered before anything is touched, then every
//! directory the plan needs is created, then the steps run in order. Running
//! a plan twice leaves the same tree as running it once.

mod copy;
mod symlink;

use anyhow::{Context as _, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::descriptor::{InstallPlan, InstallStep};
use crate::runtime::{Runtime, path_occupied};
use crate::template::Context;

pub use copy::copy_step;
pub use symlink::{LinkOutcome, ensure_symlink, update_opt_link};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallReport {
    pub directories: usize,
    pub files: usize,
    pub links_created: usize,
    pub links_unchanged: usize,
}

/// A step with its templates rendered.
#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    Mkdir(PathBuf),
    Copy {
        from: PathBuf,
        to: PathBuf,
    },
    Write {
        path: PathBuf,
        contents: String,
        mode: Option<u32>,
    },
    Symlink {
        target: PathBuf,
        link: PathBuf,
        relative: bool,
        force: bool,
    },
}

impl Resolved {
    fn render(step: &InstallStep, context: &Context) -> Result<Self> {
        Ok(match step {
            InstallStep::Mkdir { path } => Resolved::Mkdir(context.render_path(path)?),
            InstallStep::Copy { from, to } => Resolved::Copy {
                from: context.render_path(from)?,
                to: context.render_path(to)?,
            },
            InstallStep::Write {
                path,
                contents,
                mode,
            } => Resolved::Write {
                path: context.render_path(path)?,
                contents: context.render(contents)?,
                mode: *mode,
            },
            InstallStep::Symlink {
                target,
                link,
                relative,
                force,
            } => Resolved::Symlink {
                target: context.render_path(target)?,
                link: context.render_path(link)?,
                relative: *relative,
                force: *force,
            },
        })
    }

    /// Directory that must exist before this step runs.
    fn required_dir(&self) -> Option<PathBuf> {
        match self {
            Resolved::Mkdir(path) => Some(path.clone()),
            Resolved::Copy { to, .. } => to.parent().map(Path::to_path_buf),
            Resolved::Write { path, .. } => path.parent().map(Path::to_path_buf),
            Resolved::Symlink { link, .. } => link.parent().map(Path::to_path_buf),
        }
    }
}

#[tracing::instrument(skip(runtime, plan, context))]
pub fn apply_install_plan<R: Runtime + ?Sized>(
    runtime: &R,
    plan: &InstallPlan,
    context: &Context,
) -> Result<InstallReport> {
    let steps = plan
        .steps
        .iter()
        .map(|step| Resolved::render(step, context))
        .collect::<Result<Vec<_>>>()?;

    let mut dirs: Vec<PathBuf> = steps.iter().filter_map(Resolved::required_dir).collect();
    dirs.sort_by_key(|dir| dir.components().count());
    dirs.dedup();

    let mut report = InstallReport::default();
    for dir in &dirs {
        if !runtime.is_dir(dir) {
            debug!("Creating directory {:?}", dir);
            runtime
                .create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {:?}", dir))?;
            report.directories += 1;
        }
    }

    for step in steps {
        match step {
            Resolved::Mkdir(_) => {}
            Resolved::Copy { from, to } => {
                report.files += copy_step(runtime, &from, &to)?;
            }
            Resolved::Write {
                path,
                contents,
                mode,
            } => {
                write_file(runtime, &path, &contents, mode)?;
                report.files += 1;
            }
            Resolved::Symlink {
                target,
                link,
                relative,
                force,
            } => match ensure_symlink(runtime, &target, &link, relative, force)? {
                LinkOutcome::Unchanged => report.links_unchanged += 1,
                LinkOutcome::Created | LinkOutcome::Replaced => report.links_created += 1,
            },
        }
    }

    info!(
        "Installed {} files, {} links ({} already in place)",
        report.files, report.links_created, report.links_unchanged
    );
    Ok(report)
}

fn write_file<R: Runtime + ?Sized>(
    runtime: &R,
    path: &Path,
    contents: &str,
    mode: Option<u32>,
) -> Result<()> {
    if runtime.is_symlink(path) {
        runtime.remove_symlink(path)?;
    }
    debug!("Writing {:?}", path);
    runtime
        .write(path, contents.as_bytes())
        .with_context(|| format!("Failed to write {:?}", path))?;
    if let Some(mode) = mode {
        runtime.set_permissions(path, mode)?;
    }
    Ok(())
}

/// Outputs already occupied by something other than a link into our keg or app.
pub fn foreign_occupants<R: Runtime + ?Sized>(
    runtime: &R,
    plan: &InstallPlan,
    context: &Context,
) -> Result<Vec<PathBuf>> {
    let mut foreign = Vec::new();
    for step in &plan.steps {
        if let InstallStep::Symlink {
            link, force: false, ..
        } = step
        {
            let link = context.render_path(link)?;
            if path_occupied(runtime, &link) && !runtime.is_symlink(&link) {
                foreign.push(link);
            }
        }
    }
    Ok(foreign)
}
