use anyhow::{Context, Result, bail};
use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::{Runtime, relative_symlink_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Replaced,
    Unchanged,
}

/// Makes `link` point at `target`, reusing a correct existing link.
///
/// With `relative`, the stored target is relative to the link's directory.
/// An existing symlink pointing elsewhere is replaced. A regular file is
/// replaced only with `force`; directories are never replaced.
#[tracing::instrument(skip(runtime))]
pub fn ensure_symlink<R: Runtime + ?Sized>(
    runtime: &R,
    target: &Path,
    link: &Path,
    relative: bool,
    force: bool,
) -> Result<LinkOutcome> {
    let stored_target: PathBuf = if relative {
        relative_symlink_path(link, target).unwrap_or_else(|| target.to_path_buf())
    } else {
        target.to_path_buf()
    };

    let outcome = if runtime.is_symlink(link) {
        match runtime.read_link(link) {
            Ok(existing) if existing.components().eq(stored_target.components()) => {
                debug!("{:?} already points to {:?}", link, stored_target);
                return Ok(LinkOutcome::Unchanged);
            }
            Ok(existing) => {
                debug!(
                    "{:?} points to {:?}, but should point to {:?}. Updating...",
                    link, existing, stored_target
                );
            }
            Err(_) => debug!("{:?} is unreadable, recreating...", link),
        }
        runtime.remove_symlink(link)?;
        LinkOutcome::Replaced
    } else if runtime.exists(link) {
        if runtime.is_dir(link) {
            bail!(
                "{:?} is a directory; refusing to replace it with a symlink",
                link
            );
        }
        if !force {
            bail!(
                "{:?} already exists and is not a symlink; refusing to overwrite it",
                link
            );
        }
        debug!("Replacing regular file {:?} with a symlink", link);
        runtime.remove_file(link)?;
        LinkOutcome::Replaced
    } else {
        LinkOutcome::Created
    };

    runtime
        .symlink(&stored_target, link)
        .with_context(|| format!("Failed to link {:?} -> {:?}", link, stored_target))?;
    Ok(outcome)
}

/// Points `{prefix}/opt/<name>` at the keg of the installed version.
#[tracing::instrument(skip(runtime))]
pub fn update_opt_link<R: Runtime + ?Sized>(runtime: &R, keg: &Path, opt: &Path) -> Result<()> {
    if let Some(parent) = opt.parent() {
        runtime.create_dir_all(parent)?;
    }
    ensure_symlink(runtime, keg, opt, true, false)
        .with_context(|| format!("Failed to update {:?}", opt))?;
    Ok(())
}
