//! Unpacking verified artifacts into a staging directory.
//!
//! Extractors work on bytes already held in memory so nothing is unpacked
//! before the checksum has been checked. Each returns the directory that
//! install templates see as `{source}`.

mod dmg;
mod tar_gz;
mod zip;

use anyhow::{Result, anyhow, bail};
use log::debug;
use std::path::{Component, Path, PathBuf};

use crate::runtime::Runtime;

pub use dmg::DmgExtractor;
pub use tar_gz::TarGzExtractor;
pub use zip::ZipExtractor;

/// Format-specific artifact extractor.
pub trait ArchiveExtractor: Send + Sync {
    /// Check if this extractor can handle an artifact with this file name
    fn can_handle(&self, file_name: &str) -> bool;

    /// Unpack `bytes` into `dest` and return the source root.
    fn extract<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        bytes: &[u8],
        file_name: &str,
        dest: &Path,
    ) -> Result<PathBuf>;
}

/// Dispatches to the extractor matching the artifact's file name.
#[derive(Default)]
pub struct ArchiveExtractorImpl {
    tar_gz: TarGzExtractor,
    zip: ZipExtractor,
    dmg: DmgExtractor,
}

impl ArchiveExtractorImpl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArchiveExtractor for ArchiveExtractorImpl {
    fn can_handle(&self, file_name: &str) -> bool {
        self.tar_gz.can_handle(file_name)
            || self.zip.can_handle(file_name)
            || self.dmg.can_handle(file_name)
    }

    #[tracing::instrument(skip(self, runtime, bytes))]
    fn extract<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        bytes: &[u8],
        file_name: &str,
        dest: &Path,
    ) -> Result<PathBuf> {
        if self.tar_gz.can_handle(file_name) {
            return self.tar_gz.extract(runtime, bytes, file_name, dest);
        }
        if self.zip.can_handle(file_name) {
            return self.zip.extract(runtime, bytes, file_name, dest);
        }
        if self.dmg.can_handle(file_name) {
            return self.dmg.extract(runtime, bytes, file_name, dest);
        }
        Err(anyhow!("Unsupported archive format: {}", file_name))
    }
}

/// Rejects absolute entries and entries escaping the destination.
pub(crate) fn safe_entry_path(entry: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in entry.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Resolves a symlink target against the link's directory inside the
/// archive. Absolute targets and targets climbing above the archive root
/// yield `None`.
pub(crate) fn safe_link_target(link: &Path, target: &Path) -> Option<PathBuf> {
    let mut resolved: Vec<_> = link
        .parent()
        .map(|parent| parent.components().collect())
        .unwrap_or_default();
    for component in target.components() {
        match component {
            Component::Normal(_) => resolved.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved.iter().collect())
}

/// True if `entry` or one of its ancestors below `dest` is a symlink.
pub(crate) fn passes_through_symlink<R: Runtime + ?Sized>(
    runtime: &R,
    dest: &Path,
    entry: &Path,
) -> bool {
    let mut current = dest.to_path_buf();
    entry.components().any(|component| {
        current.push(component);
        runtime.is_symlink(&current)
    })
}

/// Source archives wrap everything in one top-level directory; step into it.
pub(crate) fn strip_single_top_dir<R: Runtime + ?Sized>(
    runtime: &R,
    dir: &Path,
) -> Result<PathBuf> {
    let entries = runtime.read_dir(dir)?;
    match entries.as_slice() {
        [] => bail!("Archive appears to be empty."),
        [only] if runtime.is_dir(only) && !runtime.is_symlink(only) => {
            debug!("Using top-level directory {:?} as source", only);
            Ok(only.clone())
        }
        _ => Ok(dir.to_path_buf()),
    }
}
