use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType};

use super::{
    ArchiveExtractor, passes_through_symlink, safe_entry_path, safe_link_target,
    strip_single_top_dir,
};
use crate::install::ensure_symlink;
use crate::runtime::Runtime;

/// Extractor for .tar.gz / .tgz archives
#[derive(Default)]
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, file_name: &str) -> bool {
        let name = file_name.to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn extract<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        bytes: &[u8],
        file_name: &str,
        dest: &Path,
    ) -> Result<PathBuf> {
        debug!("Extracting tarball {} to {:?}...", file_name, dest);
        let mut archive = Archive::new(GzDecoder::new(bytes));
        runtime.create_dir_all(dest)?;

        // Symlinks are created last so no entry is written through one.
        let mut links = Vec::new();
        let entries = archive
            .entries()
            .with_context(|| format!("Failed to read tarball {}", file_name))?;
        for entry in entries {
            let mut entry = entry.with_context(|| format!("Corrupt entry in {}", file_name))?;
            let raw_path = entry.path()?.into_owned();
            let Some(entry_path) = safe_entry_path(&raw_path) else {
                debug!("Skipping entry with unsafe path: {:?}", raw_path);
                continue;
            };
            let full_path = dest.join(&entry_path);
            let entry_type = entry.header().entry_type();
            if passes_through_symlink(runtime, dest, &entry_path) {
                warn!(
                    "Skipping {:?}: it would be written through a symlink",
                    raw_path
                );
                continue;
            }

            match entry_type {
                EntryType::Directory => runtime.create_dir_all(&full_path)?,
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    {
                        let mut out = runtime.create_file(&full_path)?;
                        std::io::copy(&mut entry, &mut out)
                            .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                        out.flush()?;
                    }
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                EntryType::Symlink => {
                    if let Some(target) = entry.link_name()? {
                        links.push((entry_path, target.into_owned()));
                    }
                }
                // GitHub tarballs carry a pax global header with the commit id
                other => debug!("Skipping {:?} entry {:?}", other, raw_path),
            }
        }

        for (entry_path, target) in links {
            if safe_link_target(&entry_path, &target).is_none() {
                warn!(
                    "Skipping symlink {:?} -> {:?}: target leaves the archive",
                    entry_path, target
                );
                continue;
            }
            if passes_through_symlink(runtime, dest, &entry_path) {
                warn!("Skipping symlink {:?}: its parent is a symlink", entry_path);
                continue;
            }
            let full_path = dest.join(&entry_path);
            if let Some(parent) = full_path.parent() {
                runtime.create_dir_all(parent)?;
            }
            ensure_symlink(runtime, &target, &full_path, false, false)?;
        }

        info!("Extraction complete.");
        strip_single_top_dir(runtime, dest)
    }
}
