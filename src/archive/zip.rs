use anyhow::{Context, Result};
use log::{debug, info};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use super::{ArchiveExtractor, safe_entry_path, strip_single_top_dir};
use crate::runtime::Runtime;

/// Extractor for .zip archives
#[derive(Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn can_handle(&self, file_name: &str) -> bool {
        file_name.to_lowercase().ends_with(".zip")
    }

    fn extract<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        bytes: &[u8],
        file_name: &str,
        dest: &Path,
    ) -> Result<PathBuf> {
        debug!("Extracting zip archive {} to {:?}...", file_name, dest);
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).context("Failed to parse ZIP archive")?;
        runtime.create_dir_all(dest)?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .with_context(|| format!("Failed to read ZIP entry {}", i))?;

            let Some(entry_path) = entry.enclosed_name().and_then(|p| safe_entry_path(&p))
            else {
                debug!("Skipping entry with invalid path: {}", entry.name());
                continue;
            };
            let full_path = dest.join(&entry_path);

            if entry.is_dir() {
                runtime.create_dir_all(&full_path)?;
                continue;
            }
            if let Some(parent) = full_path.parent() {
                runtime.create_dir_all(parent)?;
            }
            {
                let mut out = runtime.create_file(&full_path)?;
                std::io::copy(&mut entry, &mut out)
                    .with_context(|| format!("Failed to extract file {:?}", full_path))?;
                out.flush()?;
            }
            if let Some(mode) = entry.unix_mode()
                && let Err(e) = runtime.set_permissions(&full_path, mode & 0o7777)
            {
                debug!("Failed to set permissions on {:?}: {}", full_path, e);
            }
        }

        info!("Extraction complete.");
        strip_single_top_dir(runtime, dest)
    }
}
