use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::ArchiveExtractor;
use crate::install::copy_step;
use crate::runtime::Runtime;

/// Disk images are mounted with `hdiutil` and their contents copied out.
#[derive(Default)]
pub struct DmgExtractor;

impl ArchiveExtractor for DmgExtractor {
    fn can_handle(&self, file_name: &str) -> bool {
        file_name.to_lowercase().ends_with(".dmg")
    }

    fn extract<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        bytes: &[u8],
        file_name: &str,
        dest: &Path,
    ) -> Result<PathBuf> {
        if runtime.os() != "macos" {
            bail!(
                "{} is a disk image; disk images can only be installed on macOS",
                file_name
            );
        }

        runtime.create_dir_all(dest)?;
        let image = dest.join(file_name);
        runtime
            .write(&image, bytes)
            .with_context(|| format!("Failed to write {:?}", image))?;
        let mountpoint = dest.join("mnt");
        let contents = dest.join("contents");
        runtime.create_dir_all(&mountpoint)?;

        let attach = vec![
            "attach".to_string(),
            "-nobrowse".to_string(),
            "-readonly".to_string(),
            "-noautoopen".to_string(),
            "-mountpoint".to_string(),
            mountpoint.to_string_lossy().into_owned(),
            image.to_string_lossy().into_owned(),
        ];
        let output = runtime.run_command("hdiutil", &attach)?;
        if !output.success {
            bail!("Failed to mount {}: {}", file_name, output.stderr.trim());
        }
        debug!("Mounted {} at {:?}", file_name, mountpoint);

        let copied = copy_mounted(runtime, &mountpoint, &contents);

        let detach = vec![
            "detach".to_string(),
            "-force".to_string(),
            mountpoint.to_string_lossy().into_owned(),
        ];
        match runtime.run_command("hdiutil", &detach) {
            Ok(output) if output.success => debug!("Detached {:?}", mountpoint),
            Ok(output) => warn!(
                "Failed to detach {:?}: {}",
                mountpoint,
                output.stderr.trim()
            ),
            Err(e) => warn!("Failed to detach {:?}: {:#}", mountpoint, e),
        }

        copied?;
        runtime.remove_file(&image)?;
        Ok(contents)
    }
}

/// Copies the visible top-level items of a mounted image.
fn copy_mounted<R: Runtime + ?Sized>(runtime: &R, mountpoint: &Path, to: &Path) -> Result<()> {
    runtime.create_dir_all(to)?;
    let mut entries = runtime.read_dir(mountpoint)?;
    entries.sort();
    for entry in entries {
        let Some(name) = entry.file_name() else {
            continue;
        };
        // Skip .background, .DS_Store and the /Applications shortcut
        if name.to_string_lossy().starts_with('.') || runtime.is_symlink(&entry) {
            continue;
        }
        copy_step(runtime, &entry, &to.join(name))?;
    }
    Ok(())
}
