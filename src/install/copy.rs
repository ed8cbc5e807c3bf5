use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::symlink::ensure_symlink;
use crate::runtime::Runtime;

fn is_glob(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

/// Copies `from` to `to`, returning the number of files copied.
///
/// When the last component of `from` is a glob, every match is copied into
/// the directory `to`; no match is not an error. Otherwise `from` must exist.
#[tracing::instrument(skip(runtime))]
pub fn copy_step<R: Runtime + ?Sized>(runtime: &R, from: &Path, to: &Path) -> Result<usize> {
    let from_str = from.to_string_lossy();
    if !is_glob(&from_str) {
        if !runtime.exists(from) {
            bail!("Source {:?} not found", from);
        }
        return copy_entry(runtime, from, to);
    }

    let (parent, pattern) = match (from.parent(), from.file_name()) {
        (Some(parent), Some(pattern)) => (parent, pattern.to_string_lossy()),
        _ => bail!("Invalid copy source {:?}", from),
    };
    if is_glob(&parent.to_string_lossy()) {
        bail!("Only the last component of {:?} may be a pattern", from);
    }
    let pattern = glob::Pattern::new(&pattern)
        .with_context(|| format!("Invalid pattern in {:?}", from))?;

    if !runtime.is_dir(parent) {
        warn!("Nothing matches {:?}", from);
        return Ok(0);
    }

    let mut matches: Vec<PathBuf> = runtime
        .read_dir(parent)?
        .into_iter()
        .filter(|entry| {
            entry
                .file_name()
                .is_some_and(|name| pattern.matches(&name.to_string_lossy()))
        })
        .collect();
    matches.sort();

    if matches.is_empty() {
        warn!("Nothing matches {:?}", from);
        return Ok(0);
    }

    runtime.create_dir_all(to)?;
    let mut copied = 0;
    for entry in matches {
        if let Some(name) = entry.file_name() {
            copied += copy_entry(runtime, &entry, &to.join(name))?;
        }
    }
    Ok(copied)
}

fn copy_entry<R: Runtime + ?Sized>(runtime: &R, src: &Path, dst: &Path) -> Result<usize> {
    if runtime.is_symlink(src) {
        let target = runtime.read_link(src)?;
        ensure_symlink(runtime, &target, dst, false, true)?;
        return Ok(0);
    }

    if runtime.is_dir(src) {
        runtime.create_dir_all(dst)?;
        let mut entries = runtime.read_dir(src)?;
        entries.sort();
        let mut copied = 0;
        for entry in entries {
            if let Some(name) = entry.file_name() {
                copied += copy_entry(runtime, &entry, &dst.join(name))?;
            }
        }
        return Ok(copied);
    }

    if runtime.is_symlink(dst) {
        runtime.remove_symlink(dst)?;
    } else if runtime.is_dir(dst) {
        bail!("Cannot copy file {:?} over directory {:?}", src, dst);
    }
    debug!("Copying {:?} to {:?}", src, dst);
    runtime
        .copy(src, dst)
        .with_context(|| format!("Failed to copy {:?} to {:?}", src, dst))?;
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::memory::MemoryRuntime;

    fn source_tree() -> MemoryRuntime {
        let runtime = MemoryRuntime::new("/home/user", "linux");
        runtime.add_file(
            Path::new("/src/core/option1-starship/theme-manager.sh"),
            "tm",
        );
        runtime.add_file(Path::new("/src/core/common.sh"), "common");
        runtime.add_file(Path::new("/src/docs/INSTALL.md"), "install");
        runtime.add_file(Path::new("/src/docs/USAGE.md"), "usage");
        runtime.add_file(Path::new("/src/docs/logo.png"), "png");
        runtime.add_dir(Path::new("/dst"));
        runtime
    }

    #[test]
    fn test_copy_directory_tree() {
        let runtime = source_tree();
        let copied = copy_step(&runtime, Path::new("/src/core"), Path::new("/dst/core")).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(
            runtime
                .file_contents(Path::new("/dst/core/option1-starship/theme-manager.sh"))
                .unwrap(),
            "tm"
        );
    }

    #[test]
    fn test_copy_glob_into_directory() {
        let runtime = source_tree();
        let copied =
            copy_step(&runtime, Path::new("/src/docs/*.md"), Path::new("/dst/doc")).unwrap();
        assert_eq!(copied, 2);
        assert!(runtime.exists(Path::new("/dst/doc/INSTALL.md")));
        assert!(runtime.exists(Path::new("/dst/doc/USAGE.md")));
        assert!(!runtime.exists(Path::new("/dst/doc/logo.png")));
    }

    #[test]
    fn test_copy_glob_without_matches_is_ok() {
        let runtime = source_tree();
        let pattern = Path::new("/src/missing/*.md");
        let copied = copy_step(&runtime, pattern, Path::new("/dst/doc")).unwrap();
        assert_eq!(copied, 0);
        assert!(!runtime.exists(Path::new("/dst/doc")));
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let runtime = source_tree();
        let err = copy_step(
            &runtime,
            Path::new("/src/LICENSE"),
            Path::new("/dst/LICENSE"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_copy_overwrites_existing_file() {
        let runtime = source_tree();
        runtime.add_file(Path::new("/dst/common.sh"), "stale");
        copy_step(
            &runtime,
            Path::new("/src/core/common.sh"),
            Path::new("/dst/common.sh"),
        )
        .unwrap();
        assert_eq!(
            runtime.file_contents(Path::new("/dst/common.sh")).unwrap(),
            "common"
        );
    }
}
