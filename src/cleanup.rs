use log::{debug, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::runtime::{Runtime, path_occupied};

/// Scratch paths removed when an operation ends or is interrupted.
#[derive(Default)]
pub struct CleanupContext {
    #[cfg(test)]
    pub paths: Vec<PathBuf>,
    #[cfg(not(test))]
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Removes every registered path. Failures are logged, not returned.
    pub fn cleanup<R: Runtime + ?Sized>(&mut self, runtime: &R) {
        for path in self.paths.drain(..) {
            if !path_occupied(runtime, &path) {
                continue;
            }
            debug!("Cleaning up: {:?}", path);
            let result = if runtime.is_dir(&path) && !runtime.is_symlink(&path) {
                runtime.remove_dir_all(&path)
            } else {
                runtime.remove_file(&path)
            };
            if let Err(e) = result {
                warn!("Failed to clean up {:?}: {:#}", path, e);
            }
        }
    }
}

pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// On Ctrl-C, removes the registered paths and exits with status 130.
///
/// Abort the returned handle once the guarded operation has finished.
pub fn spawn_interrupt_handler<R: Runtime + Clone + 'static>(
    runtime: R,
    ctx: SharedCleanupContext,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cleaning up...");
            ctx.lock().unwrap().cleanup(&runtime);
            std::process::exit(130);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::runtime::memory::MemoryRuntime;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_cleanup_context_add_is_deduplicated() {
        let mut ctx = CleanupContext::new();
        let path = PathBuf::from("/usr/local/var/cache/rory-pkg/rory-terminal-3.0.0");

        ctx.add(path.clone());
        ctx.add(path.clone());
        assert_eq!(ctx.paths, vec![path]);
    }

    #[test]
    fn test_cleanup_removes_staging_tree() {
        let runtime = MemoryRuntime::new("/home/user", "linux");
        let staging = Path::new("/usr/local/var/cache/rory-pkg/rory-terminal-3.0.0");
        runtime.add_file(&staging.join("terminal-themes-3.0.0/README.md"), "x");

        let mut ctx = CleanupContext::new();
        ctx.add(staging.to_path_buf());
        ctx.add(PathBuf::from("/never/created"));
        ctx.cleanup(&runtime);

        assert!(!runtime.exists(staging));
        assert!(runtime.is_dir(Path::new("/usr/local/var/cache/rory-pkg")));
        assert!(ctx.paths.is_empty());
    }

    #[test]
    fn test_cleanup_on_disk() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("RoryTerminal-3.0.0.dmg");
        let sub = dir.path().join("contents");
        fs::write(&file, "image").unwrap();
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("file.txt"), "x").unwrap();

        let ctx = new_shared();
        ctx.lock().unwrap().add(file.clone());
        ctx.lock().unwrap().add(sub.clone());
        ctx.lock().unwrap().cleanup(&RealRuntime);

        assert!(!file.exists());
        assert!(!sub.exists());
    }
}
