use serde::{Deserialize, Serialize};

/// One install directive. Paths are templates rendered against the layout.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InstallStep {
    /// Create a directory (and its parents).
    Mkdir { path: String },
    /// Copy a file or directory tree to `to`. A glob `from` copies every
    /// match into the directory `to`.
    Copy { from: String, to: String },
    /// Write generated contents, e.g. a wrapper script.
    Write {
        path: String,
        contents: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<u32>,
    },
    /// Point `link` at `target`.
    Symlink {
        target: String,
        link: String,
        /// Store the target relative to the link's directory
        #[serde(default)]
        relative: bool,
        /// Replace a regular file occupying `link`
        #[serde(default)]
        force: bool,
    },
}

impl InstallStep {
    pub fn copy(from: &str, to: &str) -> Self {
        Self::Copy {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn executable(path: &str, contents: &str) -> Self {
        Self::Write {
            path: path.to_string(),
            contents: contents.to_string(),
            mode: Some(0o755),
        }
    }

    pub fn relative_symlink(target: &str, link: &str) -> Self {
        Self::Symlink {
            target: target.to_string(),
            link: link.to_string(),
            relative: true,
            force: false,
        }
    }

    pub fn forced_symlink(target: &str, link: &str) -> Self {
        Self::Symlink {
            target: target.to_string(),
            link: link.to_string(),
            relative: false,
            force: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct InstallPlan {
    pub steps: Vec<InstallStep>,
}

impl InstallPlan {
    pub fn new(steps: Vec<InstallStep>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// What to stop and delete when a package is removed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct UninstallPlan {
    /// Service labels to unload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub launchctl: Vec<String>,
    /// Application bundle identifiers to quit (macOS)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quit: Vec<String>,
    /// Files, symlinks or directory trees to remove
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,
    /// Directories to remove only if empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rmdir: Vec<String>,
}

impl UninstallPlan {
    pub fn is_empty(&self) -> bool {
        self.launchctl.is_empty()
            && self.quit.is_empty()
            && self.delete.is_empty()
            && self.rmdir.is_empty()
    }

    /// Plan that only deletes the given paths (used for zap).
    pub fn delete_only(paths: &[String]) -> Self {
        Self {
            delete: paths.to_vec(),
            ..Self::default()
        }
    }
}
