//! Install locations under a prefix.

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;
use crate::template::Context;

/// Resolved install locations.
///
/// ```text
/// {prefix}/bin                         links to wrapper scripts
/// {prefix}/Cellar/<name>/<version>     keg (libexec, bin)
/// {prefix}/opt/<name> -> Cellar/...    stable path to the current keg
/// {prefix}/etc, {prefix}/var           configuration and runtime data
/// {prefix}/share/doc/<name>            documentation
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub prefix: PathBuf,
    pub appdir: PathBuf,
    pub home: PathBuf,
}

impl Layout {
    pub fn new(prefix: PathBuf, appdir: PathBuf, home: PathBuf) -> Self {
        Self {
            prefix,
            appdir,
            home,
        }
    }

    /// Builds a layout from optional overrides, falling back to defaults.
    #[tracing::instrument(skip(runtime))]
    pub fn resolve<R: Runtime>(
        runtime: &R,
        prefix: Option<PathBuf>,
        appdir: Option<PathBuf>,
    ) -> Result<Self> {
        let home = runtime.home_dir().context("Could not find home directory")?;
        let prefix = match prefix {
            Some(prefix) => prefix,
            None => default_prefix(runtime)?,
        };
        let appdir = match appdir {
            Some(appdir) => appdir,
            None if runtime.is_privileged() => PathBuf::from("/Applications"),
            None => home.join("Applications"),
        };
        Ok(Self::new(prefix, appdir, home))
    }

    pub fn bin(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn etc(&self) -> PathBuf {
        self.prefix.join("etc")
    }

    pub fn var(&self) -> PathBuf {
        self.prefix.join("var")
    }

    pub fn cellar(&self, name: &str) -> PathBuf {
        self.prefix.join("Cellar").join(name)
    }

    pub fn keg(&self, name: &str, version: &str) -> PathBuf {
        self.cellar(name).join(version)
    }

    pub fn opt(&self, name: &str) -> PathBuf {
        self.prefix.join("opt").join(name)
    }

    pub fn doc(&self, name: &str) -> PathBuf {
        self.prefix.join("share/doc").join(name)
    }

    pub fn bash_completion(&self) -> PathBuf {
        self.prefix.join("etc/bash_completion.d")
    }

    pub fn zsh_completion(&self) -> PathBuf {
        self.prefix.join("share/zsh/site-functions")
    }

    pub fn fish_completion(&self) -> PathBuf {
        self.prefix.join("share/fish/vendor_completions.d")
    }

    /// Scratch space for unpacking artifacts.
    pub fn cache(&self) -> PathBuf {
        self.var().join("cache/rory-pkg")
    }

    pub fn staging(&self, name: &str, version: &str) -> PathBuf {
        self.cache().join(format!("{}-{}", name, version))
    }

    /// Template context for a package version.
    pub fn context(&self, name: &str, version: &str) -> Context {
        let keg = self.keg(name, version);
        Context::new()
            .with("name", name)
            .with("version", version)
            .with_path("prefix", &self.prefix)
            .with_path("bin", &self.bin())
            .with_path("etc", &self.etc())
            .with_path("var", &self.var())
            .with_path("cellar", &self.cellar(name))
            .with_path("libexec", &keg.join("libexec"))
            .with_path("keg", &keg)
            .with_path("opt", &self.opt(name))
            .with_path("doc", &self.doc(name))
            .with_path("bash_completion", &self.bash_completion())
            .with_path("zsh_completion", &self.zsh_completion())
            .with_path("fish_completion", &self.fish_completion())
            .with_path("appdir", &self.appdir)
            .with_home(&self.home)
    }

    /// Context that additionally knows where the artifact was unpacked.
    pub fn install_context(&self, name: &str, version: &str, source: &Path) -> Context {
        self.context(name, version).with_path("source", source)
    }
}

/// `~/.local` for regular users, a system prefix when privileged.
pub fn default_prefix<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if runtime.is_privileged() {
        Ok(system_prefix())
    } else {
        let home = runtime.home_dir().context("Could not find home directory")?;
        Ok(home.join(".local"))
    }
}

#[cfg(target_os = "macos")]
fn system_prefix() -> PathBuf {
    if cfg!(target_arch = "aarch64") {
        PathBuf::from("/opt/homebrew")
    } else {
        PathBuf::from("/usr/local")
    }
}

#[cfg(target_os = "windows")]
fn system_prefix() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\rory-pkg")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn system_prefix() -> PathBuf {
    PathBuf::from("/usr/local")
}
