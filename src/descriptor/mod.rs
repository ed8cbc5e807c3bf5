//! Declarative package descriptors.
//!
//! A [`Descriptor`] says where a release artifact lives, how to verify it,
//! what to place under the prefix, what to remove again, and what to tell
//! the user afterwards. Formula and cask packaging share this one type and
//! differ only in [`PackageKind`] and content.

mod artifact;
pub mod builtin;
mod plan;

use anyhow::{Context as _, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::postinstall::ThemeConfig;
use crate::runtime::Runtime;
use crate::template::Context;

pub use artifact::{ReleaseArtifact, VERSION_TOKEN, resolve_download_url, validate_version};
pub use plan::{InstallPlan, InstallStep, UninstallPlan};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// Command-line tools installed into a keg under the prefix
    Formula,
    /// Application bundle installed into the applications directory
    Cask,
}

impl std::fmt::Display for PackageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageKind::Formula => write!(f, "formula"),
            PackageKind::Cask => write!(f, "cask"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    #[default]
    Required,
    Recommended,
    Optional,
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Requirement::Required => write!(f, "required"),
            Requirement::Recommended => write!(f, "recommended"),
            Requirement::Optional => write!(f, "optional"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub level: Requirement,
    /// Executable probed on PATH; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl Dependency {
    pub fn new(name: &str, level: Requirement) -> Self {
        Self {
            name: name.to_string(),
            level,
            command: None,
        }
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }

    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or(&self.name)
    }
}

/// Optional background process registration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    pub label: String,
    /// argv; templates allowed
    pub run: Vec<String>,
    #[serde(default)]
    pub keep_alive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log_path: Option<String>,
}

/// Another package that must not be installed at the same time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Conflict {
    pub name: String,
    pub kind: PackageKind,
}

/// Default configuration file written after install if absent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConfigSeed {
    pub path: String,
    #[serde(default)]
    pub defaults: ThemeConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PostInstall {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mkdirs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSeed>,
}

/// Smoke test run against the installed commands.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TestAssertion {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Substring the combined output must contain
    pub expect: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub name: String,
    pub kind: PackageKind,
    #[serde(default)]
    pub desc: String,
    pub artifact: ReleaseArtifact,
    /// Development repository, also searched for the GitHub project
    /// when checking for newer releases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    /// Template whose existence marks the package as installed
    pub installed_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<Conflict>,
    #[serde(default)]
    pub auto_updates: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    pub install: InstallPlan,
    #[serde(default)]
    pub post_install: PostInstall,
    #[serde(default)]
    pub uninstall: UninstallPlan,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zap: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceDescriptor>,
    #[serde(default)]
    pub caveats: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<TestAssertion>,
}

impl Descriptor {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read descriptor {:?}", path))?;
        let descriptor: Descriptor = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse descriptor {:?}", path))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks everything that can be checked without a layout.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Descriptor name must not be empty");
        }
        if self.artifact.sha256.trim().is_empty() {
            bail!("Descriptor {} has an empty checksum", self.name);
        }
        self.artifact
            .download_url()
            .with_context(|| format!("Descriptor {} has an invalid artifact", self.name))?;
        if self.install.is_empty() {
            bail!("Descriptor {} has an empty install plan", self.name);
        }
        if let Some(service) = &self.service
            && (service.label.is_empty() || service.run.is_empty())
        {
            bail!("Service for {} needs both a label and a command", self.name);
        }
        Ok(())
    }

    /// Where this package is considered installed.
    pub fn installed_path(&self, context: &Context) -> Result<PathBuf> {
        context.render_path(&self.installed_path)
    }

    pub fn conflicts_with(&self, other: &Descriptor) -> bool {
        self.conflicts_with
            .iter()
            .any(|c| c.name == other.name && c.kind == other.kind)
            || other
                .conflicts_with
                .iter()
                .any(|c| c.name == self.name && c.kind == self.kind)
    }
}
