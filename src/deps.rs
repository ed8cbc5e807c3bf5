//! Probing declared dependencies on `PATH`.

use anyhow::{Result, bail};
use log::warn;
use std::path::PathBuf;

use crate::descriptor::{Dependency, Requirement};
use crate::runtime::Runtime;

#[derive(Debug, Clone, PartialEq)]
pub struct DependencyStatus {
    pub dependency: Dependency,
    /// Where the command was found
    pub found: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyReport {
    pub statuses: Vec<DependencyStatus>,
}

impl DependencyReport {
    pub fn missing(&self, level: Requirement) -> Vec<&Dependency> {
        self.statuses
            .iter()
            .filter(|s| s.found.is_none() && s.dependency.level == level)
            .map(|s| &s.dependency)
            .collect()
    }

    /// One message per missing recommended or optional dependency.
    pub fn warnings(&self) -> Vec<String> {
        let recommended = self.missing(Requirement::Recommended).into_iter().map(|d| {
            format!(
                "Recommended dependency {} not found; some features will be unavailable",
                d.name
            )
        });
        let optional = self
            .missing(Requirement::Optional)
            .into_iter()
            .map(|d| format!("Optional dependency {} not found", d.name));
        recommended.chain(optional).collect()
    }
}

/// Looks `command` up in the runtime's `PATH`.
pub fn find_on_path<R: Runtime + ?Sized>(runtime: &R, command: &str) -> Option<PathBuf> {
    let path = runtime.env_var("PATH").ok()?;
    let separator = if runtime.os() == "windows" { ';' } else { ':' };
    path.split(separator)
        .filter(|dir| !dir.is_empty())
        .map(|dir| PathBuf::from(dir).join(command))
        .find(|candidate| runtime.exists(candidate) && !runtime.is_dir(candidate))
}

/// Probes every dependency without failing.
pub fn probe<R: Runtime + ?Sized>(runtime: &R, dependencies: &[Dependency]) -> DependencyReport {
    DependencyReport {
        statuses: dependencies
            .iter()
            .map(|dependency| DependencyStatus {
                found: find_on_path(runtime, dependency.command()),
                dependency: dependency.clone(),
            })
            .collect(),
    }
}

/// Fails if a required dependency is missing; warns about the others.
#[tracing::instrument(skip(runtime, dependencies))]
pub fn check_dependencies<R: Runtime + ?Sized>(
    runtime: &R,
    dependencies: &[Dependency],
) -> Result<DependencyReport> {
    let report = probe(runtime, dependencies);

    for message in report.warnings() {
        warn!("{}", message);
    }

    let required: Vec<&str> = report
        .missing(Requirement::Required)
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    if !required.is_empty() {
        bail!("Missing required dependencies: {}", required.join(", "));
    }
    Ok(report)
}
