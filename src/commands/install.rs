use anyhow::{Context as _, Result, bail};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::config::Config;
use crate::{
    archive::ArchiveExtractor,
    caveats::render_caveats,
    checksum::ensure_checksum,
    cleanup::{self, SharedCleanupContext, spawn_interrupt_handler},
    deps::check_dependencies,
    descriptor::{Descriptor, PackageKind, ReleaseArtifact, builtin, validate_version},
    download::Downloader,
    install::{InstallReport, apply_install_plan, foreign_occupants, update_opt_link},
    layout::Layout,
    postinstall::post_install,
    runtime::{Runtime, path_occupied},
    service::{self, ResolvedService},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallOptions {
    pub version: Option<String>,
    pub sha256: Option<String>,
    /// URL template replacing the descriptor's; must contain `{version}`
    pub url: Option<String>,
    pub service: bool,
    pub yes: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    Installed {
        version: String,
        report: InstallReport,
        config_written: bool,
        service: Option<PathBuf>,
    },
    Cancelled,
}

/// The descriptor's artifact with command-line overrides applied.
pub fn effective_artifact(
    descriptor: &Descriptor,
    options: &InstallOptions,
) -> Result<ReleaseArtifact> {
    let mut artifact = descriptor.artifact.clone();
    if let Some(version) = &options.version {
        validate_version(version)?;
        if *version != artifact.version && options.sha256.is_none() {
            bail!(
                "Installing {} {} requires --sha256; the descriptor's checksum is for {}",
                descriptor.name,
                version,
                artifact.version
            );
        }
        artifact = artifact.with_version(version, &artifact.sha256);
    }
    if let Some(sha256) = &options.sha256 {
        artifact.sha256 = sha256.clone();
    }
    if let Some(url) = &options.url {
        artifact.url = url.clone();
    }
    Ok(artifact)
}

/// Fails if a package this one conflicts with is already installed.
pub fn check_conflicts<R: Runtime>(
    runtime: &R,
    layout: &Layout,
    descriptor: &Descriptor,
) -> Result<()> {
    for other in builtin::all() {
        if other.name == descriptor.name && other.kind == descriptor.kind {
            continue;
        }
        if !descriptor.conflicts_with(&other) {
            continue;
        }
        let installed =
            other.installed_path(&layout.context(&other.name, &other.artifact.version))?;
        debug!("Checking for conflicting {} at {:?}", other.kind, installed);
        if path_occupied(runtime, &installed) {
            bail!(
                "{} {} conflicts with the installed {} {} ({:?}); uninstall it first",
                descriptor.kind,
                descriptor.name,
                other.kind,
                other.name,
                installed
            );
        }
    }
    Ok(())
}

#[tracing::instrument(skip(config, options))]
pub async fn install<R, D, E>(
    config: &Config<R, D, E>,
    options: &InstallOptions,
) -> Result<InstallOutcome>
where
    R: Runtime + Clone + 'static,
    D: Downloader,
    E: ArchiveExtractor,
{
    let descriptor = &config.descriptor;
    let artifact = effective_artifact(descriptor, options)?;
    let url = artifact.download_url()?;
    let file_name = artifact.file_name()?;

    if !options.yes {
        let target = match descriptor.kind {
            PackageKind::Formula => &config.layout.prefix,
            PackageKind::Cask => &config.layout.appdir,
        };
        let prompt = format!(
            "Install {} {} ({}) into {}?",
            descriptor.name,
            artifact.version,
            descriptor.kind,
            target.display()
        );
        if !config.runtime.confirm(&prompt)? {
            println!("Installation cancelled.");
            return Ok(InstallOutcome::Cancelled);
        }
    }

    println!("==> Downloading {}", url);
    let bytes = config
        .downloader
        .fetch(&url)
        .await
        .with_context(|| format!("Failed to download {}", url))?;
    ensure_checksum(&file_name, &bytes, &artifact.sha256)?;

    check_conflicts(&config.runtime, &config.layout, descriptor)?;
    check_dependencies(&config.runtime, &descriptor.dependencies)?;

    let staging = config.layout.staging(&descriptor.name, &artifact.version);
    let cleanup_ctx = cleanup::new_shared();
    let handler = spawn_interrupt_handler(config.runtime.clone(), cleanup_ctx.clone());

    let result = stage_and_apply(
        config,
        options,
        &artifact,
        &bytes,
        &file_name,
        &staging,
        &cleanup_ctx,
    );

    handler.abort();
    cleanup_ctx.lock().unwrap().cleanup(&config.runtime);
    let outcome = result?;

    if let InstallOutcome::Installed { report, .. } = &outcome {
        println!(
            "==> Installed {} {} ({} files, {} links)",
            descriptor.name,
            artifact.version,
            report.files,
            report.links_created + report.links_unchanged
        );
    }
    Ok(outcome)
}

fn stage_and_apply<R, D, E>(
    config: &Config<R, D, E>,
    options: &InstallOptions,
    artifact: &ReleaseArtifact,
    bytes: &[u8],
    file_name: &str,
    staging: &Path,
    cleanup_ctx: &SharedCleanupContext,
) -> Result<InstallOutcome>
where
    R: Runtime,
    D: Downloader,
    E: ArchiveExtractor,
{
    let runtime = &config.runtime;
    let descriptor = &config.descriptor;
    let layout = &config.layout;

    if path_occupied(runtime, staging) {
        debug!("Removing stale staging directory {:?}", staging);
        runtime.remove_dir_all(staging)?;
    }
    cleanup_ctx.lock().unwrap().add(staging.to_path_buf());
    runtime.create_dir_all(staging)?;

    let source = config
        .extractor
        .extract(runtime, bytes, file_name, staging)
        .with_context(|| format!("Failed to unpack {}", file_name))?;
    let context = layout.install_context(&descriptor.name, &artifact.version, &source);

    let foreign = foreign_occupants(runtime, &descriptor.install, &context)?;
    if !foreign.is_empty() {
        let list: Vec<String> = foreign.iter().map(|p| p.display().to_string()).collect();
        bail!(
            "Refusing to overwrite files not managed by rory-pkg:\n  {}",
            list.join("\n  ")
        );
    }

    println!("==> Installing {} {}", descriptor.name, artifact.version);
    let report = apply_install_plan(runtime, &descriptor.install, &context)?;
    if descriptor.kind == PackageKind::Formula {
        update_opt_link(
            runtime,
            &layout.keg(&descriptor.name, &artifact.version),
            &layout.opt(&descriptor.name),
        )?;
    }

    let config_written = post_install(runtime, &descriptor.post_install, &context)?;

    let service = match (&descriptor.service, options.service) {
        (Some(service), true) => {
            let resolved = ResolvedService::resolve(service, &context)?;
            Some(service::start(runtime, &resolved, &descriptor.desc)?)
        }
        (None, true) => {
            warn!(
                "{} {} has no service to start",
                descriptor.kind, descriptor.name
            );
            None
        }
        _ => None,
    };

    let caveats = render_caveats(descriptor, &context)?;
    if !caveats.is_empty() {
        println!("==> Caveats\n{}", caveats);
    }
    info!("Installed {} {}", descriptor.name, artifact.version);

    Ok(InstallOutcome::Installed {
        version: artifact.version.clone(),
        report,
        config_written,
        service,
    })
}
