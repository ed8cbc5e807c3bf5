use anyhow::{Context as _, Result};
use log::{debug, info};

use super::config::Config;
use crate::{
    archive::ArchiveExtractor,
    descriptor::UninstallPlan,
    download::Downloader,
    runtime::{Runtime, path_occupied},
    service,
    uninstall::{UninstallReport, apply_uninstall_plan},
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UninstallOptions {
    /// Also remove configuration and user data
    pub zap: bool,
    pub yes: bool,
}

/// Removes the package. Running it again once everything is gone is a no-op.
///
/// Returns `None` if the user declined.
#[tracing::instrument(skip(config))]
pub fn uninstall<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
    options: UninstallOptions,
) -> Result<Option<UninstallReport>> {
    let runtime = &config.runtime;
    let descriptor = &config.descriptor;
    let context = config.context();

    let installed = descriptor.installed_path(&context)?;
    if !path_occupied(runtime, &installed) {
        println!("{} {} is not installed", descriptor.kind, descriptor.name);
    }

    if options.zap && !options.yes {
        let prompt = format!(
            "Remove {} and all of its configuration and user data?",
            descriptor.name
        );
        if !runtime.confirm(&prompt)? {
            println!("Uninstall cancelled.");
            return Ok(None);
        }
    }

    if let Some(service) = &descriptor.service
        && service::stop(runtime, &service.label)
            .with_context(|| format!("Failed to stop service {}", service.label))?
    {
        println!("==> Stopped service {}", service.label);
    }

    let fallback;
    let plan = if descriptor.uninstall.is_empty() {
        debug!("No uninstall plan, removing {:?}", installed);
        fallback = UninstallPlan::delete_only(std::slice::from_ref(&descriptor.installed_path));
        &fallback
    } else {
        &descriptor.uninstall
    };
    let mut report = apply_uninstall_plan(runtime, plan, &context)?;
    if options.zap {
        debug!("Zapping {} paths", descriptor.zap.len());
        let zapped =
            apply_uninstall_plan(
                runtime,
                &UninstallPlan::delete_only(&descriptor.zap),
                &context,
            )?;
        report.removed.extend(zapped.removed);
        report.missing.extend(zapped.missing);
    }

    for path in &report.removed {
        println!("Removed {}", path.display());
    }
    println!(
        "==> Uninstalled {} ({} paths removed)",
        descriptor.name,
        report.removed.len()
    );
    info!("Uninstalled {}", descriptor.name);
    Ok(Some(report))
}
