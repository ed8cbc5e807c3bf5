use anyhow::{Result, bail};
use std::path::PathBuf;

use super::config::Config;
use crate::{
    archive::ArchiveExtractor,
    descriptor::ServiceDescriptor,
    download::Downloader,
    runtime::{Runtime, path_occupied},
    service::{self, ResolvedService, ServiceStatus},
};

fn declared_service<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<&ServiceDescriptor> {
    match &config.descriptor.service {
        Some(service) => Ok(service),
        None => bail!(
            "{} {} does not define a service",
            config.descriptor.kind,
            config.descriptor.name
        ),
    }
}

#[tracing::instrument(skip(config))]
pub fn services_start<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<PathBuf> {
    let service = declared_service(config)?;
    let context = config.context();
    let installed = config.descriptor.installed_path(&context)?;
    if !path_occupied(&config.runtime, &installed) {
        bail!(
            "{} is not installed; run `rory-pkg install` first",
            config.descriptor.name
        );
    }

    let resolved = ResolvedService::resolve(service, &context)?;
    let definition = service::start(&config.runtime, &resolved, &config.descriptor.desc)?;
    println!(
        "==> Successfully started {} ({})",
        resolved.label,
        definition.display()
    );
    Ok(definition)
}

#[tracing::instrument(skip(config))]
pub fn services_stop<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<bool> {
    let service = declared_service(config)?;
    let stopped = service::stop(&config.runtime, &service.label)?;
    if stopped {
        println!("==> Successfully stopped {}", service.label);
    } else {
        println!("{} is not running", service.label);
    }
    Ok(stopped)
}

pub fn services_show<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<ServiceStatus> {
    let service = declared_service(config)?;
    let status = service::status(&config.runtime, &service.label)?;

    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    println!("Label:      {}", service.label);
    println!("Manager:    {}", status.manager);
    println!("Definition: {}", status.definition.display());
    println!("Registered: {}", yes_no(status.registered));
    println!("Running:    {}", yes_no(status.running));
    Ok(status)
}
