use anyhow::{Result, anyhow};
use log::{debug, warn};
use semver::Version;
use std::io::Cursor;
use std::path::Path;

use super::config::Config;
use crate::{
    archive::ArchiveExtractor,
    descriptor::PackageKind,
    download::Downloader,
    livecheck::{GitHubRepo, LatestRelease},
    runtime::{Runtime, path_occupied},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutdatedOptions {
    /// Also report packages that update themselves
    pub greedy: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutdatedReport {
    pub installed: Option<String>,
    pub latest: String,
    pub outdated: bool,
}

fn bundle_version<R: Runtime + ?Sized>(runtime: &R, info_plist: &Path) -> Option<String> {
    let bytes = runtime.read(info_plist).ok()?;
    let value = plist::Value::from_reader(Cursor::new(bytes)).ok()?;
    value
        .as_dictionary()?
        .get("CFBundleShortVersionString")?
        .as_string()
        .map(str::to_string)
}

/// The version currently installed, if any.
///
/// Formulae report the keg `opt` points at, casks the bundle's
/// `CFBundleShortVersionString`. Otherwise an installed package is assumed to
/// be at the descriptor's version.
pub fn installed_version<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<Option<String>> {
    let descriptor = &config.descriptor;
    let runtime = &config.runtime;
    let installed = descriptor.installed_path(&config.context())?;

    match descriptor.kind {
        PackageKind::Formula => {
            let opt = config.layout.opt(&descriptor.name);
            if runtime.is_symlink(&opt) {
                let keg = runtime.read_link(&opt)?;
                if let Some(version) = keg.file_name() {
                    return Ok(Some(version.to_string_lossy().into_owned()));
                }
            }
        }
        PackageKind::Cask => {
            let info_plist = installed.join("Contents/Info.plist");
            if let Some(version) = bundle_version(runtime, &info_plist) {
                return Ok(Some(version));
            }
            debug!("No bundle version in {:?}", info_plist);
        }
    }

    Ok(path_occupied(runtime, &installed).then(|| descriptor.artifact.version.clone()))
}

/// Compares the installed version with the newest GitHub release.
#[tracing::instrument(skip(config, releases))]
pub async fn outdated<R, D, E, L>(
    config: &Config<R, D, E>,
    releases: &L,
    options: &OutdatedOptions,
) -> Result<OutdatedReport>
where
    R: Runtime,
    D: Downloader,
    E: ArchiveExtractor,
    L: LatestRelease,
{
    let descriptor = &config.descriptor;
    let repo = GitHubRepo::for_descriptor(descriptor).ok_or_else(|| {
        anyhow!(
            "{} {} has no GitHub homepage or head to check for releases",
            descriptor.kind,
            descriptor.name
        )
    })?;
    let latest = releases.latest_release(&repo).await?.version()?;

    let Some(installed) = installed_version(config)? else {
        println!(
            "{} is not installed; the latest release is {}",
            descriptor.name, latest
        );
        return Ok(OutdatedReport {
            installed: None,
            latest: latest.to_string(),
            outdated: false,
        });
    };

    let newer = match Version::parse(&installed) {
        Ok(current) => latest > current,
        Err(e) => {
            warn!(
                "Installed version {} is not a semantic version: {}",
                installed, e
            );
            installed != latest.to_string()
        }
    };
    let outdated = newer && (options.greedy || !descriptor.auto_updates);

    if outdated {
        println!("{} ({}) < {}", descriptor.name, installed, latest);
    } else if newer {
        println!(
            "{} ({}) < {}, skipped because it updates itself (use --greedy)",
            descriptor.name, installed, latest
        );
    } else {
        println!("{} ({}) is up to date", descriptor.name, installed);
    }

    Ok(OutdatedReport {
        installed: Some(installed),
        latest: latest.to_string(),
        outdated,
    })
}
