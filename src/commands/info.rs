use anyhow::{Context as _, Result, bail};
use std::path::Path;

use super::config::Config;
use crate::{
    archive::ArchiveExtractor,
    caveats::render_caveats,
    checksum::{ensure_checksum, sha256_hex},
    deps::{DependencyReport, probe},
    descriptor::{Requirement, resolve_download_url},
    download::Downloader,
    postinstall,
    runtime::Runtime,
};

/// Prints the download URL for the descriptor's version or `version`.
pub fn url<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
    version: Option<&str>,
) -> Result<String> {
    let artifact = &config.descriptor.artifact;
    let url = resolve_download_url(&artifact.url, version.unwrap_or(&artifact.version))?;
    println!("{}", url);
    Ok(url)
}

/// Checks a downloaded artifact against `sha256` or the descriptor's checksum.
#[tracing::instrument(skip(config))]
pub fn verify<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
    file: &Path,
    sha256: Option<&str>,
) -> Result<String> {
    let bytes = config
        .runtime
        .read(file)
        .with_context(|| format!("Failed to read {:?}", file))?;
    let actual = sha256_hex(&bytes);
    println!("{}  {}", actual, file.display());

    let expected = sha256.unwrap_or(&config.descriptor.artifact.sha256);
    ensure_checksum(&file.display().to_string(), &bytes, expected)?;
    println!("OK");
    Ok(actual)
}

pub fn caveats<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<String> {
    let text = render_caveats(&config.descriptor, &config.context())?;
    print!("{}", text);
    Ok(text)
}

/// Lists every dependency and where it was found. Fails if a required one
/// is missing.
pub fn deps<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<DependencyReport> {
    let report = probe(&config.runtime, &config.descriptor.dependencies);
    if report.statuses.is_empty() {
        println!("{} has no dependencies", config.descriptor.name);
    }
    for status in &report.statuses {
        let location = match &status.found {
            Some(path) => path.display().to_string(),
            None => "not found".to_string(),
        };
        println!(
            "{:<12} {:<12} {}",
            status.dependency.name,
            status.dependency.level.to_string(),
            location
        );
    }

    let missing: Vec<&str> = report
        .missing(Requirement::Required)
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    if !missing.is_empty() {
        bail!("Missing required dependencies: {}", missing.join(", "));
    }
    Ok(report)
}

/// Re-runs post-install setup against the current prefix.
pub fn post_install<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<bool> {
    let written = postinstall::post_install(
        &config.runtime,
        &config.descriptor.post_install,
        &config.context(),
    )?;
    if written {
        println!("==> Wrote default configuration");
    } else {
        println!("==> Post-install complete; existing configuration kept");
    }
    Ok(written)
}

/// Prints the active descriptor as JSON.
pub fn show<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<String> {
    let json = config.descriptor.to_json()?;
    println!("{}", json);
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::{self, PREFIX};
    use crate::descriptor::Descriptor;
    use std::path::PathBuf;

    #[test]
    fn test_url_for_default_and_other_version() {
        let runtime = fixtures::runtime();
        let config = fixtures::config(&runtime, fixtures::no_downloads(), false);
        assert_eq!(
            url(&config, None).unwrap(),
            "https://github.com/RLR-GitHub/terminal-themes/archive/refs/tags/v3.0.0.tar.gz"
        );

        let config = fixtures::config(&runtime, fixtures::no_downloads(), true);
        assert_eq!(
            url(&config, Some("3.2.1")).unwrap(),
            "https://github.com/RLR-GitHub/terminal-themes/releases/download/v3.2.1/RoryTerminal-3.2.1.dmg"
        );
        assert!(url(&config, Some("v3")).is_err());
    }

    #[test]
    fn test_verify_file() {
        let runtime = fixtures::runtime();
        runtime.add_file(Path::new("/tmp/v3.0.0.tar.gz"), "tarball");
        let config = fixtures::config(&runtime, fixtures::no_downloads(), false);
        let expected = sha256_hex(b"tarball");

        let file = Path::new("/tmp/v3.0.0.tar.gz");
        assert_eq!(
            verify(&config, file, Some(expected.as_str())).unwrap(),
            expected
        );
        let err = verify(&config, Path::new("/tmp/v3.0.0.tar.gz"), None).unwrap_err();
        assert!(err.to_string().starts_with("Checksum mismatch"));
        assert!(verify(&config, Path::new("/tmp/missing.tar.gz"), None).is_err());
    }

    #[test]
    fn test_caveats_use_prefix() {
        let runtime = fixtures::runtime();
        let config = fixtures::config(&runtime, fixtures::no_downloads(), false);
        let text = caveats(&config).unwrap();
        assert!(text.contains("/opt/rory/etc/rory-terminal/config.json"));
    }

    #[test]
    fn test_deps_report() {
        let runtime = fixtures::runtime();
        runtime.add_file(Path::new("/usr/bin/git"), "");
        let config = fixtures::config(&runtime, fixtures::no_downloads(), false);

        let report = deps(&config).unwrap();
        let git = report
            .statuses
            .iter()
            .find(|s| s.dependency.name == "git")
            .unwrap();
        assert_eq!(git.found, Some(PathBuf::from("/usr/bin/git")));

        runtime.remove_file(Path::new("/usr/bin/bash")).unwrap();
        let err = deps(&config).unwrap_err();
        assert_eq!(err.to_string(), "Missing required dependencies: bash");
    }

    #[test]
    fn test_post_install_seeds_config_once() {
        let runtime = fixtures::runtime();
        let config = fixtures::config(&runtime, fixtures::no_downloads(), false);

        assert!(post_install(&config).unwrap());
        assert!(!post_install(&config).unwrap());
        let written = runtime
            .file_contents(&Path::new(PREFIX).join("etc/rory-terminal/config.json"))
            .unwrap();
        assert!(written.contains("\"currentTheme\": \"hacker\""));
    }

    #[test]
    fn test_show_round_trips() {
        let runtime = fixtures::runtime();
        let config = fixtures::config(&runtime, fixtures::no_downloads(), true);
        let json = show(&config).unwrap();
        let parsed: Descriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config.descriptor);
    }
}
