use anyhow::{Context, Result, bail};
use semver::Version;
use serde::{Deserialize, Serialize};
use url::Url;

/// Token replaced by the release version in artifact URL templates.
pub const VERSION_TOKEN: &str = "{version}";

/// The downloadable release payload (source tarball or disk image).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReleaseArtifact {
    pub name: String,
    pub version: String,
    /// URL template containing [`VERSION_TOKEN`]
    pub url: String,
    /// Hex SHA-256 of the artifact, or `no_check`
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl ReleaseArtifact {
    pub fn download_url(&self) -> Result<String> {
        resolve_download_url(&self.url, &self.version)
    }

    /// Returns a copy pinned to another version. The checksum no longer
    /// matches, so callers must supply a new one.
    pub fn with_version(&self, version: &str, sha256: &str) -> Self {
        Self {
            version: version.to_string(),
            sha256: sha256.to_string(),
            ..self.clone()
        }
    }

    /// File name of the resolved download, used to pick an unpacker.
    pub fn file_name(&self) -> Result<String> {
        let url = Url::parse(&self.download_url()?)?;
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .with_context(|| format!("Artifact URL {} has no file name", url))
    }
}

/// Checks that `version` is a plain `MAJOR.MINOR.PATCH[-pre][+build]` version.
pub fn validate_version(version: &str) -> Result<Version> {
    if version.trim().is_empty() {
        bail!("Version must not be empty");
    }
    Version::parse(version).with_context(|| {
        format!(
            "Invalid version {:?}: expected MAJOR.MINOR.PATCH (e.g. 3.0.0)",
            version
        )
    })
}

/// Substitutes `version` for every `{version}` token in `template`.
#[tracing::instrument]
pub fn resolve_download_url(template: &str, version: &str) -> Result<String> {
    validate_version(version)?;
    if !template.contains(VERSION_TOKEN) {
        bail!(
            "URL template {:?} does not contain the {} token",
            template,
            VERSION_TOKEN
        );
    }

    let resolved = template.replace(VERSION_TOKEN, version);
    let parsed =
        Url::parse(&resolved).with_context(|| format!("Invalid download URL {:?}", resolved))?;
    if !matches!(parsed.scheme(), "https" | "http") {
        bail!(
            "Unsupported URL scheme {:?} in {:?}: must be http or https",
            parsed.scheme(),
            resolved
        );
    }
    Ok(resolved)
}
