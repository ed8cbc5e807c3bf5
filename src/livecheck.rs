//! Looking up the newest upstream release on GitHub.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use semver::Version;
use serde::Deserialize;
use url::Url;

use crate::descriptor::Descriptor;
use crate::http::HttpClient;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, PartialEq, Clone)]
pub struct GitHubRepo {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl GitHubRepo {
    /// Parses `https://github.com/<owner>/<repo>[.git]` and deeper URLs.
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        if url.host_str()? != "github.com" {
            return None;
        }
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?;
        let repo = segments.next()?.trim_end_matches(".git");
        if repo.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// The project a descriptor is released from: its homepage, then `head`.
    pub fn for_descriptor(descriptor: &Descriptor) -> Option<Self> {
        descriptor
            .artifact
            .homepage
            .as_deref()
            .and_then(Self::from_url)
            .or_else(|| descriptor.head.as_deref().and_then(Self::from_url))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Release {
    /// The tag as a version, without a leading `v`.
    pub fn version(&self) -> Result<Version> {
        let tag = self.tag_name.trim_start_matches('v');
        Version::parse(tag)
            .with_context(|| format!("Release tag {} is not a version", self.tag_name))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LatestRelease: Send + Sync {
    async fn latest_release(&self, repo: &GitHubRepo) -> Result<Release>;
}

pub struct GitHub {
    http: HttpClient,
    api_url: String,
}

impl GitHub {
    pub fn new(http: HttpClient, api_url: Option<String>) -> Self {
        let api_url = api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self { http, api_url }
    }
}

#[async_trait]
impl LatestRelease for GitHub {
    #[tracing::instrument(skip(self))]
    async fn latest_release(&self, repo: &GitHubRepo) -> Result<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_url.trim_end_matches('/'),
            repo.owner,
            repo.repo
        );
        debug!("Fetching latest release from {}...", url);
        self.http
            .get_json(&url)
            .await
            .with_context(|| format!("Failed to look up the latest release of {}", repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::builtin;
    use reqwest::Client;
    use std::time::Duration;

    fn github(api_url: String) -> GitHub {
        let http = HttpClient::new(Client::new()).with_retry_delay(Duration::from_millis(1));
        GitHub::new(http, Some(api_url))
    }

    #[test]
    fn test_repo_from_url() {
        let expected = GitHubRepo {
            owner: "RLR-GitHub".to_string(),
            repo: "terminal-themes".to_string(),
        };
        for url in [
            "https://github.com/RLR-GitHub/terminal-themes",
            "https://github.com/RLR-GitHub/terminal-themes.git",
            "https://github.com/RLR-GitHub/terminal-themes/releases/tag/v3.0.0",
        ] {
            assert_eq!(GitHubRepo::from_url(url), Some(expected.clone()), "{}", url);
        }
        assert_eq!(GitHubRepo::from_url("https://gitlab.com/a/b"), None);
        assert_eq!(GitHubRepo::from_url("https://github.com/RLR-GitHub"), None);
        assert_eq!(GitHubRepo::from_url("not a url"), None);
    }

    #[test]
    fn test_repo_for_builtin_descriptors() {
        for descriptor in builtin::all() {
            let repo = GitHubRepo::for_descriptor(&descriptor).unwrap();
            assert_eq!(repo.to_string(), "RLR-GitHub/terminal-themes");
        }

        let mut descriptor = builtin::formula();
        descriptor.artifact.homepage = Some("https://rory.example.com".to_string());
        assert_eq!(
            GitHubRepo::for_descriptor(&descriptor).unwrap().repo,
            "terminal-themes"
        );
        descriptor.head = None;
        assert_eq!(GitHubRepo::for_descriptor(&descriptor), None);
    }

    #[test]
    fn test_release_version() {
        let release = Release {
            tag_name: "v3.1.0".to_string(),
            html_url: None,
        };
        assert_eq!(release.version().unwrap(), Version::new(3, 1, 0));

        let nightly = Release {
            tag_name: "nightly".to_string(),
            html_url: None,
        };
        assert!(nightly.version().is_err());
    }

    #[tokio::test]
    async fn test_latest_release() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/RLR-GitHub/terminal-themes/releases/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "tag_name": "v3.1.0",
                    "html_url": "https://github.com/RLR-GitHub/terminal-themes/releases/tag/v3.1.0",
                    "prerelease": false
                }"#,
            )
            .create_async()
            .await;

        let repo = GitHubRepo::from_url(builtin::HOMEPAGE).unwrap();
        let release = github(server.url()).latest_release(&repo).await.unwrap();

        mock.assert_async().await;
        assert_eq!(release.tag_name, "v3.1.0");
        assert_eq!(release.version().unwrap(), Version::new(3, 1, 0));
    }

    #[tokio::test]
    async fn test_latest_release_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/RLR-GitHub/terminal-themes/releases/latest")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let repo = GitHubRepo::from_url(builtin::HOMEPAGE).unwrap();
        let err = github(format!("{}/", server.url()))
            .latest_release(&repo)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(err.to_string().contains("RLR-GitHub/terminal-themes"));
    }
}
