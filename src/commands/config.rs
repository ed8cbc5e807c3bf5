use anyhow::Result;
use log::debug;
use reqwest::Client;
use std::path::PathBuf;

use crate::{
    archive::{ArchiveExtractor, ArchiveExtractorImpl},
    descriptor::{Descriptor, PackageKind, builtin},
    download::{Downloader, HttpDownloader},
    http::HttpClient,
    layout::Layout,
    runtime::Runtime,
};

/// Options shared by every command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalOptions {
    pub prefix: Option<PathBuf>,
    pub appdir: Option<PathBuf>,
    /// Descriptor file replacing the built-in one
    pub descriptor: Option<PathBuf>,
    pub cask: bool,
}

impl GlobalOptions {
    pub fn kind(&self) -> PackageKind {
        if self.cask {
            PackageKind::Cask
        } else {
            PackageKind::Formula
        }
    }
}

pub struct Config<R: Runtime, D: Downloader, E: ArchiveExtractor> {
    pub runtime: R,
    pub downloader: D,
    pub extractor: E,
    pub layout: Layout,
    pub descriptor: Descriptor,
}

pub fn user_agent() -> String {
    format!("rory-pkg/{}", env!("RORY_PKG_VERSION"))
}

pub fn build_http_client() -> Result<HttpClient> {
    let client = Client::builder().user_agent(user_agent()).build()?;
    Ok(HttpClient::new(client))
}

/// Loads the descriptor file if given, otherwise the built-in one.
pub fn load_descriptor<R: Runtime>(runtime: &R, options: &GlobalOptions) -> Result<Descriptor> {
    match &options.descriptor {
        Some(path) => {
            debug!("Loading descriptor from {:?}", path);
            let descriptor = Descriptor::load(runtime, path)?;
            if options.cask && descriptor.kind != PackageKind::Cask {
                debug!("--cask ignored: {:?} describes a {}", path, descriptor.kind);
            }
            Ok(descriptor)
        }
        None => Ok(builtin::get(options.kind())),
    }
}

impl<R: Runtime> Config<R, HttpDownloader, ArchiveExtractorImpl> {
    pub fn new(runtime: R, options: &GlobalOptions) -> Result<Self> {
        let downloader = HttpDownloader::new(build_http_client()?);
        Self::with_downloader(runtime, downloader, options)
    }
}

impl<R: Runtime, D: Downloader> Config<R, D, ArchiveExtractorImpl> {
    pub fn with_downloader(runtime: R, downloader: D, options: &GlobalOptions) -> Result<Self> {
        let layout = Layout::resolve(&runtime, options.prefix.clone(), options.appdir.clone())?;
        debug!(
            "Using prefix {:?}, appdir {:?}",
            layout.prefix, layout.appdir
        );
        let descriptor = load_descriptor(&runtime, options)?;
        Ok(Self {
            runtime,
            downloader,
            extractor: ArchiveExtractorImpl::new(),
            layout,
            descriptor,
        })
    }
}

impl<R: Runtime, D: Downloader, E: ArchiveExtractor> Config<R, D, E> {
    /// Template context for the descriptor's default version.
    pub fn context(&self) -> crate::template::Context {
        self.layout
            .context(&self.descriptor.name, &self.descriptor.artifact.version)
    }
}
