//! Command implementations behind the `rory-pkg` CLI.
//!
//! Every command takes a [`Config`] so tests can swap the runtime and the
//! downloader.

pub mod config;
mod info;
mod install;
mod outdated;
mod services;
mod smoke;
mod uninstall;

pub use config::{Config, GlobalOptions};
pub use info::{caveats, deps, post_install, show, url, verify};
pub use install::{InstallOptions, InstallOutcome, check_conflicts, effective_artifact, install};
pub use outdated::{OutdatedOptions, OutdatedReport, installed_version, outdated};
pub use services::{services_show, services_start, services_stop};
pub use smoke::run_tests;
pub use uninstall::{UninstallOptions, uninstall};
