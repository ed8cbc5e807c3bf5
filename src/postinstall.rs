//! Post-install setup: runtime directories and the default theme config.

use anyhow::{Context as _, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::descriptor::PostInstall;
use crate::runtime::{Runtime, path_occupied};
use crate::template::Context;

/// Shape of `{etc}/rory-terminal/config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThemeConfig {
    pub current_theme: String,
    pub enable_animations: bool,
    pub starship_integration: bool,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            current_theme: "hacker".to_string(),
            enable_animations: true,
            starship_integration: true,
        }
    }
}

/// Creates the post-install directories and seeds the config file.
///
/// Returns `true` if the config file was written. An existing config
/// (even an unparsable one) is never touched.
#[tracing::instrument(skip(runtime, post_install, context))]
pub fn post_install<R: Runtime>(
    runtime: &R,
    post_install: &PostInstall,
    context: &Context,
) -> Result<bool> {
    for dir in &post_install.mkdirs {
        let dir = context.render_path(dir)?;
        debug!("Creating {:?}", dir);
        runtime.create_dir_all(&dir)?;
    }

    let Some(seed) = &post_install.config else {
        return Ok(false);
    };

    let config_path = context.render_path(&seed.path)?;
    if path_occupied(runtime, &config_path) {
        info!("Keeping existing configuration at {:?}", config_path);
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        runtime.create_dir_all(parent)?;
    }
    let mut contents = serde_json::to_string_pretty(&seed.defaults)?;
    contents.push('\n');
    runtime
        .write(&config_path, contents.as_bytes())
        .with_context(|| format!("Failed to write default configuration {:?}", config_path))?;
    info!("Wrote default configuration to {:?}", config_path);
    Ok(true)
}
