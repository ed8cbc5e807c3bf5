//! `{placeholder}` substitution for descriptor paths, scripts and caveats.
//!
//! A placeholder is `{` + lowercase identifier + `}`. Braces that do not
//! enclose an identifier, and shell expansions such as `${1:-hacker}`, are
//! copied through untouched. Unknown placeholders are errors.

use anyhow::{Result, bail};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::runtime::expand_tilde;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: BTreeMap<String, String>,
    home: Option<PathBuf>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_path(self, key: &str, value: &Path) -> Self {
        self.with(key, value.to_string_lossy())
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Home directory used to expand a leading `~/` in [`Context::render_path`].
    pub fn with_home(mut self, home: &Path) -> Self {
        self.home = Some(home.to_path_buf());
        self.with_path("home", home)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn render(&self, template: &str) -> Result<String> {
        render(template, self)
    }

    pub fn render_path(&self, template: &str) -> Result<PathBuf> {
        let rendered = self.render(template)?;
        Ok(match &self.home {
            Some(home) => expand_tilde(&rendered, home),
            None => PathBuf::from(rendered),
        })
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.starts_with(|c: char| c.is_ascii_lowercase())
}

/// Substitutes every placeholder in `template` from `context`.
pub fn render(template: &str, context: &Context) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let preceded_by_dollar = rest[..open].ends_with('$');
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];

        match after_open.find('}') {
            Some(close)
                if !preceded_by_dollar && is_placeholder_name(&after_open[..close]) =>
            {
                let name = &after_open[..close];
                match context.get(name) {
                    Some(value) => out.push_str(value),
                    None => bail!("Unknown placeholder {{{}}} in {:?}", name, template),
                }
                rest = &after_open[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}
