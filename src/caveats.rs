//! Post-install notes shown to the user.

use anyhow::{Context as _, Result};

use crate::descriptor::Descriptor;
use crate::template::Context;

/// Renders the descriptor's caveats, plus a hint for packages with a service.
pub fn render_caveats(descriptor: &Descriptor, context: &Context) -> Result<String> {
    let mut text = context
        .render(&descriptor.caveats)
        .with_context(|| format!("Failed to render caveats for {}", descriptor.name))?;

    if let Some(service) = &descriptor.service {
        if !text.is_empty() && !text.ends_with("\n\n") {
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.push('\n');
        }
        text.push_str(&format!(
            "To start {} now and restart at login:\n  rory-pkg services start\n",
            descriptor.name
        ));
        if !service.keep_alive {
            text.push_str("The service is not restarted if it exits.\n");
        }
    }
    Ok(text)
}
