use anyhow::{Result, bail};
use log::debug;

use super::config::Config;
use crate::{
    archive::ArchiveExtractor, descriptor::TestAssertion, download::Downloader,
    runtime::Runtime, template::Context,
};

fn run_assertion<R: Runtime>(
    runtime: &R,
    assertion: &TestAssertion,
    context: &Context,
) -> Result<Option<String>> {
    let program = context.render(&assertion.command)?;
    let args = assertion
        .args
        .iter()
        .map(|arg| context.render(arg))
        .collect::<Result<Vec<_>>>()?;
    let env = assertion
        .env
        .iter()
        .map(|(key, value)| Ok((key.clone(), context.render(value)?)))
        .collect::<Result<Vec<_>>>()?;

    debug!("Running {} {:?}", program, args);
    let output = match runtime.run_command_with_env(&program, &args, &env) {
        Ok(output) => output,
        Err(e) => return Ok(Some(format!("could not run {}: {:#}", program, e))),
    };
    if !output.success {
        return Ok(Some(format!("exited with an error: {}", output.stderr.trim())));
    }
    let combined = format!("{}{}", output.stdout, output.stderr);
    if !combined.contains(&assertion.expect) {
        return Ok(Some(format!("output does not contain {:?}", assertion.expect)));
    }
    Ok(None)
}

/// Runs the descriptor's smoke tests against the installed commands.
/// Returns the number of assertions that passed.
#[tracing::instrument(skip(config))]
pub fn run_tests<R: Runtime, D: Downloader, E: ArchiveExtractor>(
    config: &Config<R, D, E>,
) -> Result<usize> {
    let descriptor = &config.descriptor;
    if descriptor.tests.is_empty() {
        println!("{} {} has no tests", descriptor.kind, descriptor.name);
        return Ok(0);
    }

    let context = config.context();
    let mut failures = Vec::new();
    for assertion in &descriptor.tests {
        let shown = std::iter::once(assertion.command.as_str())
            .chain(assertion.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        match run_assertion(&config.runtime, assertion, &context)? {
            None => println!("ok      {}", shown),
            Some(reason) => {
                println!("FAILED  {}: {}", shown, reason);
                failures.push(format!("{}: {}", shown, reason));
            }
        }
    }

    let total = descriptor.tests.len();
    if !failures.is_empty() {
        bail!(
            "{} of {} tests failed:\n  {}",
            failures.len(),
            total,
            failures.join("\n  ")
        );
    }
    Ok(total)
}
