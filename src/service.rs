//! Background service registration.
//!
//! macOS gets a launchd agent in `~/Library/LaunchAgents`, everything else a
//! systemd user unit in `~/.config/systemd/user`.

use anyhow::{Context as _, Result, bail};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::descriptor::ServiceDescriptor;
use crate::runtime::Runtime;
use crate::template::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceManager {
    Launchd,
    Systemd,
}

impl ServiceManager {
    pub fn for_os(os: &str) -> Self {
        if os == "macos" {
            ServiceManager::Launchd
        } else {
            ServiceManager::Systemd
        }
    }

    /// Where the agent or unit definition lives.
    pub fn definition_path(&self, label: &str, home: &Path) -> PathBuf {
        match self {
            ServiceManager::Launchd => home
                .join("Library/LaunchAgents")
                .join(format!("{}.plist", label)),
            ServiceManager::Systemd => home
                .join(".config/systemd/user")
                .join(format!("{}.service", label)),
        }
    }
}

impl std::fmt::Display for ServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceManager::Launchd => write!(f, "launchd"),
            ServiceManager::Systemd => write!(f, "systemd"),
        }
    }
}

/// A service with its templates rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedService {
    pub label: String,
    pub program: Vec<String>,
    pub keep_alive: bool,
    pub log_path: Option<PathBuf>,
    pub error_log_path: Option<PathBuf>,
}

impl ResolvedService {
    pub fn resolve(service: &ServiceDescriptor, context: &Context) -> Result<Self> {
        let program = service
            .run
            .iter()
            .map(|arg| context.render(arg))
            .collect::<Result<Vec<_>>>()?;
        let render = |path: &Option<String>| -> Result<Option<PathBuf>> {
            path.as_deref().map(|p| context.render_path(p)).transpose()
        };
        Ok(Self {
            label: service.label.clone(),
            program,
            keep_alive: service.keep_alive,
            log_path: render(&service.log_path)?,
            error_log_path: render(&service.error_log_path)?,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LaunchAgent<'a> {
    label: &'a str,
    program_arguments: &'a [String],
    run_at_load: bool,
    keep_alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    standard_out_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    standard_error_path: Option<String>,
}

pub fn launchd_plist(service: &ResolvedService) -> Result<String> {
    let agent = LaunchAgent {
        label: &service.label,
        program_arguments: &service.program,
        run_at_load: true,
        keep_alive: service.keep_alive,
        standard_out_path: service
            .log_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        standard_error_path: service
            .error_log_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
    };
    let mut out = Vec::new();
    plist::to_writer_xml(&mut out, &agent).context("Failed to serialize launchd plist")?;
    Ok(String::from_utf8(out)?)
}

fn systemd_quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"' || c == '\\') {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn systemd_unit(service: &ResolvedService, description: &str) -> String {
    let exec: Vec<String> = service.program.iter().map(|a| systemd_quote(a)).collect();
    let mut unit = format!(
        "[Unit]\nDescription={}\n\n[Service]\nType=simple\nExecStart={}\nRestart={}\n",
        description,
        exec.join(" "),
        if service.keep_alive { "always" } else { "no" }
    );
    if let Some(log) = &service.log_path {
        unit.push_str(&format!("StandardOutput=append:{}\n", log.display()));
    }
    if let Some(log) = &service.error_log_path {
        unit.push_str(&format!("StandardError=append:{}\n", log.display()));
    }
    unit.push_str("\n[Install]\nWantedBy=default.target\n");
    unit
}

fn home<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    runtime.home_dir().context("Could not find home directory")
}

fn run_checked<R: Runtime + ?Sized>(runtime: &R, program: &str, args: &[&str]) -> Result<()> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let output = runtime.run_command(program, &args)?;
    if !output.success {
        bail!(
            "`{} {}` failed: {}",
            program,
            args.join(" "),
            output.stderr.trim()
        );
    }
    Ok(())
}

/// Writes the service definition and starts it. Returns the definition path.
#[tracing::instrument(skip(runtime, service))]
pub fn start<R: Runtime + ?Sized>(
    runtime: &R,
    service: &ResolvedService,
    description: &str,
) -> Result<PathBuf> {
    let manager = ServiceManager::for_os(runtime.os());
    let path = manager.definition_path(&service.label, &home(runtime)?);

    for log in service.log_path.iter().chain(&service.error_log_path) {
        if let Some(parent) = log.parent() {
            runtime.create_dir_all(parent)?;
        }
    }
    if let Some(parent) = path.parent() {
        runtime.create_dir_all(parent)?;
    }

    let contents = match manager {
        ServiceManager::Launchd => launchd_plist(service)?,
        ServiceManager::Systemd => systemd_unit(service, description),
    };
    runtime
        .write(&path, contents.as_bytes())
        .with_context(|| format!("Failed to write {:?}", path))?;
    debug!("Wrote {} definition {:?}", manager, path);

    let path_str = path.to_string_lossy().into_owned();
    let unit = format!("{}.service", service.label);
    match manager {
        ServiceManager::Launchd => {
            run_checked(runtime, "launchctl", &["load", "-w", path_str.as_str()])?
        }
        ServiceManager::Systemd => {
            run_checked(runtime, "systemctl", &["--user", "daemon-reload"])?;
            run_checked(
                runtime,
                "systemctl",
                &["--user", "enable", "--now", unit.as_str()],
            )?;
        }
    }
    info!("Started {} ({})", service.label, manager);
    Ok(path)
}

/// Stops the service and removes its definition. Returns `false` if it was
/// not registered.
#[tracing::instrument(skip(runtime))]
pub fn stop<R: Runtime + ?Sized>(runtime: &R, label: &str) -> Result<bool> {
    let manager = ServiceManager::for_os(runtime.os());
    let path = manager.definition_path(label, &home(runtime)?);
    if !runtime.exists(&path) {
        debug!("{} is not registered", label);
        return Ok(false);
    }

    let path_str = path.to_string_lossy().into_owned();
    let unit = format!("{}.service", label);
    let result = match manager {
        ServiceManager::Launchd => {
            run_checked(runtime, "launchctl", &["unload", "-w", path_str.as_str()])
        }
        ServiceManager::Systemd => {
            run_checked(
                runtime,
                "systemctl",
                &["--user", "disable", "--now", unit.as_str()],
            )
        }
    };
    if let Err(e) = result {
        warn!("{:#}", e);
    }

    runtime
        .remove_file(&path)
        .with_context(|| format!("Failed to remove {:?}", path))?;
    if manager == ServiceManager::Systemd
        && let Err(e) = run_checked(runtime, "systemctl", &["--user", "daemon-reload"])
    {
        warn!("{:#}", e);
    }
    info!("Stopped {}", label);
    Ok(true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStatus {
    pub manager: ServiceManager,
    pub definition: PathBuf,
    pub registered: bool,
    pub running: bool,
}

#[tracing::instrument(skip(runtime))]
pub fn status<R: Runtime + ?Sized>(runtime: &R, label: &str) -> Result<ServiceStatus> {
    let manager = ServiceManager::for_os(runtime.os());
    let definition = manager.definition_path(label, &home(runtime)?);
    let registered = runtime.exists(&definition);

    let running = registered && {
        let (program, args) = match manager {
            ServiceManager::Launchd => ("launchctl", vec!["list".to_string(), label.to_string()]),
            ServiceManager::Systemd => (
                "systemctl",
                vec![
                    "--user".to_string(),
                    "is-active".to_string(),
                    format!("{}.service", label),
                ],
            ),
        };
        match runtime.run_command(program, &args) {
            Ok(output) => {
                output.success
                    && (manager == ServiceManager::Launchd || output.stdout.trim() == "active")
            }
            Err(e) => {
                debug!("Could not query {}: {:#}", label, e);
                false
            }
        }
    };

    Ok(ServiceStatus {
        manager,
        definition,
        registered,
        running,
    })
}
