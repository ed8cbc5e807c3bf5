use anyhow::Result;
use clap::Parser;
use rory_pkg::commands::{
    self, Config, GlobalOptions, InstallOptions, OutdatedOptions, UninstallOptions,
};
use rory_pkg::livecheck::GitHub;
use std::path::PathBuf;

/// rory-pkg - Rory Terminal package manager
///
/// Installs Rory Terminal either as command-line tools under a prefix
/// (the default) or as a macOS application bundle (--cask).
///
/// Examples:
///   rory-pkg install --sha256 <HEX>      # Install the command-line tools
///   rory-pkg --cask install -y           # Install the application
///   rory-pkg url --version 3.1.0         # Print a release download URL
///   rory-pkg outdated                    # Compare with the latest release
#[derive(Parser, Debug)]
#[command(author, version = env!("RORY_PKG_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install prefix (defaults to ~/.local, or /usr/local when privileged)
    #[arg(long, env = "RORY_PKG_PREFIX", value_name = "PATH", global = true)]
    prefix: Option<PathBuf>,

    /// Applications directory for the cask
    #[arg(long, env = "RORY_PKG_APPDIR", value_name = "PATH", global = true)]
    appdir: Option<PathBuf>,

    /// Use a descriptor file instead of the built-in one
    #[arg(long, value_name = "FILE", global = true)]
    descriptor: Option<PathBuf>,

    /// Operate on the application bundle instead of the command-line tools
    #[arg(long, global = true)]
    cask: bool,
}

impl Cli {
    fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            prefix: self.prefix.clone(),
            appdir: self.appdir.clone(),
            descriptor: self.descriptor.clone(),
            cask: self.cask,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the release download URL
    Url {
        /// Release version (defaults to the descriptor's)
        #[arg(long)]
        version: Option<String>,
    },

    /// Check a downloaded artifact's SHA-256
    Verify {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Expected checksum (defaults to the descriptor's)
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Download, verify and install
    Install(InstallArgs),

    /// Remove installed files
    Uninstall {
        /// Also remove configuration and user data
        #[arg(long)]
        zap: bool,

        /// Do not ask for confirmation
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },

    /// Create runtime directories and the default configuration
    PostInstall,

    /// Print post-install notes
    Caveats,

    /// Check declared dependencies
    Deps,

    /// Manage the background service
    Services {
        #[command(subcommand)]
        action: ServiceAction,
    },

    /// Compare the installed version with the latest GitHub release
    Outdated {
        /// Include packages that update themselves
        #[arg(long)]
        greedy: bool,

        /// GitHub API base URL
        #[arg(long = "api-url", env = "RORY_PKG_GITHUB_API_URL", value_name = "URL")]
        api_url: Option<String>,
    },

    /// Print the descriptor as JSON
    Show,

    /// Run smoke tests against the installed commands
    Test,
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// Release version (requires --sha256 unless it is the descriptor's)
    #[arg(long)]
    version: Option<String>,

    /// Expected SHA-256 of the artifact, or `no_check`
    #[arg(long, value_name = "HEX")]
    sha256: Option<String>,

    /// Download URL template containing {version}
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Start the background service after installing
    #[arg(long)]
    service: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long = "yes")]
    yes: bool,
}

impl From<InstallArgs> for InstallOptions {
    fn from(args: InstallArgs) -> Self {
        Self {
            version: args.version,
            sha256: args.sha256,
            url: args.url,
            service: args.service,
            yes: args.yes,
        }
    }
}

#[derive(clap::Subcommand, Debug, PartialEq)]
enum ServiceAction {
    /// Register the service and start it at login
    Start,
    /// Stop the service and remove its definition
    Stop,
    /// Show whether the service is registered and running
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = rory_pkg::runtime::RealRuntime;
    let config = Config::new(runtime, &cli.global_options())?;

    match cli.command {
        Commands::Url { version } => {
            commands::url(&config, version.as_deref())?;
        }
        Commands::Verify { file, sha256 } => {
            commands::verify(&config, &file, sha256.as_deref())?;
        }
        Commands::Install(args) => {
            commands::install(&config, &args.into()).await?;
        }
        Commands::Uninstall { zap, yes } => {
            commands::uninstall(&config, UninstallOptions { zap, yes })?;
        }
        Commands::PostInstall => {
            commands::post_install(&config)?;
        }
        Commands::Caveats => {
            commands::caveats(&config)?;
        }
        Commands::Deps => {
            commands::deps(&config)?;
        }
        Commands::Services { action } => match action {
            ServiceAction::Start => {
                commands::services_start(&config)?;
            }
            ServiceAction::Stop => {
                commands::services_stop(&config)?;
            }
            ServiceAction::Show => {
                commands::services_show(&config)?;
            }
        },
        Commands::Outdated { greedy, api_url } => {
            let github = GitHub::new(config.downloader.http_client().clone(), api_url);
            commands::outdated(&config, &github, &OutdatedOptions { greedy }).await?;
        }
        Commands::Show => {
            commands::show(&config)?;
        }
        Commands::Test => {
            commands::run_tests(&config)?;
        }
    }
    Ok(())
}
