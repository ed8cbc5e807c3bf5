//! Built-in descriptors for Rory Terminal.

use std::collections::BTreeMap;

use super::{
    Conflict, ConfigSeed, Dependency, Descriptor, InstallPlan, InstallStep, PackageKind,
    PostInstall, ReleaseArtifact, Requirement, ServiceDescriptor, TestAssertion, UninstallPlan,
};
use crate::postinstall::ThemeConfig;

pub const NAME: &str = "rory-terminal";
pub const VERSION: &str = "3.0.0";
pub const HOMEPAGE: &str = "https://github.com/RLR-GitHub/terminal-themes";
pub const BUNDLE_ID: &str = "com.rlrgithub.roryterminal";
pub const SERVICE_LABEL: &str = "com.rlrgithub.rory-terminal";

/// Placeholder shipped until a release is cut; verification always fails.
pub const PLACEHOLDER_SHA256: &str = "PLACEHOLDER_SHA256";

const APP: &str = "{appdir}/RoryTerminal.app";

pub fn get(kind: PackageKind) -> Descriptor {
    match kind {
        PackageKind::Formula => formula(),
        PackageKind::Cask => cask(),
    }
}

pub fn all() -> Vec<Descriptor> {
    vec![formula(), cask()]
}

fn artifact(url: &str) -> ReleaseArtifact {
    ReleaseArtifact {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        url: url.to_string(),
        sha256: PLACEHOLDER_SHA256.to_string(),
        license: Some("MIT".to_string()),
        homepage: Some(HOMEPAGE.to_string()),
    }
}

fn wrapper(exec_line: &str) -> String {
    format!(
        "#!/bin/bash\nexport RORY_TERMINAL_DIR=\"{{libexec}}\"\n{}\n",
        exec_line
    )
}

/// Command-line package: scripts under a keg, wrappers linked into `{bin}`.
pub fn formula() -> Descriptor {
    let commands = ["rory-terminal", "rory-theme", "rory-matrix"];

    let mut steps = vec![
        InstallStep::copy("{source}/core", "{libexec}/core"),
        InstallStep::copy("{source}/themes", "{libexec}/themes"),
        InstallStep::copy("{source}/config", "{libexec}/config"),
        InstallStep::copy("{source}/installers", "{libexec}/installers"),
        InstallStep::executable(
            "{keg}/bin/rory-terminal",
            &wrapper(
                "exec \"{libexec}/installers/desktop/rory-terminal-launcher.sh\" \"$@\"",
            ),
        ),
        InstallStep::executable(
            "{keg}/bin/rory-theme",
            &wrapper("exec \"{libexec}/core/option1-starship/theme-manager.sh\" \"$@\""),
        ),
        InstallStep::executable(
            "{keg}/bin/rory-matrix",
            &wrapper("theme=\"${1:-hacker}\"\nexec \"{libexec}/themes/bash/matrix-$theme.sh\""),
        ),
    ];
    steps.extend(commands.iter().map(|command| {
        InstallStep::relative_symlink(
            &format!("{{keg}}/bin/{}", command),
            &format!("{{bin}}/{}", command),
        )
    }));
    steps.extend([
        InstallStep::relative_symlink(
            "{libexec}/installers/completions/rory-terminal.bash",
            "{bash_completion}/rory-terminal",
        ),
        InstallStep::relative_symlink(
            "{libexec}/installers/completions/_rory-terminal",
            "{zsh_completion}/_rory-terminal",
        ),
        InstallStep::relative_symlink(
            "{libexec}/installers/completions/rory-terminal.fish",
            "{fish_completion}/rory-terminal.fish",
        ),
        InstallStep::copy("{source}/README.md", "{doc}/README.md"),
        InstallStep::copy("{source}/LICENSE", "{doc}/LICENSE"),
        InstallStep::copy("{source}/docs/*.md", "{doc}"),
    ]);

    let mut delete: Vec<String> = commands.iter().map(|c| format!("{{bin}}/{}", c)).collect();
    delete.extend(
        [
            "{bash_completion}/rory-terminal",
            "{zsh_completion}/_rory-terminal",
            "{fish_completion}/rory-terminal.fish",
            "{doc}",
            "{opt}",
            "{cellar}",
        ]
        .map(String::from),
    );

    Descriptor {
        name: NAME.to_string(),
        kind: PackageKind::Formula,
        desc: "Cyberpunk terminal themes with Matrix animations".to_string(),
        artifact: artifact(
            "https://github.com/RLR-GitHub/terminal-themes/archive/refs/tags/v{version}.tar.gz",
        ),
        head: Some(format!("{}.git", HOMEPAGE)),
        installed_path: "{cellar}".to_string(),
        conflicts_with: Vec::new(),
        auto_updates: false,
        dependencies: vec![
            Dependency::new("bash", Requirement::Required),
            Dependency::new("python@3.11", Requirement::Required).with_command("python3"),
            Dependency::new("starship", Requirement::Recommended),
            Dependency::new("git", Requirement::Recommended),
            Dependency::new("curl", Requirement::Recommended),
            Dependency::new("bat", Requirement::Optional),
            Dependency::new("eza", Requirement::Optional),
            Dependency::new("git-delta", Requirement::Optional).with_command("delta"),
        ],
        install: InstallPlan::new(steps),
        post_install: PostInstall {
            mkdirs: vec!["{var}/rory-terminal".to_string()],
            config: Some(ConfigSeed {
                path: "{etc}/rory-terminal/config.json".to_string(),
                defaults: ThemeConfig::default(),
            }),
        },
        uninstall: UninstallPlan {
            launchctl: vec![SERVICE_LABEL.to_string()],
            delete,
            ..UninstallPlan::default()
        },
        zap: [
            "{etc}/rory-terminal",
            "{var}/rory-terminal",
            "{var}/log/rory-terminal",
            "~/.config/rory-terminal",
        ]
        .map(String::from)
        .to_vec(),
        service: Some(ServiceDescriptor {
            label: SERVICE_LABEL.to_string(),
            run: vec!["{opt}/bin/rory-terminal".to_string(), "--background".to_string()],
            keep_alive: false,
            log_path: Some("{var}/log/rory-terminal/service.log".to_string()),
            error_log_path: Some("{var}/log/rory-terminal/service-error.log".to_string()),
        }),
        caveats: FORMULA_CAVEATS.to_string(),
        tests: vec![
            list_assertion("Available themes"),
            list_assertion("halloween"),
            list_assertion("christmas"),
            TestAssertion {
                command: "{bin}/rory-theme".to_string(),
                args: vec!["set".to_string(), "hacker".to_string()],
                env: BTreeMap::from([("RORY_TERMINAL_DRY_RUN".to_string(), "1".to_string())]),
                expect: "Theme would be set to: hacker".to_string(),
            },
        ],
    }
}

fn list_assertion(expect: &str) -> TestAssertion {
    TestAssertion {
        command: "{bin}/rory-theme".to_string(),
        args: vec!["list".to_string()],
        env: BTreeMap::new(),
        expect: expect.to_string(),
    }
}

/// GUI package: the application bundle plus two command-line links.
pub fn cask() -> Descriptor {
    let launch_agent = format!("{}.plist", BUNDLE_ID);
    Descriptor {
        name: NAME.to_string(),
        kind: PackageKind::Cask,
        desc: "Cyberpunk terminal themes with Matrix animations - GUI Application".to_string(),
        artifact: artifact(
            "https://github.com/RLR-GitHub/terminal-themes/releases/download/v{version}/RoryTerminal-{version}.dmg",
        ),
        head: None,
        installed_path: APP.to_string(),
        conflicts_with: vec![Conflict {
            name: NAME.to_string(),
            kind: PackageKind::Formula,
        }],
        auto_updates: true,
        dependencies: Vec::new(),
        install: InstallPlan::new(vec![
            InstallStep::copy("{source}/RoryTerminal.app", APP),
            InstallStep::forced_symlink(
                &format!("{}/Contents/MacOS/RoryTerminal", APP),
                "{bin}/rory-terminal",
            ),
            InstallStep::forced_symlink(
                &format!(
                    "{}/Contents/Resources/rory-terminal/core/option1-starship/theme-manager.sh",
                    APP
                ),
                "{bin}/rory-theme",
            ),
        ]),
        post_install: PostInstall::default(),
        uninstall: UninstallPlan {
            launchctl: vec![BUNDLE_ID.to_string()],
            quit: vec![BUNDLE_ID.to_string()],
            delete: vec![
                format!("/Library/LaunchAgents/{}", launch_agent),
                format!("~/Library/LaunchAgents/{}", launch_agent),
                "{bin}/rory-terminal".to_string(),
                "{bin}/rory-theme".to_string(),
                APP.to_string(),
            ],
            rmdir: Vec::new(),
        },
        zap: vec![
            "~/Library/Application Support/RoryTerminal".to_string(),
            format!("~/Library/Caches/{}", BUNDLE_ID),
            format!("~/Library/Preferences/{}.plist", BUNDLE_ID),
            format!("~/Library/Saved Application State/{}.savedState", BUNDLE_ID),
            "~/.config/rory-terminal".to_string(),
        ],
        service: None,
        caveats: CASK_CAVEATS.to_string(),
        tests: Vec::new(),
    }
}

const FORMULA_CAVEATS: &str = r#"Rory Terminal has been installed!

Quick start:
  rory-terminal              # Open theme selector
  rory-theme set halloween   # Set a theme
  rory-matrix christmas      # Run Matrix animation
  rory-theme list            # List available themes

To integrate with your shell, run:
  rory-terminal install

For GUI app, install the cask:
  rory-pkg --cask install

Configuration file location:
  {etc}/rory-terminal/config.json

To enable Starship integration:
  1. Install Starship
  2. Run: rory-theme enable-starship
"#;

const CASK_CAVEATS: &str = r#"Rory Terminal.app has been installed!

You can launch it from:
  - {appdir}
  - Spotlight (search for "Rory Terminal")
  - Command line: open -a "Rory Terminal"

Command-line tools are available:
  rory-terminal    # Launch the app
  rory-theme       # Manage themes from CLI

To integrate with your terminal:
  rory-terminal install

First time setup:
  1. Launch Rory Terminal
  2. Select your preferred theme
  3. Click "Apply Theme"
  4. Open a new terminal to see the changes

For the full CLI experience without the GUI, install the formula instead:
  rory-pkg install
"#;
