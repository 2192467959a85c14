use crate::config::PackageManagerKind;
use anyhow::{anyhow, Context, Result};
use devbox_hal::{OsReleaseInfo, SystemHal};
use std::cell::Cell;
use std::time::Duration;

pub trait PackageManager {
    fn kind(&self) -> PackageManagerKind;
    fn install(&self, pkgs: &[String], dry_run: bool) -> Result<()>;
    fn update(&self, dry_run: bool) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

pub fn install_command_spec(kind: PackageManagerKind, pkgs: &[String]) -> CommandSpec {
    let mut spec = match kind {
        PackageManagerKind::Dnf => CommandSpec::new("dnf", &["install", "-y"]),
        _ => CommandSpec::new("apt-get", &["install", "-y", "-q", "--no-install-recommends"]),
    };
    spec.args.extend(pkgs.iter().cloned());
    spec
}

pub fn update_command_spec(kind: PackageManagerKind) -> CommandSpec {
    match kind {
        PackageManagerKind::Dnf => CommandSpec::new("dnf", &["makecache", "-y"]),
        _ => CommandSpec::new("apt-get", &["update", "-q"]),
    }
}

/// Resolve `auto` from os-release: Fedora-like hosts use dnf, everything else apt.
pub fn detect_kind(requested: PackageManagerKind, os: Option<&OsReleaseInfo>) -> PackageManagerKind {
    match requested {
        PackageManagerKind::Auto => {
            let fedora_like = os.is_some_and(|os| {
                os.matches_any(&["fedora".to_string(), "rhel".to_string(), "centos".to_string()])
            });
            if fedora_like {
                PackageManagerKind::Dnf
            } else {
                PackageManagerKind::Apt
            }
        }
        explicit => explicit,
    }
}

/// apt-get / dnf driven through the HAL.
///
/// The package index is refreshed at most once per run, right before the
/// first real install.
pub struct ShellPackageManager<'h> {
    kind: PackageManagerKind,
    hal: &'h dyn SystemHal,
    timeout: Duration,
    refresh_index: bool,
    refreshed: Cell<bool>,
}

impl<'h> ShellPackageManager<'h> {
    pub fn new(kind: PackageManagerKind, hal: &'h dyn SystemHal, timeout: Duration) -> Self {
        Self {
            kind,
            hal,
            timeout,
            refresh_index: true,
            refreshed: Cell::new(false),
        }
    }

    pub fn refresh_index(mut self, refresh: bool) -> Self {
        self.refresh_index = refresh;
        self
    }

    fn run(&self, spec: &CommandSpec) -> Result<()> {
        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        self.hal
            .command_status(&spec.program, &args, self.timeout)
            .with_context(|| format!("{} failed", spec.display()))
    }
}

impl PackageManager for ShellPackageManager<'_> {
    fn kind(&self) -> PackageManagerKind {
        self.kind
    }

    fn install(&self, pkgs: &[String], dry_run: bool) -> Result<()> {
        if pkgs.is_empty() {
            return Err(anyhow!("no packages to install"));
        }
        let spec = install_command_spec(self.kind, pkgs);
        if dry_run {
            log::info!("DRY RUN: {}", spec.display());
            return Ok(());
        }
        if self.refresh_index && !self.refreshed.get() {
            self.update(false)?;
        }
        log::info!("📦 Installing {}", pkgs.join(" "));
        self.run(&spec)
    }

    fn update(&self, dry_run: bool) -> Result<()> {
        let spec = update_command_spec(self.kind);
        if dry_run {
            log::info!("DRY RUN: {}", spec.display());
            return Ok(());
        }
        self.run(&spec)?;
        self.refreshed.set(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devbox_hal::FakeHal;

    const T: Duration = Duration::from_secs(60);

    fn pkgs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn install_command_includes_packages() {
        let spec = install_command_spec(PackageManagerKind::Dnf, &pkgs(&["vim", "git"]));
        assert_eq!(spec.program, "dnf");
        assert_eq!(spec.args, vec!["install", "-y", "vim", "git"]);

        let spec = install_command_spec(PackageManagerKind::Apt, &pkgs(&["git"]));
        assert_eq!(spec.display(), "apt-get install -y -q --no-install-recommends git");
    }

    #[test]
    fn auto_detects_from_os_release() {
        let fedora = OsReleaseInfo {
            id: Some("fedora".to_string()),
            ..Default::default()
        };
        let mint = OsReleaseInfo {
            id: Some("linuxmint".to_string()),
            id_like: vec!["ubuntu".to_string(), "debian".to_string()],
            ..Default::default()
        };
        assert_eq!(
            detect_kind(PackageManagerKind::Auto, Some(&fedora)),
            PackageManagerKind::Dnf
        );
        assert_eq!(
            detect_kind(PackageManagerKind::Auto, Some(&mint)),
            PackageManagerKind::Apt
        );
        assert_eq!(detect_kind(PackageManagerKind::Auto, None), PackageManagerKind::Apt);
        assert_eq!(
            detect_kind(PackageManagerKind::Dnf, Some(&mint)),
            PackageManagerKind::Dnf
        );
    }

    #[test]
    fn index_is_refreshed_once() {
        let hal = FakeHal::new();
        let mgr = ShellPackageManager::new(PackageManagerKind::Apt, &hal, T);
        mgr.install(&pkgs(&["git"]), false).unwrap();
        mgr.install(&pkgs(&["curl"]), false).unwrap();
        assert_eq!(
            hal.commands(),
            vec![
                "apt-get update -q",
                "apt-get install -y -q --no-install-recommends git",
                "apt-get install -y -q --no-install-recommends curl",
            ]
        );
    }

    #[test]
    fn dry_run_does_not_execute() {
        let hal = FakeHal::new();
        let mgr = ShellPackageManager::new(PackageManagerKind::Dnf, &hal, T);
        mgr.install(&pkgs(&["vim"]), true).unwrap();
        mgr.update(true).unwrap();
        assert!(hal.commands().is_empty());
    }

    #[test]
    fn failed_install_carries_stderr() {
        let hal = FakeHal::new();
        hal.script_command("dnf install -y moby-engine", 1, "", "No match for argument");
        let mgr = ShellPackageManager::new(PackageManagerKind::Dnf, &hal, T).refresh_index(false);
        let err = mgr.install(&pkgs(&["moby-engine"]), false).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("dnf install -y moby-engine failed"), "{msg}");
        assert!(msg.contains("No match for argument"), "{msg}");
    }
}
