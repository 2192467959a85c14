//! Provisioning catalogue: which steps exist, how each one is probed and how
//! it is applied.
//!
//! A catalogue is TOML. `[settings]` holds run-wide knobs and every
//! `[[step]]` table becomes one sequencer step, in declaration order.
//! The default catalogue is embedded in the binary.

use crate::errors::DevboxError;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_CATALOGUE_TOML: &str = include_str!("../catalogue/default.toml");

pub static DEFAULT_CATALOGUE: Lazy<Result<Catalogue, String>> =
    Lazy::new(|| Catalogue::from_toml_str(DEFAULT_CATALOGUE_TOML).map_err(|e| format!("{:#}", e)));

pub trait ValidateConfig {
    fn validate_cfg(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    /// Pick from `/etc/os-release` at start-up.
    #[default]
    Auto,
    Apt,
    Dnf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub package_manager: PackageManagerKind,
    /// Upper bound for any single probe or apply command.
    pub command_timeout_secs: u64,
    pub download_dir: PathBuf,
    pub download_retries: usize,
    pub download_timeout_secs: u64,
    /// Refresh the package index once before the first install of a run.
    pub refresh_package_index: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            package_manager: PackageManagerKind::Auto,
            command_timeout_secs: 1800,
            download_dir: PathBuf::from("/var/cache/devbox"),
            download_retries: 3,
            download_timeout_secs: 300,
            refresh_package_index: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fatal: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub probe: ProbeSpec,
    pub apply: ApplySpec,
}

/// How a step decides its goal state is already in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeSpec {
    /// `program` resolves on PATH.
    Command { program: String },
    /// The path exists.
    Path { path: PathBuf },
    /// The path does not exist (e.g. a pending-reboot marker).
    PathAbsent { path: PathBuf },
    /// The command exits 0.
    CommandSucceeds {
        program: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
    /// The command exits 0 and its stdout contains `needle`.
    OutputContains {
        program: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        needle: String,
    },
    /// `/etc/os-release` ID or ID_LIKE is one of `ids`.
    OsRelease { ids: Vec<String> },
    /// Running with an effective uid of 0.
    Root,
    /// Always apply.
    Never,
}

/// A command line run by an apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandLine {
    pub program: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Attach the operator's terminal instead of capturing output.
    #[serde(default)]
    pub interactive: bool,
}

/// How a step brings the workstation to its goal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApplySpec {
    /// Install distribution packages. `apt`/`dnf` override `packages` for
    /// that package manager.
    Packages {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        packages: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        apt: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dnf: Option<Vec<String>>,
    },
    Command {
        program: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
        #[serde(default)]
        interactive: bool,
    },
    /// Fetch `url`, verify it against `sha256`, then run `program args... <file>`.
    Download {
        url: String,
        sha256: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
        program: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
    /// Ask the operator; a "no" is a fatal failure. `then` runs on "yes".
    Confirm {
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        then: Option<CommandLine>,
    },
    /// Always fail with `message` (for preconditions the tool cannot fix).
    Fail { message: String },
}

impl ApplySpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ApplySpec::Packages { .. } => "packages",
            ApplySpec::Command { .. } => "command",
            ApplySpec::Download { .. } => "download",
            ApplySpec::Confirm { .. } => "confirm",
            ApplySpec::Fail { .. } => "fail",
        }
    }

    /// Package list for the resolved package manager.
    pub fn packages_for(&self, manager: PackageManagerKind) -> Option<&[String]> {
        match self {
            ApplySpec::Packages { packages, apt, dnf } => {
                let specific = match manager {
                    PackageManagerKind::Apt => apt.as_deref(),
                    PackageManagerKind::Dnf => dnf.as_deref(),
                    PackageManagerKind::Auto => None,
                };
                Some(specific.unwrap_or(packages.as_slice()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalogue {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, rename = "step")]
    pub steps: Vec<StepSpec>,
}

impl Catalogue {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let catalogue: Catalogue = toml::from_str(text)
            .map_err(|e| invalid(format!("catalogue is not valid TOML: {}", e)))?;
        catalogue.validate_cfg()?;
        Ok(catalogue)
    }

    /// Load `path`, or the embedded default catalogue when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read catalogue {}", path.display()))?;
                log::info!("Loaded catalogue from {}", path.display());
                Self::from_toml_str(&text)
                    .with_context(|| format!("Invalid catalogue {}", path.display()))
            }
            None => DEFAULT_CATALOGUE
                .clone()
                .map_err(|e| anyhow::anyhow!("Embedded catalogue is invalid: {}", e)),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize catalogue")
    }

    pub fn step(&self, name: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.name == name)
    }
}

fn invalid(msg: impl Into<String>) -> anyhow::Error {
    DevboxError::ValidationFailed(msg.into()).into()
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

impl ValidateConfig for Settings {
    fn validate_cfg(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(invalid("settings.command_timeout_secs must be positive"));
        }
        if self.download_timeout_secs == 0 {
            return Err(invalid("settings.download_timeout_secs must be positive"));
        }
        if self.download_dir.as_os_str().is_empty() {
            return Err(invalid("settings.download_dir must not be empty"));
        }
        Ok(())
    }
}

impl ValidateConfig for StepSpec {
    fn validate_cfg(&self) -> Result<()> {
        let name = &self.name;
        if name.trim().is_empty() {
            return Err(invalid("step name must not be empty"));
        }
        match &self.probe {
            ProbeSpec::Command { program }
            | ProbeSpec::CommandSucceeds { program, .. }
            | ProbeSpec::OutputContains { program, .. }
                if program.trim().is_empty() =>
            {
                return Err(invalid(format!("step '{}': probe program is empty", name)));
            }
            ProbeSpec::OsRelease { ids } if ids.is_empty() => {
                return Err(invalid(format!("step '{}': os_release probe needs ids", name)));
            }
            _ => {}
        }
        match &self.apply {
            ApplySpec::Packages { packages, apt, dnf } => {
                let any = !packages.is_empty()
                    || apt.as_ref().is_some_and(|p| !p.is_empty())
                    || dnf.as_ref().is_some_and(|p| !p.is_empty());
                if !any {
                    return Err(invalid(format!("step '{}': no packages listed", name)));
                }
            }
            ApplySpec::Command { program, .. } if program.trim().is_empty() => {
                return Err(invalid(format!("step '{}': apply program is empty", name)));
            }
            ApplySpec::Download {
                url, sha256, program, ..
            } => {
                let parsed = Url::parse(url)
                    .map_err(|e| invalid(format!("step '{}': bad url {}: {}", name, url, e)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(invalid(format!(
                        "step '{}': unsupported url scheme {}",
                        name,
                        parsed.scheme()
                    )));
                }
                if !is_sha256_hex(sha256) {
                    return Err(invalid(format!(
                        "step '{}': sha256 must be 64 hex characters",
                        name
                    )));
                }
                if program.trim().is_empty() {
                    return Err(invalid(format!("step '{}': installer program is empty", name)));
                }
            }
            ApplySpec::Confirm { prompt, then } => {
                if prompt.trim().is_empty() {
                    return Err(invalid(format!("step '{}': prompt is empty", name)));
                }
                if then.as_ref().is_some_and(|c| c.program.trim().is_empty()) {
                    return Err(invalid(format!("step '{}': confirm command is empty", name)));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl ValidateConfig for Catalogue {
    fn validate_cfg(&self) -> Result<()> {
        self.settings.validate_cfg()?;
        for step in &self.steps {
            step.validate_cfg()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn parse(text: &str) -> Result<Catalogue> {
        Catalogue::from_toml_str(text)
    }

    #[test]
    fn embedded_catalogue_is_valid() {
        let catalogue = Catalogue::load(None).unwrap();
        assert!(!catalogue.steps.is_empty());
        assert!(catalogue.steps.iter().any(|s| s.fatal));
    }

    #[test]
    fn minimal_step_uses_defaults() {
        let catalogue = parse(
            r#"
            [[step]]
            name = "git"
            probe = { kind = "command", program = "git" }
            apply = { kind = "packages", packages = ["git"] }
            "#,
        )
        .unwrap();
        assert_eq!(catalogue.settings, Settings::default());
        let step = &catalogue.steps[0];
        assert!(!step.fatal);
        assert!(step.depends_on.is_empty());
        assert_eq!(
            step.probe,
            ProbeSpec::Command {
                program: "git".to_string()
            }
        );
    }

    #[test]
    fn package_overrides_follow_manager() {
        let apply = ApplySpec::Packages {
            packages: vec!["docker".to_string()],
            apt: Some(vec!["docker.io".to_string()]),
            dnf: None,
        };
        assert_eq!(
            apply.packages_for(PackageManagerKind::Apt).unwrap(),
            ["docker.io".to_string()]
        );
        assert_eq!(
            apply.packages_for(PackageManagerKind::Dnf).unwrap(),
            ["docker".to_string()]
        );
    }

    #[test]
    fn rejects_bad_checksum_and_url() {
        let step = |url: &str, sha: &str| {
            format!(
                r#"
                [[step]]
                name = "vendor"
                probe = {{ kind = "path", path = "/opt/vendor/bin/tool" }}
                apply = {{ kind = "download", url = "{url}", sha256 = "{sha}", program = "sh" }}
                "#
            )
        };
        assert!(parse(&step("https://vendor.example/tool.sh", SHA)).is_ok());
        assert!(parse(&step("https://vendor.example/tool.sh", "abc")).is_err());
        assert!(parse(&step("ftp://vendor.example/tool.sh", SHA)).is_err());
        assert!(parse(&step("not a url", SHA)).is_err());
    }

    #[test]
    fn rejects_zero_timeouts_and_unknown_keys() {
        let err = parse("[settings]\ncommand_timeout_secs = 0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("command_timeout_secs"));
        assert!(parse("[settings]\nbogus = 1\n").is_err());
    }

    #[test]
    fn rejects_empty_package_list() {
        let text = r#"
            [[step]]
            name = "nothing"
            probe = { kind = "never" }
            apply = { kind = "packages" }
        "#;
        assert!(parse(text).is_err());
    }

    #[test]
    fn serialized_catalogue_parses_back() {
        let original = Catalogue::load(None).unwrap();
        let text = original.to_toml_string().unwrap();
        assert_eq!(parse(&text).unwrap(), original);
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.toml");
        fs::write(
            &path,
            "[[step]]\nname = \"root\"\nfatal = true\nprobe = { kind = \"root\" }\napply = { kind = \"fail\", message = \"run as root\" }\n",
        )
        .unwrap();
        let catalogue = Catalogue::load(Some(&path)).unwrap();
        assert_eq!(catalogue.step("root").unwrap().probe, ProbeSpec::Root);
        assert!(Catalogue::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
