//! CLI argument parsing for devbox

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "devbox",
    author,
    version,
    about = "🧰 devbox - provision an embedded Linux development workstation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Catalogue file (defaults to the built-in catalogue)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Run probes; log applies instead of executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Where to write the JSON run report (env: DEVBOX_REPORT_PATH)
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Log file (default: /var/log/devbox/devbox.log, stderr if unwritable)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Provision the workstation (default)
    Run,
    /// Show the execution order without probing anything
    Plan,
    /// Probe every step and report what is missing
    Check,
    /// Print the effective catalogue as TOML
    Catalogue,
    /// Show the report of the previous run
    Last,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_run() {
        let cli = Cli::try_parse_from(["devbox"]).unwrap();
        assert_eq!(cli.command(), Command::Run);
        assert!(!cli.dry_run);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "devbox",
            "check",
            "--config",
            "/etc/devbox.toml",
            "--yes",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.command(), Command::Check);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/devbox.toml")));
        assert!(cli.yes && cli.dry_run);
    }

    #[test]
    fn dry_run_help_describes_logged_applies() {
        let cmd = <Cli as clap::CommandFactory>::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == "dry_run")
            .unwrap();
        let help = arg.get_help().unwrap().to_string();
        assert_eq!(help, "Run probes; log applies instead of executing them");
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["devbox", "flash"]).is_err());
    }
}
