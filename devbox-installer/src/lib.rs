use anyhow::Context;
use clap::Parser;
use devbox_core::cli::{Cli, Command};
use devbox_core::config::Catalogue;
use devbox_core::downloader::{DownloadOptions, Downloader};
use devbox_core::errors::DevboxError;
use devbox_core::operator::{AssumeYes, Operator, TerminalOperator};
use devbox_core::packages::{detect_kind, ShellPackageManager};
use devbox_core::render::{self, emoji};
use devbox_core::report_store;
use devbox_core::steps::{build_steps, StepContext};
use devbox_hal::{LinuxHal, SystemHal};
use devbox_workflow::{ProbeState, Sequencer, StepEvent};
use std::io::Write;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

pub fn run() -> anyhow::Result<u8> {
    let cli = Cli::parse();
    devbox_core::logging::init_with(cli.log_file.clone());

    let hal = LinuxHal::new();
    let mut stdout = std::io::stdout().lock();
    if cli.yes {
        execute(&cli, &hal, &AssumeYes, &mut stdout)
    } else {
        execute(&cli, &hal, &TerminalOperator, &mut stdout)
    }
}

/// Exit status for an error that stopped devbox before or outside a run.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DevboxError>())
        .map(DevboxError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}

/// Run one CLI command against `hal`, writing user-facing output to `out`.
///
/// Returns the process exit status: 0 when the command achieved its goal.
pub fn execute(
    cli: &Cli,
    hal: &dyn SystemHal,
    operator: &dyn Operator,
    out: &mut dyn Write,
) -> anyhow::Result<u8> {
    let color = render::use_color(cli.no_color);

    if cli.command() == Command::Last {
        let path = report_store::report_path(cli.report.as_deref());
        let report = report_store::read_report(&path)?;
        write!(out, "{}", render::render_report(&report, color))?;
        return Ok(verdict(report.success()));
    }

    let catalogue = Catalogue::load(cli.config.as_deref())?;
    if cli.command() == Command::Catalogue {
        write!(out, "{}", catalogue.to_toml_string()?)?;
        return Ok(EXIT_SUCCESS);
    }

    let settings = &catalogue.settings;
    let command_timeout = Duration::from_secs(settings.command_timeout_secs);
    let os = match hal.os_release() {
        Ok(os) => Some(os),
        Err(err) => {
            log::warn!("Could not read os-release: {}", err);
            None
        }
    };
    let kind = detect_kind(settings.package_manager, os.as_ref());
    log::info!("Package manager: {:?}", kind);
    let packages = ShellPackageManager::new(kind, hal, command_timeout)
        .refresh_index(settings.refresh_package_index);
    let downloader = Downloader::new(DownloadOptions {
        max_retries: settings.download_retries,
        timeout_secs: settings.download_timeout_secs,
        download_dir: settings.download_dir.clone(),
        ..Default::default()
    })?;
    let ctx = StepContext {
        hal,
        operator,
        packages: &packages,
        downloader: &downloader,
        command_timeout,
    };
    let steps = build_steps(&catalogue, &ctx);
    let sequencer = Sequencer::new(cli.dry_run);

    match cli.command() {
        Command::Plan => {
            let order = sequencer.plan(&steps).map_err(DevboxError::from)?;
            write!(out, "{}", render::render_plan(&catalogue, &order))?;
            Ok(EXIT_SUCCESS)
        }
        Command::Check => {
            let survey = sequencer.survey(&steps).map_err(DevboxError::from)?;
            write!(out, "{}", render::render_survey(&survey, color))?;
            let complete = survey.iter().all(|e| e.state == ProbeState::Satisfied);
            Ok(verdict(complete))
        }
        _ => {
            log::info!(
                "{} Provisioning {} steps{}",
                emoji::TOOLBOX,
                steps.len(),
                if cli.dry_run { " (dry run)" } else { "" }
            );
            let report = sequencer
                .run_with_progress(&steps, |event| {
                    if let StepEvent::Started { name, index, total } = event {
                        let _ = writeln!(out, "[{}/{}] {}", index + 1, total, name);
                    }
                })
                .map_err(DevboxError::from)?;

            let mut path = report_store::report_path(cli.report.as_deref());
            if cli.dry_run {
                path = report_store::dry_run_report_path(&path);
            }
            match report_store::write_report(&path, &report) {
                Ok(()) => log::info!("Run report written to {}", path.display()),
                Err(err) => log::warn!("{:#}", err),
            }

            writeln!(out).context("failed to write output")?;
            write!(out, "{}", render::render_report(&report, color))?;
            Ok(verdict(report.success()))
        }
    }
}

fn verdict(ok: bool) -> u8 {
    if ok {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}
