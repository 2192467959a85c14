//! Catalogue entries -> sequencer steps.
//!
//! Probes only read host state through the HAL. Applies honour the run's
//! dry-run flag: nothing is installed, downloaded, prompted or executed, and
//! the command that would have run is logged instead.

use crate::config::{ApplySpec, Catalogue, CommandLine, ProbeSpec, StepSpec};
use crate::downloader::Downloader;
use crate::operator::Operator;
use crate::packages::PackageManager;
use anyhow::{Context, Result};
use devbox_error::{HalError, StepError};
use devbox_hal::SystemHal;
use devbox_workflow::StepDefinition;
use std::time::Duration;

/// Probes are read-only queries; none should take long.
const PROBE_TIMEOUT_CAP: Duration = Duration::from_secs(60);

/// Everything concrete steps need from the outside world.
pub struct StepContext<'a> {
    pub hal: &'a dyn SystemHal,
    pub operator: &'a dyn Operator,
    pub packages: &'a dyn PackageManager,
    pub downloader: &'a Downloader,
    pub command_timeout: Duration,
}

impl StepContext<'_> {
    fn probe_timeout(&self) -> Duration {
        self.command_timeout.min(PROBE_TIMEOUT_CAP)
    }
}

/// One `StepDefinition` per catalogue entry, in catalogue order.
pub fn build_steps<'a>(catalogue: &'a Catalogue, ctx: &'a StepContext<'a>) -> Vec<StepDefinition<'a>> {
    catalogue
        .steps
        .iter()
        .map(|spec| build_step(spec, ctx))
        .collect()
}

pub fn build_step<'a>(spec: &'a StepSpec, ctx: &'a StepContext<'a>) -> StepDefinition<'a> {
    StepDefinition::new(
        spec.name.clone(),
        move || probe(&spec.probe, ctx),
        move |dry_run| apply(&spec.apply, ctx, dry_run),
    )
    .fatal(spec.fatal)
    .depends_on(spec.depends_on.iter().cloned())
}

pub fn probe(spec: &ProbeSpec, ctx: &StepContext<'_>) -> Result<bool> {
    match spec {
        ProbeSpec::Command { program } => Ok(ctx.hal.find_executable(program).is_some()),
        ProbeSpec::Path { path } => ctx
            .hal
            .path_exists(path)
            .with_context(|| format!("cannot check {}", path.display())),
        ProbeSpec::PathAbsent { path } => ctx
            .hal
            .path_exists(path)
            .map(|exists| !exists)
            .with_context(|| format!("cannot check {}", path.display())),
        ProbeSpec::CommandSucceeds { program, args } => {
            Ok(probe_output(ctx, program, args)?.is_some_and(|out| out.status.success()))
        }
        ProbeSpec::OutputContains {
            program,
            args,
            needle,
        } => Ok(probe_output(ctx, program, args)?.is_some_and(|out| {
            out.status.success() && String::from_utf8_lossy(&out.stdout).contains(needle.as_str())
        })),
        ProbeSpec::OsRelease { ids } => {
            let os = ctx.hal.os_release().context("cannot read os-release")?;
            Ok(os.matches_any(ids))
        }
        ProbeSpec::Root => Ok(ctx.hal.is_root()),
        ProbeSpec::Never => Ok(false),
    }
}

/// `None` when the program is not installed, which a probe reads as "not satisfied".
fn probe_output(
    ctx: &StepContext<'_>,
    program: &str,
    args: &[String],
) -> Result<Option<std::process::Output>> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match ctx.hal.command_output(program, &args, ctx.probe_timeout()) {
        Ok(out) => Ok(Some(out)),
        Err(HalError::CommandNotFound(_)) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("probe command {} failed", program)),
    }
}

pub fn apply(spec: &ApplySpec, ctx: &StepContext<'_>, dry_run: bool) -> Result<(), StepError> {
    match spec {
        ApplySpec::Packages { .. } => {
            let pkgs = spec
                .packages_for(ctx.packages.kind())
                .unwrap_or_default();
            ctx.packages.install(pkgs, dry_run)?;
            Ok(())
        }
        ApplySpec::Command {
            program,
            args,
            interactive,
        } => run_command(ctx, program, args, *interactive, dry_run),
        ApplySpec::Download {
            url,
            sha256,
            file_name,
            program,
            args,
        } => {
            if dry_run {
                log::info!("DRY RUN: download {} and run it with {}", url, program);
                return Ok(());
            }
            let artifact = ctx.downloader.fetch(url, sha256, file_name.as_deref())?;
            let mut full_args = args.clone();
            full_args.push(artifact.path.to_string_lossy().into_owned());
            run_command(ctx, program, &full_args, true, false)
        }
        ApplySpec::Confirm { prompt, then } => {
            if dry_run {
                log::info!("DRY RUN: would ask \"{}\"", prompt);
                return Ok(());
            }
            if !ctx.operator.confirm(prompt)? {
                return Err(StepError::OperatorDeclined(prompt.clone()));
            }
            match then {
                Some(CommandLine {
                    program,
                    args,
                    interactive,
                }) => run_command(ctx, program, args, *interactive, false),
                None => Ok(()),
            }
        }
        ApplySpec::Fail { message } => Err(StepError::apply(message.clone())),
    }
}

fn run_command(
    ctx: &StepContext<'_>,
    program: &str,
    args: &[String],
    interactive: bool,
    dry_run: bool,
) -> Result<(), StepError> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    if dry_run {
        log::info!("DRY RUN: {} {}", program, args.join(" "));
        return Ok(());
    }
    if interactive {
        ctx.hal
            .command_interactive(program, &args, ctx.command_timeout)?;
    } else {
        ctx.hal.command_status(program, &args, ctx.command_timeout)?;
    }
    Ok(())
}
