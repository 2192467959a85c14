//! Console rendering for run reports, plans and surveys.

use crate::config::Catalogue;
use crossterm::style::{Color, Stylize};
use devbox_workflow::{ProbeState, RunReport, StepStatus, SurveyEntry};
use std::io::IsTerminal;

/// Centralized emoji for consistent UX copy.
pub mod emoji {
    pub const TOOLBOX: &str = "🧰";
    pub const ACTION: &str = "🧩";
    pub const SUCCESS: &str = "✅";
    pub const ERROR: &str = "❌";
    pub const WARNING: &str = "⚠️";
    pub const BLOCKED: &str = "⛔";
    pub const MISSING: &str = "⬜";
    pub const SEARCH: &str = "🔍";
    pub const PARTY: &str = "🎉";
}

pub fn with(emoji: &str, message: &str) -> String {
    format!("{} {}", emoji, message)
}

/// Colour only when stdout is a terminal and `NO_COLOR` is unset.
pub fn use_color(disabled_by_flag: bool) -> bool {
    !disabled_by_flag && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

fn paint(text: &str, color: Color, enabled: bool) -> String {
    if enabled {
        text.with(color).to_string()
    } else {
        text.to_string()
    }
}

fn status_style(status: StepStatus) -> (&'static str, Color) {
    match status {
        StepStatus::Skipped => (emoji::SUCCESS, Color::DarkGrey),
        StepStatus::Applied => (emoji::ACTION, Color::Green),
        StepStatus::Failed => (emoji::ERROR, Color::Red),
        StepStatus::Blocked => (emoji::BLOCKED, Color::Yellow),
    }
}

pub fn render_report(report: &RunReport, color: bool) -> String {
    let mut out = String::new();
    let title = if report.dry_run() {
        "devbox run (dry run)"
    } else {
        "devbox run"
    };
    out.push_str(&with(emoji::TOOLBOX, title));
    out.push('\n');

    for result in report.results() {
        let (icon, tint) = status_style(result.status());
        let mut line = format!(
            "  {} {} {}",
            icon,
            paint(&format!("{:<8}", result.status()), tint, color),
            result.name()
        );
        if result.status() == StepStatus::Failed && !result.fatal() {
            line.push_str(" (non-fatal)");
        }
        if !result.detail().is_empty() {
            line.push_str(&format!(": {}", result.detail()));
        }
        out.push_str(&line);
        out.push('\n');
    }

    out.push_str(&format!(
        "\n  applied {} · skipped {} · failed {} · blocked {}\n",
        report.count(StepStatus::Applied),
        report.count(StepStatus::Skipped),
        report.count(StepStatus::Failed),
        report.count(StepStatus::Blocked),
    ));

    let verdict = if !report.success() {
        let failed: Vec<&str> = report.fatal_failures().map(|r| r.name()).collect();
        paint(
            &with(
                emoji::ERROR,
                &format!("Provisioning failed: {}", failed.join(", ")),
            ),
            Color::Red,
            color,
        )
    } else if report.all_skipped() {
        paint(
            &with(emoji::SUCCESS, "Nothing to do: workstation already provisioned"),
            Color::Green,
            color,
        )
    } else {
        paint(
            &with(emoji::PARTY, "Provisioning complete"),
            Color::Green,
            color,
        )
    };
    out.push_str(&verdict);
    out.push('\n');
    out
}

/// Execution order with each step's guard and action, nothing executed.
pub fn render_plan(catalogue: &Catalogue, order: &[usize]) -> String {
    let mut out = with(emoji::TOOLBOX, "devbox plan");
    out.push('\n');
    for (position, &idx) in order.iter().enumerate() {
        let Some(step) = catalogue.steps.get(idx) else {
            continue;
        };
        let mut line = format!("  {:02}. {}", position + 1, step.name);
        if step.fatal {
            line.push_str(" [fatal]");
        }
        line.push_str(&format!(" ({})", step.apply.kind()));
        if !step.depends_on.is_empty() {
            line.push_str(&format!(" after {}", step.depends_on.join(", ")));
        }
        if let Some(description) = &step.description {
            line.push_str(&format!(": {}", description));
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

pub fn render_survey(entries: &[SurveyEntry], color: bool) -> String {
    let mut out = with(emoji::SEARCH, "devbox check");
    out.push('\n');
    for entry in entries {
        let line = match &entry.state {
            ProbeState::Satisfied => format!(
                "  {} {} {}",
                emoji::SUCCESS,
                paint("satisfied", Color::Green, color),
                entry.name
            ),
            ProbeState::Missing => format!(
                "  {} {}   {}",
                emoji::MISSING,
                paint("missing", Color::Yellow, color),
                entry.name
            ),
            ProbeState::Unknown(detail) => format!(
                "  {} {}   {}: {}",
                emoji::WARNING,
                paint("unknown", Color::Red, color),
                entry.name,
                detail
            ),
        };
        out.push_str(&line);
        out.push('\n');
    }
    let satisfied = entries
        .iter()
        .filter(|e| e.state == ProbeState::Satisfied)
        .count();
    out.push_str(&format!("\n  {} of {} satisfied\n", satisfied, entries.len()));
    out
}
