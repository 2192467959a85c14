use crate::graph::execution_order;
use crate::report::{now_unix_ms, RunReport, StepResult, StepStatus};
use crate::step::StepDefinition;
use devbox_error::{ConfigurationError, StepError};
use std::collections::HashMap;
use std::time::Instant;

/// Progress events emitted while the sequencer runs.
#[derive(Debug)]
pub enum StepEvent<'r> {
    /// A step is about to be probed (not emitted for blocked steps).
    Started {
        name: &'r str,
        index: usize,
        total: usize,
    },
    /// A step reached its terminal status.
    Finished(&'r StepResult),
}

/// Result of probing a step without applying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeState {
    Satisfied,
    Missing,
    /// The probe itself failed; a run would attempt the apply.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyEntry {
    pub name: String,
    pub state: ProbeState,
}

/// Runs provisioning steps in dependency order, probing before applying.
///
/// Execution is strictly sequential: installers share the package database,
/// the filesystem and the operator's terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequencer {
    dry_run: bool,
}

impl Sequencer {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn run(&self, steps: &[StepDefinition<'_>]) -> Result<RunReport, ConfigurationError> {
        self.run_with_progress(steps, |_| {})
    }

    /// Validate the graph, then visit every step exactly once.
    ///
    /// A `ConfigurationError` is returned before any probe or apply runs.
    pub fn run_with_progress(
        &self,
        steps: &[StepDefinition<'_>],
        mut on_event: impl FnMut(StepEvent<'_>),
    ) -> Result<RunReport, ConfigurationError> {
        let order = self.plan(steps)?;
        let started_at = now_unix_ms();
        let total = order.len();

        let mut results: Vec<StepResult> = Vec::with_capacity(total);
        let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(total);

        for (position, &idx) in order.iter().enumerate() {
            let step = &steps[idx];

            let result = match blocking_dependency(step, &results, &by_name) {
                Some(detail) => {
                    log::warn!("⛔ {}: blocked ({})", step.name, detail);
                    StepResult::new(&step.name, StepStatus::Blocked, detail, 0, step.fatal)
                }
                None => {
                    on_event(StepEvent::Started {
                        name: &step.name,
                        index: position,
                        total,
                    });
                    self.execute(step)
                }
            };

            on_event(StepEvent::Finished(&result));
            by_name.insert(step.name.as_str(), results.len());
            results.push(result);
        }

        let report = RunReport::new(self.dry_run, started_at, results);
        log::info!(
            "Sequence finished: {} applied, {} skipped, {} failed, {} blocked",
            report.count(StepStatus::Applied),
            report.count(StepStatus::Skipped),
            report.count(StepStatus::Failed),
            report.count(StepStatus::Blocked),
        );
        Ok(report)
    }

    /// Probe every step in execution order without applying anything.
    pub fn survey(
        &self,
        steps: &[StepDefinition<'_>],
    ) -> Result<Vec<SurveyEntry>, ConfigurationError> {
        let order = self.plan(steps)?;
        Ok(order
            .into_iter()
            .map(|idx| {
                let step = &steps[idx];
                let state = match (step.probe)() {
                    Ok(true) => ProbeState::Satisfied,
                    Ok(false) => ProbeState::Missing,
                    Err(err) => ProbeState::Unknown(format!("{:#}", err)),
                };
                SurveyEntry {
                    name: step.name.clone(),
                    state,
                }
            })
            .collect())
    }

    /// Validated execution order as step indices.
    pub fn plan(&self, steps: &[StepDefinition<'_>]) -> Result<Vec<usize>, ConfigurationError> {
        let nodes: Vec<_> = steps.iter().map(StepDefinition::node).collect();
        execution_order(&nodes).map_err(|err| {
            log::error!("Invalid step graph: {}", err);
            err
        })
    }

    fn execute(&self, step: &StepDefinition<'_>) -> StepResult {
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

        let probe_note = match (step.probe)() {
            Ok(true) => {
                log::info!("✅ {}: already satisfied", step.name);
                return StepResult::new(
                    &step.name,
                    StepStatus::Skipped,
                    "already satisfied",
                    elapsed_ms(start),
                    step.fatal,
                );
            }
            Ok(false) => None,
            Err(err) => {
                log::warn!(
                    "🔍 {}: probe failed ({:#}); attempting apply",
                    step.name,
                    err
                );
                Some(format!("probe failed: {:#}", err))
            }
        };

        match (step.apply)(self.dry_run) {
            Ok(()) => {
                log::info!("🧩 {}: applied", step.name);
                let detail = match probe_note {
                    Some(note) => format!("applied after {}", note),
                    None if self.dry_run => "dry run".to_string(),
                    None => String::new(),
                };
                StepResult::new(
                    &step.name,
                    StepStatus::Applied,
                    detail,
                    elapsed_ms(start),
                    step.fatal,
                )
            }
            Err(err) => {
                let fatal = step.fatal || err.forces_fatal();
                if fatal {
                    log::error!("❌ {}: failed (fatal): {:#}", step.name, err);
                } else {
                    log::warn!("⚠️ {}: failed: {:#}", step.name, err);
                }
                StepResult::new(
                    &step.name,
                    StepStatus::Failed,
                    failure_detail(&err, probe_note),
                    elapsed_ms(start),
                    fatal,
                )
            }
        }
    }
}

fn failure_detail(err: &StepError, probe_note: Option<String>) -> String {
    let msg = match err {
        StepError::Apply(inner) => format!("{:#}", inner),
        StepError::OperatorDeclined(_) => err.to_string(),
    };
    match probe_note {
        Some(note) => format!("{} ({})", msg, note),
        None => msg,
    }
}

/// First dependency that prevents `step` from running, described for the report.
fn blocking_dependency(
    step: &StepDefinition<'_>,
    results: &[StepResult],
    by_name: &HashMap<&str, usize>,
) -> Option<String> {
    step.depends_on.iter().find_map(|dep| {
        let result = &results[*by_name.get(dep.as_str())?];
        match result.status() {
            StepStatus::Failed if result.fatal() => {
                Some(format!("fatal step '{}' failed", dep))
            }
            StepStatus::Blocked => Some(format!("dependency '{}' is blocked", dep)),
            _ => None,
        }
    })
}
