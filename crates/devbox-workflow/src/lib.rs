//! devbox provisioning sequencer.
//!
//! This crate holds the deterministic execution primitives: the step model,
//! dependency ordering, the probe-then-apply runner and the run report.
//! Higher-level crates provide the concrete probes and apply actions.

pub mod graph;
pub mod report;
pub mod runner;
pub mod step;

pub use devbox_error::{ConfigurationError, StepError};
pub use graph::{execution_order, StepNode};
pub use report::{RunReport, StepResult, StepStatus};
pub use runner::{ProbeState, Sequencer, StepEvent, SurveyEntry};
pub use step::{ApplyFn, ProbeFn, StepDefinition};
