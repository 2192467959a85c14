use crate::graph::StepNode;
use devbox_error::StepError;

/// Read-only check: `Ok(true)` when the goal state already holds.
pub type ProbeFn<'a> = Box<dyn Fn() -> anyhow::Result<bool> + 'a>;

/// Side-effecting action. The flag is the run's dry-run mode.
pub type ApplyFn<'a> = Box<dyn Fn(bool) -> Result<(), StepError> + 'a>;

/// One unit of provisioning work.
pub struct StepDefinition<'a> {
    pub name: String,
    pub probe: ProbeFn<'a>,
    pub apply: ApplyFn<'a>,
    /// A failed fatal step blocks every step that depends on it.
    pub fatal: bool,
    pub depends_on: Vec<String>,
}

impl<'a> StepDefinition<'a> {
    pub fn new(
        name: impl Into<String>,
        probe: impl Fn() -> anyhow::Result<bool> + 'a,
        apply: impl Fn(bool) -> Result<(), StepError> + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            probe: Box::new(probe),
            apply: Box::new(apply),
            fatal: false,
            depends_on: Vec::new(),
        }
    }

    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    /// Append dependencies, keeping the first occurrence of each name.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            let dep = dep.into();
            if !self.depends_on.contains(&dep) {
                self.depends_on.push(dep);
            }
        }
        self
    }

    pub fn node(&self) -> StepNode<'_> {
        StepNode {
            name: &self.name,
            depends_on: &self.depends_on,
        }
    }
}

impl std::fmt::Debug for StepDefinition<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("fatal", &self.fatal)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_dedupes_dependencies() {
        let step = StepDefinition::new("extension", || Ok(false), |_| Ok(()))
            .fatal(true)
            .depends_on(["editor", "editor"])
            .depends_on(vec!["toolchain".to_string()]);
        assert!(step.fatal);
        assert_eq!(step.depends_on, vec!["editor", "toolchain"]);
    }
}
