use devbox_workflow::{ConfigurationError, Sequencer, StepDefinition, StepError, StepStatus};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

/// In-memory workstation: probes look at `installed`, applies add to it.
#[derive(Default)]
struct World {
    installed: RefCell<HashSet<String>>,
    broken: RefCell<HashSet<String>>,
    probes: RefCell<BTreeMap<String, usize>>,
    applies: RefCell<BTreeMap<String, usize>>,
}

impl World {
    fn install(&self, name: &str) {
        self.installed.borrow_mut().insert(name.to_string());
    }

    fn break_step(&self, name: &str) {
        self.broken.borrow_mut().insert(name.to_string());
    }

    fn applies_of(&self, name: &str) -> usize {
        self.applies.borrow().get(name).copied().unwrap_or(0)
    }

    fn total_applies(&self) -> usize {
        self.applies.borrow().values().sum()
    }

    fn total_probes(&self) -> usize {
        self.probes.borrow().values().sum()
    }

    fn step<'w>(&'w self, name: &str) -> StepDefinition<'w> {
        let probe_name = name.to_string();
        let apply_name = name.to_string();
        StepDefinition::new(
            name,
            move || {
                *self.probes.borrow_mut().entry(probe_name.clone()).or_default() += 1;
                Ok(self.installed.borrow().contains(&probe_name))
            },
            move |_dry_run| {
                *self.applies.borrow_mut().entry(apply_name.clone()).or_default() += 1;
                if self.broken.borrow().contains(&apply_name) {
                    return Err(StepError::apply(format!("{} installer exited 1", apply_name)));
                }
                self.installed.borrow_mut().insert(apply_name.clone());
                Ok(())
            },
        )
    }
}

fn toolchain(world: &World) -> Vec<StepDefinition<'_>> {
    vec![
        world.step("os-check").fatal(true),
        world.step("docker").fatal(true).depends_on(["os-check"]),
        world.step("docker-group").depends_on(["docker"]),
        world.step("compose-plugin").depends_on(["docker-group"]),
        world.step("editor").depends_on(["os-check"]),
        world.step("editor-extension").depends_on(["editor"]),
        world.step("cross-gcc").fatal(true).depends_on(["os-check"]),
        world.step("vendor-cli").depends_on(["cross-gcc"]),
    ]
}

#[test]
fn every_step_gets_exactly_one_result() {
    let world = World::default();
    world.break_step("docker");
    let steps = toolchain(&world);

    let report = Sequencer::new(false).run(&steps).unwrap();

    assert_eq!(report.results().len(), steps.len());
    let names: HashSet<&str> = report.results().iter().map(|r| r.name()).collect();
    assert_eq!(names.len(), steps.len());
    for step in &steps {
        assert!(names.contains(step.name.as_str()), "missing {}", step.name);
        assert!(world.probes.borrow().get(&step.name).copied().unwrap_or(0) <= 1);
        assert!(world.applies_of(&step.name) <= 1);
    }
}

#[test]
fn satisfied_probe_never_applies() {
    let world = World::default();
    world.install("os-check");
    world.install("editor");
    let steps = toolchain(&world);

    let report = Sequencer::new(false).run(&steps).unwrap();

    assert_eq!(report.status_of("os-check"), Some(StepStatus::Skipped));
    assert_eq!(report.status_of("editor"), Some(StepStatus::Skipped));
    assert_eq!(world.applies_of("os-check"), 0);
    assert_eq!(world.applies_of("editor"), 0);
    assert_eq!(report.status_of("editor-extension"), Some(StepStatus::Applied));
}

#[test]
fn fatal_failure_blocks_exactly_its_dependents() {
    let world = World::default();
    world.break_step("docker");
    let steps = toolchain(&world);

    let report = Sequencer::new(false).run(&steps).unwrap();

    assert_eq!(report.status_of("docker"), Some(StepStatus::Failed));
    // Reachable through a non-fatal intermediate step as well.
    for blocked in ["docker-group", "compose-plugin"] {
        assert_eq!(report.status_of(blocked), Some(StepStatus::Blocked), "{blocked}");
        assert_eq!(world.applies_of(blocked), 0);
    }
    for independent in ["os-check", "editor", "editor-extension", "cross-gcc", "vendor-cli"] {
        assert_eq!(
            report.status_of(independent),
            Some(StepStatus::Applied),
            "{independent}"
        );
    }
    assert!(!report.success());
    assert_eq!(
        report.fatal_failures().map(|r| r.name()).collect::<Vec<_>>(),
        vec!["docker"]
    );
}

#[test]
fn blocked_steps_are_not_probed() {
    let world = World::default();
    world.break_step("os-check");
    let steps = toolchain(&world);

    let report = Sequencer::new(false).run(&steps).unwrap();

    assert_eq!(report.count(StepStatus::Blocked), steps.len() - 1);
    assert_eq!(world.total_probes(), 1);
    assert_eq!(world.total_applies(), 1);
}

#[test]
fn non_fatal_failure_does_not_block_dependents() {
    let world = World::default();
    world.break_step("editor");
    let steps = toolchain(&world);

    let report = Sequencer::new(false).run(&steps).unwrap();

    assert_eq!(report.status_of("editor"), Some(StepStatus::Failed));
    assert_eq!(report.status_of("editor-extension"), Some(StepStatus::Applied));
    assert!(report.success());
}

#[test]
fn rerun_after_success_skips_everything() {
    let world = World::default();
    let steps = toolchain(&world);
    let sequencer = Sequencer::new(false);

    let first = sequencer.run(&steps).unwrap();
    assert!(first.success());
    assert_eq!(first.count(StepStatus::Applied), steps.len());

    let second = sequencer.run(&steps).unwrap();
    assert!(second.success());
    assert!(second.all_skipped());
    assert_eq!(world.total_applies(), steps.len());
}

#[test]
fn rerun_after_partial_failure_repairs_only_what_is_missing() {
    let world = World::default();
    world.break_step("docker");
    let steps = toolchain(&world);
    let sequencer = Sequencer::new(false);

    assert!(!sequencer.run(&steps).unwrap().success());

    world.broken.borrow_mut().clear();
    let second = sequencer.run(&steps).unwrap();
    assert!(second.success());
    assert_eq!(second.count(StepStatus::Applied), 3);
    assert_eq!(second.status_of("editor"), Some(StepStatus::Skipped));
}

#[test]
fn cycle_fails_before_anything_runs() {
    let world = World::default();
    let steps = vec![
        world.step("a").depends_on(["b"]),
        world.step("b").depends_on(["a"]),
        world.step("c"),
    ];

    let err = Sequencer::new(false).run(&steps).unwrap_err();

    assert!(matches!(err, ConfigurationError::DependencyCycle(_)));
    assert_eq!(world.total_probes(), 0);
    assert_eq!(world.total_applies(), 0);
}

#[test]
fn duplicate_names_fail_before_anything_runs() {
    let world = World::default();
    let steps = vec![world.step("docker"), world.step("docker")];

    let err = Sequencer::new(false).run(&steps).unwrap_err();

    assert_eq!(err, ConfigurationError::DuplicateStep("docker".to_string()));
    assert_eq!(world.total_probes(), 0);
}

#[test]
fn docker_failure_leaves_editor_branch_intact() {
    let world = World::default();
    world.break_step("Install Docker");
    let steps = vec![
        world.step("Install Docker").fatal(true),
        world.step("Install Editor"),
        world
            .step("Install Editor Extension")
            .depends_on(["Install Editor"]),
    ];

    let report = Sequencer::new(false).run(&steps).unwrap();

    assert_eq!(report.status_of("Install Docker"), Some(StepStatus::Failed));
    assert_eq!(report.status_of("Install Editor"), Some(StepStatus::Applied));
    assert_eq!(
        report.status_of("Install Editor Extension"),
        Some(StepStatus::Applied)
    );
    assert!(!report.success());
}

#[test]
fn single_satisfied_fatal_step_is_skipped() {
    let world = World::default();
    world.install("A");
    let steps = vec![world.step("A").fatal(true)];

    let report = Sequencer::new(false).run(&steps).unwrap();

    let statuses: Vec<_> = report
        .results()
        .iter()
        .map(|r| (r.name(), r.status()))
        .collect();
    assert_eq!(statuses, vec![("A", StepStatus::Skipped)]);
    assert!(report.success());
}

#[test]
fn results_follow_dependency_order() {
    let world = World::default();
    let steps = vec![
        world.step("editor-extension").depends_on(["editor"]),
        world.step("docker"),
        world.step("editor"),
    ];

    let report = Sequencer::new(false).run(&steps).unwrap();

    let order: Vec<_> = report.results().iter().map(|r| r.name()).collect();
    assert_eq!(order, vec!["docker", "editor", "editor-extension"]);
}
