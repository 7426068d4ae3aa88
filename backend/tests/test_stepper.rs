//! Day stepping: same-day inputs, merge rules and atomic failure

use future_wallet_core_rs::models::delta::{PostingReason, WriteScope};
use future_wallet_core_rs::{
    build_components, branch_from, BranchOverrides, CashFlowItem, Component, ComponentError,
    ComponentId, DayContext, InitialState, RandomSource, Run, RunSetup, SimulationConfig,
    SimulationError, StateDelta,
};
use std::sync::Arc;

fn config() -> SimulationConfig {
    SimulationConfig {
        horizon_days: 90,
        income: vec![CashFlowItem::monthly("salary", "USD", 300_000)],
        ..SimulationConfig::default()
    }
}

/// Posts a fixed amount every day
#[derive(Debug)]
struct Payer;

impl Component for Payer {
    fn id(&self) -> &str {
        "payer"
    }
    fn dependencies(&self) -> Vec<ComponentId> {
        Vec::new()
    }
    fn writes(&self) -> Vec<WriteScope> {
        Vec::new()
    }
    fn transform(&self, _ctx: &DayContext<'_>, _rng: &mut RandomSource) -> Result<StateDelta, ComponentError> {
        let mut delta = StateDelta::new();
        delta.post("USD", 100, PostingReason::Override);
        Ok(delta)
    }
}

/// Fails unless it sees the payer's posting of the same day
#[derive(Debug)]
struct Auditor;

impl Component for Auditor {
    fn id(&self) -> &str {
        "auditor"
    }
    fn dependencies(&self) -> Vec<ComponentId> {
        vec!["payer".to_string()]
    }
    fn writes(&self) -> Vec<WriteScope> {
        Vec::new()
    }
    fn transform(&self, ctx: &DayContext<'_>, _rng: &mut RandomSource) -> Result<StateDelta, ComponentError> {
        if ctx.posted_today("USD") != 100 {
            return Err(ctx.error(self.id(), "payer output missing"));
        }
        let mut delta = StateDelta::new();
        delta.post("USD", 1, PostingReason::Override);
        Ok(delta)
    }
}

/// Overwrites the credit score without declaring it
#[derive(Debug)]
struct Scorer(&'static str);

impl Component for Scorer {
    fn id(&self) -> &str {
        self.0
    }
    fn dependencies(&self) -> Vec<ComponentId> {
        Vec::new()
    }
    fn writes(&self) -> Vec<WriteScope> {
        Vec::new()
    }
    fn transform(&self, _ctx: &DayContext<'_>, _rng: &mut RandomSource) -> Result<StateDelta, ComponentError> {
        let mut delta = StateDelta::new();
        delta.credit_score = Some(700.0);
        Ok(delta)
    }
}

/// Fails on one day
#[derive(Debug)]
struct Fragile(u32);

impl Component for Fragile {
    fn id(&self) -> &str {
        "fragile"
    }
    fn dependencies(&self) -> Vec<ComponentId> {
        Vec::new()
    }
    fn writes(&self) -> Vec<WriteScope> {
        Vec::new()
    }
    fn transform(&self, ctx: &DayContext<'_>, _rng: &mut RandomSource) -> Result<StateDelta, ComponentError> {
        if ctx.day() == self.0 {
            return Err(ctx.error(self.id(), "malformed input"));
        }
        Ok(StateDelta::new())
    }
}

fn with_extra(extra: Vec<Arc<dyn Component>>) -> RunSetup {
    let config = config();
    let mut components = build_components(&config);
    components.extend(extra);
    RunSetup::with_components(config, &components).unwrap()
}

#[test]
fn test_dependents_see_same_day_output() {
    let setup = with_extra(vec![Arc::new(Payer), Arc::new(Auditor)]);
    let mut run = Run::start_with(setup, &InitialState::new(), 1).unwrap();
    let day5 = run.step_to(5).unwrap();
    assert_eq!(day5.balance("USD"), 5 * 101);
}

#[test]
fn test_stepper_yields_one_delta_per_component() {
    let setup = RunSetup::new(config()).unwrap().reseeded(3);
    assert_eq!(setup.config().seed, 3);
    let stepper = setup.stepper().unwrap();
    let day0 = setup.store().initialize(&InitialState::new(), 3).unwrap();

    let deltas = stepper.collect_deltas(&day0).unwrap();
    assert_eq!(deltas.len(), setup.plan().len());

    let day1 = stepper.step(&day0).unwrap();
    assert_eq!(day1.day(), 1);
    assert_eq!(day1.cursor().day, 1);
}

#[test]
fn test_undeclared_shared_write_is_unresolved_conflict() {
    let setup = with_extra(vec![Arc::new(Scorer("scorer_a")), Arc::new(Scorer("scorer_b"))]);
    let mut run = Run::start_with(setup, &InitialState::new(), 1).unwrap();

    let err = run.step_to(1).unwrap_err();
    match err {
        SimulationError::UnresolvedConflict { field, .. } => assert_eq!(field, "credit_score"),
        other => panic!("expected a conflict, got {:?}", other),
    }
    assert_eq!(run.latest_day(), 0);
}

#[test]
fn test_declared_shared_write_is_rejected_before_stepping() {
    #[derive(Debug)]
    struct Rival;
    impl Component for Rival {
        fn id(&self) -> &str {
            "rival"
        }
        fn dependencies(&self) -> Vec<ComponentId> {
            Vec::new()
        }
        fn writes(&self) -> Vec<WriteScope> {
            vec![WriteScope::CreditScore]
        }
        fn transform(&self, _ctx: &DayContext<'_>, _rng: &mut RandomSource) -> Result<StateDelta, ComponentError> {
            Ok(StateDelta::new())
        }
    }

    let config = config();
    let mut components = build_components(&config);
    components.push(Arc::new(Rival));
    let err = RunSetup::with_components(config, &components).unwrap_err();
    assert!(matches!(err, SimulationError::UnresolvedConflict { .. }));
}

#[test]
fn test_component_failure_aborts_only_from_that_day() {
    let setup = with_extra(vec![Arc::new(Fragile(5))]);
    let mut run = Run::start_with(setup, &InitialState::new(), 1).unwrap();

    let err = run.step_to(10).unwrap_err();
    assert_eq!(
        err,
        SimulationError::Component(ComponentError {
            component: "fragile".to_string(),
            day: 5,
            reason: "malformed input".to_string(),
        })
    );
    assert_eq!(run.latest_day(), 4);
    assert_eq!(run.failure(), Some(&err));
    assert_eq!(run.step_to(6).unwrap_err(), err);

    // Recorded days stay usable
    assert_eq!(run.step_to(3).unwrap().day(), 3);
    let snapshot = run.snapshot_at(4).unwrap();
    let mut branch = branch_from(&snapshot, BranchOverrides::new()).unwrap();
    assert_eq!(branch.run_to_horizon().unwrap().day(), 90);
}

#[test]
fn test_failed_run_does_not_affect_sibling() {
    let mut fragile = Run::start_with(with_extra(vec![Arc::new(Fragile(2))]), &InitialState::new(), 8).unwrap();
    let mut sturdy = Run::start(&InitialState::new(), config(), 8).unwrap();

    assert!(fragile.step_to(30).is_err());
    assert_eq!(sturdy.step_to(30).unwrap().balance("USD"), 300_000);
}
