use std::sync::Arc;

use econsim::{
    CancellationToken, Constraint, Distribution, Engine, EngineConfig, ExecutionRequest, Expr,
    Model, ModelBuilder, MonteCarloConfig, MonteCarloRunner,
};

fn revenue_model() -> Model {
    ModelBuilder::new("uncertain_growth", 12)
        .stochastic("growth", Distribution::Normal { mean: 0.05, std_dev: 0.02 })
        .stochastic("churn", Distribution::Uniform { min: 0.0, max: 0.04 })
        .correlation("growth", "churn", -0.5)
        .initial("customers", Expr::num(1000.0))
        .recurrence(
            "customers",
            Expr::var("customers") * (Expr::num(1.0) + Expr::ident("growth") - Expr::ident("churn")),
        )
        .current("revenue", Expr::ident("customers") * Expr::num(20.0))
        .build()
        .unwrap()
}

fn engine(model: Model) -> Arc<Engine> {
    Arc::new(Engine::new(model, EngineConfig::default()).unwrap())
}

#[test]
fn batch_reduces_every_run() {
    let output = engine(revenue_model())
        .execute(&ExecutionRequest::monte_carlo(200, 42))
        .unwrap();
    let aggregate = output.as_batch().unwrap();

    assert_eq!(aggregate.requested_runs, 200);
    assert_eq!(aggregate.runs.len(), 200);
    assert_eq!(aggregate.base_seed, 42);
    assert_eq!(aggregate.model_name, "uncertain_growth");

    // Every run starts from the same initial value.
    let s0 = aggregate.summary("customers", 0).unwrap();
    assert_eq!(s0.count, 200);
    assert_eq!(s0.min, 1000.0);
    assert_eq!(s0.max, 1000.0);

    // Runs diverge afterwards, and the spread widens with time.
    let s1 = aggregate.summary("revenue", 1).unwrap();
    let s11 = aggregate.summary("revenue", 11).unwrap();
    assert!(s1.std_dev > 0.0);
    assert!(s11.std_dev > s1.std_dev);
    assert!(s11.p05 < s11.p50 && s11.p50 < s11.p95);
    assert!(s11.min <= s11.p05 && s11.p95 <= s11.max);
}

#[test]
fn sampled_parameters_are_recorded_per_run() {
    let aggregate = MonteCarloRunner::new(engine(revenue_model()), MonteCarloConfig::default())
        .run(50, 9)
        .unwrap();
    let churn: Vec<f64> = aggregate
        .runs
        .iter()
        .map(|r| r.parameters["churn"].as_number().unwrap())
        .collect();
    assert!(churn.iter().all(|c| (0.0..=0.04).contains(c)));
    assert!(churn.windows(2).any(|w| w[0] != w[1]));
}

#[test]
fn halted_runs_stay_in_the_batch() {
    let model = ModelBuilder::new("runway", 10)
        .stochastic("burn", Distribution::Uniform { min: 5.0, max: 20.0 })
        .initial("cash", Expr::num(100.0))
        .recurrence("cash", Expr::var("cash") - Expr::ident("burn"))
        .constraint(Constraint::fatal("solvent", Expr::ident("cash").ge(Expr::num(0.0))))
        .build()
        .unwrap();
    let aggregate = MonteCarloRunner::new(engine(model), MonteCarloConfig::default())
        .run(100, 3)
        .unwrap();

    assert_eq!(aggregate.runs.len(), 100);
    let halted = aggregate.halted_runs().count();
    assert!(halted > 0, "some runs burn through their cash");
    assert!(halted < 100, "some runs survive the horizon");

    // Halted runs contribute nothing after their halting timestep.
    let early = aggregate
        .halted_runs()
        .filter(|r| r.halted_at() < Some(9))
        .count();
    let last = aggregate.column("cash", 9).unwrap();
    assert_eq!(last.iter().filter(|v| v.is_none()).count(), early);
    for run in aggregate.halted_runs() {
        let k = run.halted_at().unwrap();
        assert_eq!(run.timesteps(), k + 1);
    }
}

#[test]
fn invalid_correlation_aborts_the_batch() {
    let model = ModelBuilder::new("bad_corr", 3)
        .stochastic("a", Distribution::Normal { mean: 0.0, std_dev: 1.0 })
        .stochastic("b", Distribution::Normal { mean: 0.0, std_dev: 1.0 })
        .stochastic("c", Distribution::Normal { mean: 0.0, std_dev: 1.0 })
        .correlation("a", "b", 0.9)
        .correlation("b", "c", 0.9)
        .correlation("a", "c", -0.9)
        .current("y", Expr::ident("a") + Expr::ident("b") + Expr::ident("c"))
        .build()
        .unwrap();
    let engine = engine(model);

    let err = engine
        .execute(&ExecutionRequest::monte_carlo(10, 1))
        .unwrap_err();
    assert!(err.is_correlation());

    // Deterministic mode does not sample and is unaffected.
    assert!(engine.execute(&ExecutionRequest::deterministic(1)).is_ok());
}

#[test]
fn cancellation_discards_partial_runs() {
    let model = ModelBuilder::new("long", 2_000)
        .stochastic("g", Distribution::Normal { mean: 0.0, std_dev: 1.0 })
        .initial("x", Expr::num(0.0))
        .recurrence("x", Expr::var("x") + Expr::ident("g"))
        .build()
        .unwrap();
    let runner = MonteCarloRunner::new(engine(model), MonteCarloConfig::default().with_workers(2));
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            token.cancel();
        })
    };
    let aggregate = runner.run_with_cancel(5_000, 8, &token).unwrap();
    canceller.join().unwrap();

    assert_eq!(aggregate.runs.len() + aggregate.cancelled_runs.len(), 5_000);
    assert!(!aggregate.cancelled_runs.is_empty());
    assert!(aggregate.runs.iter().all(|r| r.timesteps() == 2_000));
    assert!(aggregate.cancelled_runs.windows(2).all(|w| w[0] < w[1]));
    for column in &aggregate.series["x"] {
        assert_eq!(column.len(), aggregate.runs.len());
    }
}

#[test]
fn timeout_is_treated_as_cancellation() {
    let model = ModelBuilder::new("slow", 200_000)
        .initial("x", Expr::num(0.0))
        .recurrence("x", Expr::var("x") + Expr::num(1.0))
        .build()
        .unwrap();
    let config = EngineConfig {
        max_run_duration_ms: Some(1),
        ..EngineConfig::default()
    };
    let engine = Arc::new(Engine::new(model, config).unwrap());

    let aggregate = MonteCarloRunner::new(engine.clone(), MonteCarloConfig::sequential())
        .run(2, 0)
        .unwrap();
    assert!(aggregate.runs.is_empty());
    assert_eq!(aggregate.cancelled_runs, vec![0, 1]);

    let err = engine.run_deterministic(0).unwrap_err();
    assert!(err.is_cancellation());
}
