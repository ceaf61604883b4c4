use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use econsim::sampling::run_rng;
use econsim::{
    Action, Constraint, Distribution, Engine, EngineConfig, Expr, Model, ModelBuilder,
    MonteCarloConfig, MonteCarloRunner,
};

fn saas_model(horizon: usize) -> Model {
    ModelBuilder::new("saas", horizon)
        .stochastic("growth", Distribution::Normal { mean: 0.04, std_dev: 0.015 })
        .stochastic("churn", Distribution::Uniform { min: 0.01, max: 0.05 })
        .correlated_with("growth", -0.4)
        .stochastic("arpu", Distribution::LogNormal { mu: 3.9, sigma: 0.1 })
        .parameter("cost_per_head", 9000.0)
        .initial("customers", Expr::num(500.0))
        .recurrence(
            "customers",
            Expr::var("customers") * (Expr::num(1.0) + Expr::ident("growth") - Expr::ident("churn")),
        )
        .initial("headcount", Expr::num(10.0))
        .current("revenue", Expr::ident("customers") * Expr::ident("arpu"))
        .current("costs", Expr::ident("headcount") * Expr::ident("cost_per_head"))
        .current("profit", Expr::ident("revenue") - Expr::ident("costs"))
        .initial("cash", Expr::num(1_000_000.0))
        .recurrence("cash", Expr::var("cash") + Expr::var("profit"))
        .constraint(Constraint::fatal("solvent", Expr::ident("cash").ge(Expr::num(0.0))))
        .constraint(Constraint::warning("profitable", Expr::ident("profit").gt(Expr::num(0.0))))
        .policy(
            "hire",
            Expr::ident("profit").gt(Expr::num(20_000.0)),
            Action::assign("headcount", Expr::var("headcount") + Expr::num(1.0)),
        )
        .build()
        .expect("benchmark model is valid")
}

fn bench_deterministic(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/deterministic");
    for horizon in [12usize, 60, 240] {
        let engine = Engine::new(saas_model(horizon), EngineConfig::default()).unwrap();
        group.throughput(Throughput::Elements(horizon as u64));
        group.bench_with_input(BenchmarkId::from_parameter(horizon), &horizon, |b, _| {
            b.iter(|| engine.run_deterministic(1).unwrap());
        });
    }
    group.finish();
}

fn bench_sampling(c: &mut Criterion) {
    let engine = Engine::new(saas_model(12), EngineConfig::default()).unwrap();
    let sampler = engine.sampler().unwrap();
    let mut rng = run_rng(7, 0);
    c.bench_function("sampling/correlated_draw", |b| {
        b.iter(|| sampler.sample(&mut rng));
    });
}

fn bench_monte_carlo(c: &mut Criterion) {
    let engine = Arc::new(Engine::new(saas_model(60), EngineConfig::default()).unwrap());
    let mut group = c.benchmark_group("engine/monte_carlo");
    group.sample_size(10);
    for workers in [1usize, 4] {
        let runner = MonteCarloRunner::new(
            Arc::clone(&engine),
            MonteCarloConfig::default().with_workers(workers),
        );
        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(BenchmarkId::new("runs_1000", workers), &workers, |b, _| {
            b.iter(|| runner.run(1_000, 42).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_deterministic, bench_sampling, bench_monte_carlo);
criterion_main!(benches);
