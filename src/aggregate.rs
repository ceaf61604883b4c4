//! Monte Carlo reduction.
//!
//! An `AggregateResult` keeps every completed `RunResult` plus, per variable
//! and timestep, the column of per-run values. Columns are built from runs
//! sorted by index, so the artifact does not depend on worker scheduling.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ir::Model;
use crate::result::{write_artifact, RunResult};
use crate::sampling::stats;
use crate::value::Value;

/// Descriptive statistics of one variable at one timestep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Runs with a numeric value.
    pub count: usize,
    /// Mean.
    pub mean: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Minimum.
    pub min: f64,
    /// Maximum.
    pub max: f64,
    /// 5th percentile.
    pub p05: f64,
    /// Median.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
}

/// Reduction of a Monte Carlo batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Model name.
    pub model_name: String,
    /// Model content hash.
    pub model_fingerprint: String,
    /// Seed every run's stream was derived from.
    pub base_seed: u64,
    /// Runs requested.
    pub requested_runs: usize,
    /// Completed runs, ordered by run index.
    pub runs: Vec<RunResult>,
    /// Indices of cancelled runs; their partial results are discarded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cancelled_runs: Vec<usize>,
    /// Per variable, per timestep, one entry per run in `runs`.
    ///
    /// An entry is `None` when the run halted before that timestep or the
    /// value was neither a number nor a boolean. Booleans count as 0 or 1.
    pub series: IndexMap<String, Vec<Vec<Option<f64>>>>,
}

impl AggregateResult {
    /// Reduces `runs` into columns.
    #[must_use]
    pub fn from_runs(
        model: &Model,
        fingerprint: &str,
        base_seed: u64,
        requested_runs: usize,
        mut runs: Vec<RunResult>,
        cancelled_runs: Vec<usize>,
    ) -> Self {
        runs.sort_by_key(|r| r.metadata.run_index);

        let series = model
            .variables()
            .into_iter()
            .map(|name| {
                let columns = (0..model.horizon)
                    .map(|t| runs
                            .iter()
                            .map(|run| run.value(name, t).and_then(Value::numeric))
                            .collect())
                    .collect();
                (name.to_string(), columns)
            })
            .collect();

        Self {
            model_name: model.name.clone(),
            model_fingerprint: fingerprint.to_string(),
            base_seed,
            requested_runs,
            runs,
            cancelled_runs,
            series,
        }
    }

    /// The per-run column of `variable` at `timestep`.
    #[must_use]
    pub fn column(&self, variable: &str, timestep: usize) -> Option<&[Option<f64>]> {
        self.series.get(variable)?.get(timestep).map(Vec::as_slice)
    }

    /// Numeric values of `variable` at `timestep`, in run order.
    #[must_use]
    pub fn values(&self, variable: &str, timestep: usize) -> Vec<f64> {
        self.column(variable, timestep)
            .map(|col| col.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Percentile `p` in `[0, 100]` of `variable` at `timestep`.
    #[must_use]
    pub fn percentile(&self, variable: &str, timestep: usize, p: f64) -> Option<f64> {
        let mut values = self.values(variable, timestep);
        values.sort_by(f64::total_cmp);
        stats::percentile_sorted(&values, p)
    }

    /// Summary statistics of `variable` at `timestep`; `None` if no run has a
    /// numeric value there.
    #[must_use]
    pub fn summary(&self, variable: &str, timestep: usize) -> Option<Summary> {
        let mut values = self.values(variable, timestep);
        values.sort_by(f64::total_cmp);
        let (&min, &max) = (values.first()?, values.last()?);
        Some(Summary {
            count: values.len(),
            mean: stats::mean(&values)?,
            std_dev: stats::std_dev(&values)?,
            min,
            max,
            p05: stats::percentile_sorted(&values, 5.0)?,
            p50: stats::percentile_sorted(&values, 50.0)?,
            p95: stats::percentile_sorted(&values, 95.0)?,
        })
    }

    /// Runs that halted on a fatal constraint.
    pub fn halted_runs(&self) -> impl Iterator<Item = &RunResult> {
        self.runs.iter().filter(|r| !r.is_completed())
    }

    /// Runs that reached the horizon.
    pub fn completed_runs(&self) -> impl Iterator<Item = &RunResult> {
        self.runs.iter().filter(|r| r.is_completed())
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::internal(format!("serialize aggregate result: {e}")))
    }

    /// Write the artifact as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        write_artifact(path.as_ref(), &self.to_json_pretty()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::ir::{Action, Constraint, Expr, ModelBuilder};

    fn model() -> Model {
        ModelBuilder::new("sales", 3)
            .parameter("units", 0.0)
            .initial("stock", Expr::ident("units"))
            .recurrence("stock", Expr::var("stock") - Expr::num(10.0))
            .constraint(Constraint::fatal("positive", Expr::ident("stock").ge(Expr::num(0.0))))
            .build()
            .unwrap()
    }

    fn runs() -> Vec<RunResult> {
        let engine = Engine::new(model(), EngineConfig::default()).unwrap();
        // units = 5 halts at t=1; the others complete.
        [30.0, 5.0, 40.0, 50.0]
            .into_iter()
            .enumerate()
            .map(|(idx, units)| {
                let mut params = IndexMap::new();
                params.insert("units".to_string(), Value::Number(units));
                let mut run = engine.run_with_parameters(&params, 1).unwrap();
                run.metadata.run_index = Some(idx);
                run
            })
            .rev()
            .collect()
    }

    #[test]
    fn columns_follow_run_index_order() {
        let agg = AggregateResult::from_runs(&model(), "fp", 1, 4, runs(), Vec::new());
        let indices: Vec<_> = agg.runs.iter().map(|r| r.metadata.run_index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2), Some(3)]);
        assert_eq!(
            agg.column("stock", 0),
            Some(&[Some(30.0), Some(5.0), Some(40.0), Some(50.0)][..])
        );
        // The halted run has no entry after its halting timestep.
        assert_eq!(agg.column("stock", 2), Some(&[Some(10.0), None, Some(20.0), Some(30.0)][..]));
        assert_eq!(agg.values("stock", 2), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn summary_statistics() {
        let agg = AggregateResult::from_runs(&model(), "fp", 1, 4, runs(), Vec::new());
        let s = agg.summary("stock", 2).unwrap();
        assert_eq!(s.count, 3);
        assert_eq!(s.mean, 20.0);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 30.0);
        assert_eq!(s.p50, 20.0);
        assert!((s.std_dev - 10.0).abs() < 1e-12);
        assert!((s.p05 - 11.0).abs() < 1e-12);
        assert!((s.p95 - 29.0).abs() < 1e-12);
        assert_eq!(agg.percentile("stock", 0, 100.0), Some(50.0));
        assert!(agg.summary("missing", 0).is_none());
    }

    #[test]
    fn boolean_series_count_as_zero_or_one() {
        let model = ModelBuilder::new("flags", 3)
            .initial("cash", Expr::num(100.0))
            .recurrence("cash", Expr::var("cash") - Expr::num(40.0))
            .initial("pause_hiring", Expr::boolean(false))
            .policy(
                "pause",
                Expr::ident("cash").lt(Expr::num(50.0)),
                Action::assign("pause_hiring", Expr::boolean(true)),
            )
            .build()
            .unwrap();
        let run = Engine::new(model.clone(), EngineConfig::default())
            .unwrap()
            .run_deterministic(0)
            .unwrap();
        assert_eq!(run.value("pause_hiring", 2), Some(&Value::Bool(true)));

        let agg = AggregateResult::from_runs(&model, "fp", 0, 1, vec![run], Vec::new());
        assert_eq!(agg.column("pause_hiring", 0), Some(&[Some(0.0)][..]));
        assert_eq!(agg.column("pause_hiring", 2), Some(&[Some(1.0)][..]));
        assert_eq!(agg.values("pause_hiring", 1), vec![0.0]);
    }

    #[test]
    fn halted_and_completed_partition() {
        let agg = AggregateResult::from_runs(&model(), "fp", 1, 4, runs(), Vec::new());
        assert_eq!(agg.halted_runs().count(), 1);
        assert_eq!(agg.completed_runs().count(), 3);
    }

    #[test]
    fn json_artifact_is_written() {
        let agg = AggregateResult::from_runs(&model(), "fp", 1, 6, runs(), vec![4, 5]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aggregate.json");
        agg.write_json(&path).unwrap();
        let decoded: AggregateResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(decoded, agg);
        assert_eq!(decoded.cancelled_runs, vec![4, 5]);
    }
}
