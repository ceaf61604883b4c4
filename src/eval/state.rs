//! Per-run mutable simulation state.

use indexmap::IndexMap;

use crate::error::EvalError;
use crate::value::Value;

/// Append-only timeseries for every variable of one run.
///
/// Timestep `t` is first *opened* (one slot appended per variable), then
/// filled by equations and policy assignments, then *committed*. Only the open
/// slot is writable; committed timesteps are never overwritten. Once `t` is
/// committed every series has length exactly `t + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    series: IndexMap<String, Vec<Value>>,
    committed: usize,
    open: bool,
}

impl SimulationState {
    /// Creates an empty state for the given variables.
    pub fn new<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            series: variables.into_iter().map(|v| (v.into(), Vec::new())).collect(),
            committed: 0,
            open: false,
        }
    }

    /// Number of committed timesteps.
    #[must_use]
    pub const fn committed(&self) -> usize {
        self.committed
    }

    /// The open timestep, if any.
    #[must_use]
    pub const fn open_timestep(&self) -> Option<usize> {
        if self.open {
            Some(self.committed)
        } else {
            None
        }
    }

    /// Returns `true` if `name` is a variable of this state.
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Variable names in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Opens the next timestep, seeding each slot via `seed`.
    ///
    /// Returns the opened timestep index.
    pub fn open(&mut self, mut seed: impl FnMut(&str, Option<&Value>) -> Value) -> usize {
        debug_assert!(!self.open, "timestep {} already open", self.committed);
        for (name, values) in &mut self.series {
            let value = seed(name, values.last());
            values.push(value);
        }
        self.open = true;
        self.committed
    }

    /// Overwrites the open timestep's value of `name`.
    pub fn set_current(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        let Some(values) = self.series.get_mut(name) else {
            return Err(EvalError::UnknownIdentifier {
                name: name.to_string(),
            });
        };
        if !self.open {
            return Err(EvalError::MissingDependency {
                name: name.to_string(),
                timestep: self.committed,
            });
        }
        if let Some(slot) = values.last_mut() {
            *slot = value;
        }
        Ok(())
    }

    /// Value of `name` at the open timestep.
    #[must_use]
    pub fn current(&self, name: &str) -> Option<&Value> {
        if !self.open {
            return None;
        }
        self.series.get(name)?.last()
    }

    /// Value of `name` at timestep `t` (committed or open).
    #[must_use]
    pub fn value_at(&self, name: &str, t: usize) -> Option<&Value> {
        self.series.get(name)?.get(t)
    }

    /// Commits the open timestep.
    pub fn commit(&mut self) {
        debug_assert!(self.open, "no open timestep to commit");
        self.committed += 1;
        self.open = false;
        debug_assert!(self.series.values().all(|v| v.len() == self.committed));
    }

    /// Consumes the state, returning the committed series.
    ///
    /// An open, uncommitted slot is discarded.
    #[must_use]
    pub fn into_series(mut self) -> IndexMap<String, Vec<Value>> {
        if self.open {
            for values in self.series.values_mut() {
                values.truncate(self.committed);
            }
        }
        self.series
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_set_commit_cycle() {
        let mut state = SimulationState::new(["revenue", "cost"]);
        assert_eq!(state.open_timestep(), None);

        let t = state.open(|_, _| Value::Undefined);
        assert_eq!(t, 0);
        state.set_current("revenue", Value::Number(10.0)).unwrap();
        assert_eq!(state.current("revenue"), Some(&Value::Number(10.0)));
        assert_eq!(state.current("cost"), Some(&Value::Undefined));
        state.commit();
        assert_eq!(state.committed(), 1);
        assert_eq!(state.current("revenue"), None);

        // Carry forward previous values.
        state.open(|_, prev| prev.cloned().unwrap_or_default());
        assert_eq!(state.current("revenue"), Some(&Value::Number(10.0)));
        state.set_current("revenue", Value::Number(12.0)).unwrap();
        state.commit();

        assert_eq!(state.value_at("revenue", 0), Some(&Value::Number(10.0)));
        assert_eq!(state.value_at("revenue", 1), Some(&Value::Number(12.0)));
        assert_eq!(state.value_at("revenue", 2), None);
    }

    #[test]
    fn writes_require_open_timestep() {
        let mut state = SimulationState::new(["x"]);
        assert!(state.set_current("x", Value::Number(1.0)).is_err());
        state.open(|_, _| Value::Undefined);
        assert!(matches!(
            state.set_current("y", Value::Number(1.0)),
            Err(EvalError::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn into_series_discards_open_slot() {
        let mut state = SimulationState::new(["x"]);
        state.open(|_, _| Value::Number(1.0));
        state.commit();
        state.open(|_, _| Value::Number(2.0));
        let series = state.into_series();
        assert_eq!(series["x"], vec![Value::Number(1.0)]);
    }
}
