//! Bounded fixed-point resolution of mutually dependent equations.

use indexmap::IndexMap;
use tracing::trace;

use crate::error::EvalError;
use crate::ir::Equation;

/// Outcome of a fixed-point resolution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    /// Passes performed.
    pub iterations: usize,
    /// Equations that never resolved, keyed by variable, with their last failure.
    pub unresolved: IndexMap<String, EvalError>,
}

impl Resolution {
    /// Returns `true` if every equation resolved.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Resolves `pending` by repeated passes.
///
/// Each pass calls `step` on every equation not yet resolved, in declaration
/// order. `Ok` marks the equation resolved; any error defers it to the next
/// pass. Resolution stops when everything resolved, when a pass resolves
/// nothing new, or after `max_iterations` passes.
pub fn solve<'e, F>(pending: Vec<&'e Equation>, max_iterations: usize, mut step: F) -> Resolution
where
    F: FnMut(&'e Equation) -> Result<(), EvalError>,
{
    let mut pending = pending;
    let mut iterations = 0;
    let mut last_errors: IndexMap<String, EvalError> = IndexMap::new();

    while !pending.is_empty() && iterations < max_iterations {
        iterations += 1;
        let before = pending.len();
        let mut deferred = Vec::with_capacity(before);
        last_errors.clear();

        for eq in pending {
            match step(eq) {
                Ok(()) => {}
                Err(err) => {
                    trace!(variable = %eq.variable, pass = iterations, error = %err, "deferred");
                    last_errors.insert(eq.variable.clone(), err);
                    deferred.push(eq);
                }
            }
        }

        pending = deferred;
        if pending.len() == before {
            break;
        }
    }

    Resolution {
        iterations,
        unresolved: last_errors,
    }
}
