//! Correlation matrices and their Cholesky factors.

use indexmap::IndexMap;

use crate::error::CorrelationMatrixError;
use crate::ir::{Model, ParameterValue};

/// Absolute tolerance for symmetry and unit-diagonal checks.
const EXACT_TOLERANCE: f64 = 1e-12;

/// A pivot below `-PSD_TOLERANCE` proves the matrix indefinite.
const PSD_TOLERANCE: f64 = 1e-10;

/// Pivots at or below this are treated as zero (rank-deficient but PSD).
const ZERO_PIVOT: f64 = 1e-12;

/// Residual allowed below a zero pivot before the matrix is rejected.
const ZERO_PIVOT_RESIDUAL: f64 = 1e-8;

/// A dense, row-major square matrix of pairwise correlations.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl CorrelationMatrix {
    /// The `n × n` identity (independent parameters).
    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self { dim: n, data }
    }

    /// Builds a matrix from rows, rejecting ragged input.
    ///
    /// No other invariant is checked; call [`CorrelationMatrix::validate`].
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, CorrelationMatrixError> {
        let dim = rows.len();
        let mut data = Vec::with_capacity(dim * dim);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != dim {
                return Err(CorrelationMatrixError::NotSquare {
                    row,
                    len: values.len(),
                    expected: dim,
                });
            }
            data.extend(values);
        }
        Ok(Self { dim, data })
    }

    /// Assembles the matrix over `names` from pairwise specs.
    ///
    /// Unlisted pairs are independent. The same pair listed twice with
    /// different coefficients is a conflict.
    pub fn from_pairs<'a, I>(names: &[String], pairs: I) -> Result<Self, CorrelationMatrixError>
    where
        I: IntoIterator<Item = (&'a str, &'a str, f64)>,
    {
        let index: IndexMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        let position = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| CorrelationMatrixError::UnknownParameter {
                    name: name.to_string(),
                })
        };

        let mut matrix = Self::identity(names.len());
        let mut assigned: IndexMap<(usize, usize), f64> = IndexMap::new();

        for (a, b, coefficient) in pairs {
            let i = position(a)?;
            let j = position(b)?;
            if i == j {
                if (coefficient - 1.0).abs() > EXACT_TOLERANCE {
                    return Err(CorrelationMatrixError::NonUnitDiagonal {
                        index: i,
                        value: coefficient,
                    });
                }
                continue;
            }
            let key = (i.min(j), i.max(j));
            if let Some(&first) = assigned.get(&key) {
                if (first - coefficient).abs() > EXACT_TOLERANCE {
                    return Err(CorrelationMatrixError::ConflictingCoefficient {
                        a: names[key.0].clone(),
                        b: names[key.1].clone(),
                        first,
                        second: coefficient,
                    });
                }
                continue;
            }
            assigned.insert(key, coefficient);
            matrix.set(i, j, coefficient);
            matrix.set(j, i, coefficient);
        }

        Ok(matrix)
    }

    /// Assembles the matrix over the model's stochastic parameters, in
    /// declaration order, from both model-level and inline correlations.
    pub fn from_model(model: &Model) -> Result<(Vec<String>, Self), CorrelationMatrixError> {
        let names: Vec<String> = model
            .parameters
            .iter()
            .filter(|p| p.is_stochastic())
            .map(|p| p.name.clone())
            .collect();

        let check = |name: &str| -> Result<(), CorrelationMatrixError> {
            match model.parameter(name) {
                None => Err(CorrelationMatrixError::UnknownParameter {
                    name: name.to_string(),
                }),
                Some(p) if !p.is_stochastic() => Err(CorrelationMatrixError::NotStochastic {
                    name: name.to_string(),
                }),
                Some(_) => Ok(()),
            }
        };

        let mut pairs: Vec<(&str, &str, f64)> = Vec::new();
        for spec in &model.correlations {
            check(&spec.a)?;
            check(&spec.b)?;
            pairs.push((spec.a.as_str(), spec.b.as_str(), spec.coefficient));
        }
        for param in &model.parameters {
            if let ParameterValue::Distribution {
                correlated_with, ..
            } = &param.value
            {
                for partner in correlated_with {
                    check(&partner.parameter)?;
                    pairs.push((
                        param.name.as_str(),
                        partner.parameter.as_str(),
                        partner.coefficient,
                    ));
                }
            }
        }

        let matrix = Self::from_pairs(&names, pairs)?;
        Ok((names, matrix))
    }

    /// Dimension.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Entry `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.dim + col]
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.dim + col] = value;
    }

    /// Returns `true` if no off-diagonal entry is non-zero.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        (0..self.dim).all(|i| (0..self.dim).all(|j| i == j || self.get(i, j) == 0.0))
    }

    /// Checks range, symmetry, unit diagonal and positive semi-definiteness,
    /// in that order, returning the first failure.
    pub fn validate(&self) -> Result<(), CorrelationMatrixError> {
        self.cholesky().map(|_| ())
    }

    fn check_entries(&self) -> Result<(), CorrelationMatrixError> {
        for row in 0..self.dim {
            for col in 0..self.dim {
                let value = self.get(row, col);
                if !(-1.0..=1.0).contains(&value) {
                    return Err(CorrelationMatrixError::CoefficientOutOfRange { row, col, value });
                }
            }
        }
        for row in 0..self.dim {
            for col in (row + 1)..self.dim {
                if (self.get(row, col) - self.get(col, row)).abs() > EXACT_TOLERANCE {
                    return Err(CorrelationMatrixError::NotSymmetric { row, col });
                }
            }
        }
        for index in 0..self.dim {
            let value = self.get(index, index);
            if (value - 1.0).abs() > EXACT_TOLERANCE {
                return Err(CorrelationMatrixError::NonUnitDiagonal { index, value });
            }
        }
        Ok(())
    }

    /// Validates the matrix and returns its lower-triangular Cholesky factor.
    ///
    /// Rank-deficient matrices (e.g. a coefficient of exactly ±1) are
    /// accepted: a zero pivot yields a zero column as long as the entries
    /// below it are consistent with it.
    pub fn cholesky(&self) -> Result<CholeskyFactor, CorrelationMatrixError> {
        self.check_entries()?;

        let n = self.dim;
        let mut l = vec![0.0; n * n];
        for j in 0..n {
            let mut pivot = self.get(j, j);
            for k in 0..j {
                pivot -= l[j * n + k] * l[j * n + k];
            }
            if pivot < -PSD_TOLERANCE {
                return Err(CorrelationMatrixError::NotPositiveSemiDefinite { index: j, pivot });
            }

            if pivot <= ZERO_PIVOT {
                for i in (j + 1)..n {
                    let mut residual = self.get(i, j);
                    for k in 0..j {
                        residual -= l[i * n + k] * l[j * n + k];
                    }
                    if residual.abs() > ZERO_PIVOT_RESIDUAL {
                        return Err(CorrelationMatrixError::NotPositiveSemiDefinite {
                            index: j,
                            pivot,
                        });
                    }
                }
                continue;
            }

            let diag = pivot.sqrt();
            l[j * n + j] = diag;
            for i in (j + 1)..n {
                let mut sum = self.get(i, j);
                for k in 0..j {
                    sum -= l[i * n + k] * l[j * n + k];
                }
                l[i * n + j] = sum / diag;
            }
        }

        Ok(CholeskyFactor { dim: n, data: l })
    }
}

/// Lower-triangular `L` with `L·Lᵗ` equal to the source matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    dim: usize,
    data: Vec<f64>,
}

impl CholeskyFactor {
    /// Dimension.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Entry `(row, col)`; zero above the diagonal.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.dim + col]
    }

    /// Computes `L·z` into `out`.
    pub fn apply(&self, z: &[f64], out: &mut Vec<f64>) {
        out.clear();
        for i in 0..self.dim {
            let row = &self.data[i * self.dim..i * self.dim + i + 1];
            out.push(row.iter().zip(z).map(|(l, z)| l * z).sum());
        }
    }

    /// `L·Lᵗ`, entry `(row, col)`.
    #[must_use]
    pub fn reconstruct(&self, row: usize, col: usize) -> f64 {
        (0..self.dim)
            .map(|k| self.get(row, k) * self.get(col, k))
            .sum()
    }
}
