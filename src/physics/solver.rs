//! Projected Gauss-Seidel solver for the contact MLCP.

use nalgebra::DVector;
use tracing::trace;

use crate::error::SolveError;

use super::constraint::ConstraintType;
use super::mlcp::MlcpProblem;

/// Smallest diagonal entry accepted for a row that has to be solved.
const MIN_DIAGONAL: f64 = 1e-15;

/// Solution of an MLCP.
#[derive(Debug, Clone, PartialEq)]
pub struct MlcpSolution {
    /// Multipliers, one per row.
    pub x: DVector<f64>,
    pub iterations: usize,
}

/// Numerical MLCP solver.
pub trait MlcpSolver: Send + Sync {
    fn solve(&self, problem: &MlcpProblem) -> Result<MlcpSolution, SolveError>;
}

/// Configuration for [`GaussSeidelSolver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussSeidelConfig {
    /// Maximum number of sweeps over all rows. Default: 100.
    pub max_iterations: usize,
    /// Convergence threshold on the largest multiplier update, relative to the largest
    /// multiplier (at least 1). Default: 1e-8.
    pub precision: f64,
}

impl Default for GaussSeidelConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            precision: 1e-8,
        }
    }
}

/// Projected Gauss-Seidel: `x_i = max(0, x_i - (A_i x + b_i) / A_ii)`, unprojected for
/// bilateral rows.
#[derive(Debug, Clone, Default)]
pub struct GaussSeidelSolver {
    pub config: GaussSeidelConfig,
}

impl GaussSeidelSolver {
    pub fn new(config: GaussSeidelConfig) -> Self {
        Self { config }
    }
}

impl MlcpSolver for GaussSeidelSolver {
    fn solve(&self, problem: &MlcpProblem) -> Result<MlcpSolution, SolveError> {
        let n = problem.b.len();
        let (rows, cols) = problem.a.shape();
        if rows != n || cols != n || problem.constraint_types.len() != n {
            return Err(SolveError::DimensionMismatch { rows, cols, rhs: n });
        }
        if n == 0 {
            return Ok(MlcpSolution {
                x: DVector::zeros(0),
                iterations: 0,
            });
        }

        // Rows nothing can move stay at zero; the rest need a positive pivot
        let mut active = vec![true; n];
        for i in 0..n {
            let diagonal = problem.a[(i, i)];
            if !diagonal.is_finite() {
                return Err(SolveError::NonFinite { iterations: 0 });
            }
            if diagonal <= MIN_DIAGONAL {
                let row_is_empty = problem.a.row(i).iter().all(|&v| v == 0.0);
                if row_is_empty {
                    active[i] = false;
                } else {
                    return Err(SolveError::SingularDiagonal { row: i, value: diagonal });
                }
            }
        }

        let mut x = DVector::zeros(n);
        let mut residual = f64::INFINITY;
        for iteration in 1..=self.config.max_iterations {
            let mut max_delta: f64 = 0.0;
            for i in (0..n).filter(|&i| active[i]) {
                let w = problem.a.row(i).dot(&x.transpose()) + problem.b[i];
                let mut value = x[i] - w / problem.a[(i, i)];
                if problem.constraint_types[i] == ConstraintType::FrictionlessContact {
                    value = value.max(0.0);
                }
                max_delta = max_delta.max((value - x[i]).abs());
                x[i] = value;
            }

            if !x.iter().all(|v| v.is_finite()) {
                return Err(SolveError::NonFinite { iterations: iteration });
            }

            let scale = x.amax().max(1.0);
            residual = max_delta / scale;
            trace!(iteration, residual, "gauss-seidel sweep");
            if residual <= self.config.precision {
                return Ok(MlcpSolution { x, iterations: iteration });
            }
        }

        Err(SolveError::NotConverged {
            iterations: self.config.max_iterations,
            residual,
        })
    }
}
