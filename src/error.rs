//! Error types for collision detection and contact resolution.

use thiserror::Error;

use crate::shapes::ShapeKind;

/// Errors raised while building shapes, registering calculators or reading representations.
#[derive(Debug, Error)]
pub enum CollisionError {
    /// A calculator is already registered for this pair of shape kinds (in either order).
    #[error("duplicate contact calculator for ({first:?}, {second:?})")]
    DuplicateCalculator {
        /// First shape kind of the pair.
        first: ShapeKind,
        /// Second shape kind of the pair.
        second: ShapeKind,
    },

    /// A triangle or segment references a vertex that does not exist.
    #[error("element {element} references vertex {vertex}, but the shape has {vertex_count} vertices")]
    InvalidIndex {
        /// Index of the offending triangle or segment.
        element: usize,
        /// The out-of-range vertex index.
        vertex: usize,
        /// Number of vertices in the shape.
        vertex_count: usize,
    },

    /// Node state does not match the topology of the shape it drives.
    #[error("node count mismatch: shape has {expected} vertices, state has {actual}")]
    NodeCountMismatch {
        /// Vertex count of the shape.
        expected: usize,
        /// Node count of the state.
        actual: usize,
    },

    /// A representation lacks a component the collision core needs.
    #[error("entity is missing a required component: {details}")]
    MissingComponent {
        /// Which component and entity.
        details: String,
    },

    /// A contact location carries nothing the representation can resolve.
    #[error("unresolvable contact location: {details}")]
    UnresolvableLocation {
        /// Which coordinate was missing or out of range.
        details: String,
    },
}

/// Errors reported by an MLCP solver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    /// The system matrix has a zero or negative diagonal entry.
    #[error("singular diagonal at row {row}: {value}")]
    SingularDiagonal {
        /// Row of the offending entry.
        row: usize,
        /// The diagonal value.
        value: f64,
    },

    /// The iteration produced NaN or infinite multipliers.
    #[error("solver produced non-finite values after {iterations} iterations")]
    NonFinite {
        /// Iterations performed before the failure was detected.
        iterations: usize,
    },

    /// The iteration budget ran out before reaching the requested precision.
    #[error("solver did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged {
        /// Iterations performed.
        iterations: usize,
        /// Last update magnitude.
        residual: f64,
    },

    /// Matrix and right-hand side sizes disagree.
    #[error("dimension mismatch: matrix is {rows}x{cols}, rhs has {rhs} entries")]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        rhs: usize,
    },
}

/// Errors of one physics step.
#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error(transparent)]
    Collision(#[from] CollisionError),

    #[error(transparent)]
    Solve(#[from] SolveError),
}

/// Result type for collision operations.
pub type CollisionResult<T> = Result<T, CollisionError>;

/// Result type for physics operations.
pub type PhysicsResult<T> = Result<T, PhysicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CollisionError::DuplicateCalculator {
            first: ShapeKind::Mesh,
            second: ShapeKind::Sphere,
        };
        assert_eq!(err.to_string(), "duplicate contact calculator for (Mesh, Sphere)");

        let err = SolveError::SingularDiagonal { row: 3, value: 0.0 };
        assert!(err.to_string().contains("row 3"));

        let err: PhysicsError = SolveError::NonFinite { iterations: 2 }.into();
        assert!(matches!(err, PhysicsError::Solve(_)));
    }
}
