//! Error types for the solver crate.
//!
//! Non-convergence is deliberately absent: a solver that runs out of
//! iterations returns `Ok(false)` and leaves the final residual readable
//! through [`FdmLinearSystemSolver::last_residual`]. Errors are reserved for
//! inputs that would otherwise produce undefined results, and are raised
//! before any iteration starts.
//!
//! [`FdmLinearSystemSolver::last_residual`]: crate::traits::FdmLinearSystemSolver::last_residual

/// Primary error type for solver operations.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// The caller supplied invalid input (sizes, parameters, hierarchy shape).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// A dedicated worker pool could not be created for an execution context.
    #[error("execution pool error: {0}")]
    ExecutionPool(String),
}

/// Validation errors for solver inputs.
///
/// These are raised eagerly before any computation begins so that callers get
/// clear diagnostics rather than mysterious numerical failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Matrix or vector dimensions are inconsistent.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Two grids of one system do not share the same resolution.
    #[error("size mismatch for {what}: expected {expected:?}, got {actual:?}")]
    SizeMismatch {
        /// Which grid disagreed (e.g. `"x"` or `"b"`).
        what: String,
        /// Resolution of the reference grid (the matrix).
        expected: Vec<usize>,
        /// Resolution that was found.
        actual: Vec<usize>,
    },

    /// A value is NaN or infinite where a finite number is required.
    #[error("non-finite value detected: {0}")]
    NonFiniteValue(String),

    /// A column index is out of bounds for the declared number of columns.
    #[error("column index {index} out of bounds for {cols} columns (row {row})")]
    IndexOutOfBounds {
        /// Offending column index.
        index: usize,
        /// Row containing the offending entry.
        row: usize,
        /// Declared column count.
        cols: usize,
    },

    /// The `row_ptr` array is not monotonically non-decreasing.
    #[error("row_ptr is not monotonically non-decreasing at position {position}")]
    NonMonotonicRowPtrs {
        /// Position in `row_ptr` where the violation was detected.
        position: usize,
    },

    /// A parameter is outside its valid range.
    #[error("parameter out of range: {name} = {value} (expected {expected})")]
    ParameterOutOfRange {
        /// Name of the parameter.
        name: String,
        /// The invalid value (as a string for flexibility).
        value: String,
        /// Human-readable description of the valid range.
        expected: String,
    },

    /// A multigrid hierarchy is empty or its levels do not halve correctly.
    #[error("invalid multigrid hierarchy at level {level}: {detail}")]
    InvalidHierarchy {
        /// First level at which the problem was found.
        level: usize,
        /// Human-readable explanation.
        detail: String,
    },
}
