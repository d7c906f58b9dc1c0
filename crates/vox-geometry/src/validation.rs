//! Input validation for solver operations.
//!
//! All validation functions run eagerly before any iteration begins, so
//! callers receive clear diagnostics instead of silently wrong results.
//! Every public function returns [`ValidationError`] on failure, which
//! converts into [`SolverError::InvalidInput`](crate::error::SolverError)
//! via `From`.

use crate::error::ValidationError;
use crate::grid::Grid;
use crate::mg::MgParameters;
use crate::query::SearchGridConfig;
use crate::types::CsrMatrix;

// ---------------------------------------------------------------------------
// CSR matrix validation
// ---------------------------------------------------------------------------

/// Validate the structural integrity of a CSR matrix.
///
/// Performs the following checks in order:
///
/// 1. `row_ptr` length equals `rows + 1`.
/// 2. `row_ptr` is monotonically non-decreasing.
/// 3. `row_ptr[0] == 0` and `row_ptr[rows] == nnz`.
/// 4. `col_indices` length equals `values` length.
/// 5. All column indices are less than `cols`.
/// 6. No `NaN` or `Inf` values in `values`.
/// 7. Column indices are sorted within each row (emits a [`tracing::warn`] if
///    not, but does not error).
///
/// # Errors
///
/// Returns [`ValidationError`] describing the first violation found.
///
/// # Examples
///
/// ```
/// use vox_geometry::types::CsrMatrix;
/// use vox_geometry::validation::validate_csr_matrix;
///
/// let m = CsrMatrix::<f64>::from_coo(2, 2, vec![(0, 0, 1.0), (1, 1, 2.0)]);
/// assert!(validate_csr_matrix(&m).is_ok());
/// ```
pub fn validate_csr_matrix(matrix: &CsrMatrix<f64>) -> Result<(), ValidationError> {
    // 1. row_ptr length
    let expected_row_ptr_len = matrix.rows + 1;
    if matrix.row_ptr.len() != expected_row_ptr_len {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr length {} does not equal rows + 1 = {}",
            matrix.row_ptr.len(),
            expected_row_ptr_len,
        )));
    }

    // 2. row_ptr monotonicity
    for i in 1..matrix.row_ptr.len() {
        if matrix.row_ptr[i] < matrix.row_ptr[i - 1] {
            return Err(ValidationError::NonMonotonicRowPtrs { position: i });
        }
    }

    // 3. row_ptr boundary values
    if matrix.row_ptr[0] != 0 {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr[0] = {} (expected 0)",
            matrix.row_ptr[0],
        )));
    }
    let nnz = matrix.values.len();
    let expected_nnz = matrix.row_ptr[matrix.rows];
    if expected_nnz != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "values length {} does not match row_ptr[rows] = {}",
            nnz, expected_nnz,
        )));
    }

    // 4. col_indices length must match values length
    if matrix.col_indices.len() != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "col_indices length {} does not match values length {}",
            matrix.col_indices.len(),
            nnz,
        )));
    }

    // 5. Column index bounds + 6. Finiteness + 7. Sorted check (warn only)
    for row in 0..matrix.rows {
        let mut prev_col: Option<usize> = None;
        for idx in matrix.row_ptr[row]..matrix.row_ptr[row + 1] {
            let col = matrix.col_indices[idx];
            if col >= matrix.cols {
                return Err(ValidationError::IndexOutOfBounds {
                    index: col,
                    row,
                    cols: matrix.cols,
                });
            }

            let val = matrix.values[idx];
            if !val.is_finite() {
                return Err(ValidationError::NonFiniteValue(format!(
                    "matrix[{}, {}] = {}",
                    row, col, val,
                )));
            }

            if let Some(pc) = prev_col {
                if col < pc {
                    tracing::warn!(
                        row = row,
                        "column indices not sorted within row (col {} follows {}); \
                         incomplete Cholesky may be inaccurate",
                        col,
                        pc,
                    );
                }
            }
            prev_col = Some(col);
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Linear system validation
// ---------------------------------------------------------------------------

/// Validate a compressed system: square valid CSR matrix with `x` and `b`
/// sized to match.
///
/// # Errors
///
/// Returns [`ValidationError`] on structural or dimension problems.
pub fn validate_compressed_system(
    a: &CsrMatrix<f64>,
    x: &[f64],
    b: &[f64],
) -> Result<(), ValidationError> {
    if !a.is_square() {
        return Err(ValidationError::DimensionMismatch(format!(
            "matrix must be square, got {}x{}",
            a.rows, a.cols,
        )));
    }
    validate_csr_matrix(a)?;

    if b.len() != a.rows {
        return Err(ValidationError::DimensionMismatch(format!(
            "b length {} does not match matrix rows {}",
            b.len(),
            a.rows,
        )));
    }
    if x.len() != a.cols {
        return Err(ValidationError::DimensionMismatch(format!(
            "x length {} does not match matrix columns {}",
            x.len(),
            a.cols,
        )));
    }
    Ok(())
}

/// Reject `NaN` / `Inf` entries in a right-hand side or initial guess.
///
/// # Errors
///
/// Returns [`ValidationError::NonFiniteValue`] naming the first bad index.
pub fn validate_finite(what: &str, values: &[f64]) -> Result<(), ValidationError> {
    if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::NonFiniteValue(format!(
            "{what} value at index {idx}"
        )));
    }
    Ok(())
}

/// Check that `grid` has the same resolution as the matrix grid.
pub fn validate_same_size<T, U, const N: usize>(
    what: &str,
    matrix: &Grid<T, N>,
    grid: &Grid<U, N>,
) -> Result<(), ValidationError> {
    if matrix.size() != grid.size() {
        return Err(ValidationError::SizeMismatch {
            what: what.to_string(),
            expected: matrix.size().to_vec(),
            actual: grid.size().to_vec(),
        });
    }
    Ok(())
}

/// Validate a stencil system: `x` and `b` share the resolution of `a`.
///
/// # Errors
///
/// Returns [`ValidationError::SizeMismatch`] naming the offending grid.
pub fn validate_fdm_system<A, V, const N: usize>(
    a: &Grid<A, N>,
    x: &Grid<V, N>,
    b: &Grid<V, N>,
) -> Result<(), ValidationError> {
    validate_same_size("x", a, x)?;
    validate_same_size("b", a, b)
}

/// Validate a multigrid hierarchy.
///
/// 1. At least one level, and the same number of levels in `a`, `x` and `b`.
/// 2. Each level's `x` and `b` match that level's matrix.
/// 3. Every level halves the per-axis resolution of the one above it.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidHierarchy`] or
/// [`ValidationError::SizeMismatch`].
pub fn validate_mg_hierarchy<A, V, const N: usize>(
    a: &[Grid<A, N>],
    x: &[Grid<V, N>],
    b: &[Grid<V, N>],
) -> Result<(), ValidationError> {
    // 1. Level counts
    if a.is_empty() {
        return Err(ValidationError::InvalidHierarchy {
            level: 0,
            detail: "hierarchy has no levels".into(),
        });
    }
    if x.len() != a.len() || b.len() != a.len() {
        return Err(ValidationError::InvalidHierarchy {
            level: a.len().min(x.len()).min(b.len()),
            detail: format!(
                "level counts differ: a = {}, x = {}, b = {}",
                a.len(),
                x.len(),
                b.len(),
            ),
        });
    }

    for level in 0..a.len() {
        // 2. Per-level sizes
        validate_fdm_system(&a[level], &x[level], &b[level])?;

        // 3. Halving
        if level > 0 {
            let finer = a[level - 1].size();
            let coarser = a[level].size();
            if (0..N).any(|axis| finer[axis] != 2 * coarser[axis]) {
                return Err(ValidationError::InvalidHierarchy {
                    level,
                    detail: format!(
                        "resolution {:?} is not half of {:?}",
                        coarser, finer,
                    ),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Solver parameter validation
// ---------------------------------------------------------------------------

/// Validate a convergence tolerance: finite and non-negative.
///
/// # Errors
///
/// Returns [`ValidationError::ParameterOutOfRange`].
pub fn validate_tolerance(name: &str, tolerance: f64) -> Result<(), ValidationError> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(ValidationError::ParameterOutOfRange {
            name: name.to_string(),
            value: format!("{tolerance}"),
            expected: "finite and >= 0".into(),
        });
    }
    Ok(())
}

/// Validate an SOR relaxation factor: finite and in `(0, 2)`.
///
/// # Errors
///
/// Returns [`ValidationError::ParameterOutOfRange`].
pub fn validate_sor_factor(sor_factor: f64) -> Result<(), ValidationError> {
    if !sor_factor.is_finite() || sor_factor <= 0.0 || sor_factor >= 2.0 {
        return Err(ValidationError::ParameterOutOfRange {
            name: "sor_factor".into(),
            value: format!("{sor_factor}"),
            expected: "(0.0, 2.0)".into(),
        });
    }
    Ok(())
}

/// Validate a count that must be at least one.
///
/// # Errors
///
/// Returns [`ValidationError::ParameterOutOfRange`].
pub fn validate_positive(name: &str, value: usize) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::ParameterOutOfRange {
            name: name.to_string(),
            value: "0".into(),
            expected: ">= 1".into(),
        });
    }
    Ok(())
}

/// Validate multigrid parameters.
///
/// # Errors
///
/// Returns [`ValidationError::ParameterOutOfRange`] for the first bad field.
pub fn validate_mg_params(params: &MgParameters) -> Result<(), ValidationError> {
    validate_positive("max_number_of_levels", params.max_number_of_levels)?;
    validate_tolerance("max_tolerance", params.max_tolerance)?;
    validate_sor_factor(params.sor_factor)
}

/// Validate a hash-grid layout: every axis has at least one bucket and the
/// spacing is finite and positive.
///
/// # Errors
///
/// Returns [`ValidationError::ParameterOutOfRange`] for the first bad field.
pub fn validate_search_grid(config: &SearchGridConfig) -> Result<(), ValidationError> {
    for (axis, &n) in ["resolution.x", "resolution.y", "resolution.z"]
        .iter()
        .zip(&config.resolution)
    {
        validate_positive(axis, n)?;
    }
    if !config.grid_spacing.is_finite() || config.grid_spacing <= 0.0 {
        return Err(ValidationError::ParameterOutOfRange {
            name: "grid_spacing".into(),
            value: format!("{}", config.grid_spacing),
            expected: "finite and > 0".into(),
        });
    }
    Ok(())
}
