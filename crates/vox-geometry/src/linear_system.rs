//! Linear system containers: stencil, compressed and multigrid.

use std::fmt;

use crate::blas::{Blas, CompressedBlas, FdmBlas};
use crate::error::ValidationError;
use crate::grid::{FdmMatrix, FdmVector};
use crate::mg_utils;
use crate::types::CsrMatrix;
use crate::validation;

// ---------------------------------------------------------------------------
// Stencil system
// ---------------------------------------------------------------------------

/// `A x = b` on an N-dimensional grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FdmLinearSystem<const N: usize> {
    pub a: FdmMatrix<N>,
    pub x: FdmVector<N>,
    pub b: FdmVector<N>,
}

pub type FdmLinearSystem2 = FdmLinearSystem<2>;
pub type FdmLinearSystem3 = FdmLinearSystem<3>;

impl<const N: usize> FdmLinearSystem<N> {
    /// Zero-filled system of resolution `size`.
    pub fn new(size: [usize; N]) -> Self {
        Self {
            a: FdmMatrix::new(size),
            x: FdmVector::new(size),
            b: FdmVector::new(size),
        }
    }

    /// Resize all three grids.
    pub fn resize(&mut self, size: [usize; N]) {
        self.a.resize(size);
        self.x.resize(size);
        self.b.resize(size);
    }

    /// Drop all storage.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Check that `x` and `b` share the resolution of `a` and that `b` is
    /// finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_fdm_system(&self.a, &self.x, &self.b)?;
        validation::validate_finite("b", self.b.as_slice())
    }
}

// ---------------------------------------------------------------------------
// Compressed system
// ---------------------------------------------------------------------------

/// `A x = b` with `A` in CSR form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FdmCompressedLinearSystem {
    pub a: CsrMatrix<f64>,
    pub x: Vec<f64>,
    pub b: Vec<f64>,
}

impl FdmCompressedLinearSystem {
    /// Drop all storage.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Check that the matrix is a valid square CSR matrix matching `x`/`b`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_compressed_system(&self.a, &self.x, &self.b)?;
        validation::validate_finite("b", &self.b)
    }

    /// Compress a stencil system. Cell `i` of the grid (storage order, x
    /// fastest) becomes row `i`; column indices are ascending in every row.
    pub fn from_stencil<const N: usize>(
        system: &FdmLinearSystem<N>,
    ) -> Result<Self, ValidationError> {
        system.validate()?;

        let n = system.a.len();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_indices = Vec::with_capacity(n * (2 * N + 1));
        let mut values = Vec::with_capacity(n * (2 * N + 1));
        row_ptr.push(0);
        for i in 0..n {
            for (j, v) in system.a.row_entries(i) {
                col_indices.push(j);
                values.push(v);
            }
            row_ptr.push(col_indices.len());
        }

        Ok(Self {
            a: CsrMatrix {
                row_ptr,
                col_indices,
                values,
                rows: n,
                cols: n,
            },
            x: system.x.as_slice().to_vec(),
            b: system.b.as_slice().to_vec(),
        })
    }

    /// Write the compressed solution back into a grid with the same number
    /// of cells.
    pub fn scatter_solution<const N: usize>(
        &self,
        target: &mut FdmVector<N>,
    ) -> Result<(), ValidationError> {
        if target.len() != self.x.len() {
            return Err(ValidationError::DimensionMismatch(format!(
                "grid has {} cells, compressed solution has {}",
                target.len(),
                self.x.len(),
            )));
        }
        target.as_mut_slice().copy_from_slice(&self.x);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Multigrid hierarchies
// ---------------------------------------------------------------------------

/// Per-level matrices, level 0 finest.
pub struct MgMatrix<B: Blas> {
    pub levels: Vec<B::Matrix>,
}

/// Per-level vectors, level 0 finest.
pub struct MgVector<B: Blas> {
    pub levels: Vec<B::Vector>,
}

macro_rules! impl_mg_container {
    ($name:ident, $item:ident) => {
        impl<B: Blas> $name<B> {
            /// Number of levels.
            #[inline]
            pub fn number_of_levels(&self) -> usize {
                self.levels.len()
            }

            #[inline]
            pub fn is_empty(&self) -> bool {
                self.levels.is_empty()
            }

            /// Level 0, if any.
            #[inline]
            pub fn finest(&self) -> Option<&B::$item> {
                self.levels.first()
            }

            #[inline]
            pub fn finest_mut(&mut self) -> Option<&mut B::$item> {
                self.levels.first_mut()
            }

            /// Last level, if any.
            #[inline]
            pub fn coarsest(&self) -> Option<&B::$item> {
                self.levels.last()
            }
        }

        impl<B: Blas> Default for $name<B> {
            fn default() -> Self {
                Self { levels: Vec::new() }
            }
        }

        impl<B: Blas> Clone for $name<B> {
            fn clone(&self) -> Self {
                Self {
                    levels: self.levels.clone(),
                }
            }
        }

        impl<B: Blas> fmt::Debug for $name<B>
        where
            B::$item: fmt::Debug,
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("levels", &self.levels)
                    .finish()
            }
        }
    };
}

impl_mg_container!(MgMatrix, Matrix);
impl_mg_container!(MgVector, Vector);

pub type FdmMgMatrix<const N: usize> = MgMatrix<FdmBlas<N>>;
pub type FdmMgVector<const N: usize> = MgVector<FdmBlas<N>>;
pub type CompressedMgMatrix = MgMatrix<CompressedBlas>;

/// Multigrid system: one `A x = b` per level.
#[derive(Debug, Clone, Default)]
pub struct FdmMgLinearSystem<const N: usize> {
    pub a: FdmMgMatrix<N>,
    pub x: FdmMgVector<N>,
    pub b: FdmMgVector<N>,
}

pub type FdmMgLinearSystem2 = FdmMgLinearSystem<2>;
pub type FdmMgLinearSystem3 = FdmMgLinearSystem<3>;

impl<const N: usize> FdmMgLinearSystem<N> {
    /// Drop every level.
    pub fn clear(&mut self) {
        self.a.levels.clear();
        self.x.levels.clear();
        self.b.levels.clear();
    }

    /// Number of levels in the hierarchy.
    #[inline]
    pub fn number_of_levels(&self) -> usize {
        self.a.levels.len()
    }

    /// Resize to `number_of_levels` levels ending at resolution `coarsest`.
    /// See [`mg_utils::resize_array_with_coarsest`].
    pub fn resize_with_coarsest(&mut self, coarsest: [usize; N], number_of_levels: usize) {
        mg_utils::resize_array_with_coarsest(coarsest, number_of_levels, &mut self.a.levels);
        mg_utils::resize_array_with_coarsest(coarsest, number_of_levels, &mut self.x.levels);
        mg_utils::resize_array_with_coarsest(coarsest, number_of_levels, &mut self.b.levels);
    }

    /// Resize to a hierarchy starting at resolution `finest`, capped at
    /// `max_number_of_levels`. See [`mg_utils::resize_array_with_finest`].
    pub fn resize_with_finest(&mut self, finest: [usize; N], max_number_of_levels: usize) {
        mg_utils::resize_array_with_finest(finest, max_number_of_levels, &mut self.a.levels);
        mg_utils::resize_array_with_finest(finest, max_number_of_levels, &mut self.x.levels);
        mg_utils::resize_array_with_finest(finest, max_number_of_levels, &mut self.b.levels);
    }

    /// Check level counts, per-level sizes and halving between levels, and
    /// that the finest right-hand side is finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_mg_hierarchy(&self.a.levels, &self.x.levels, &self.b.levels)?;
        validation::validate_finite("b", self.b.levels[0].as_slice())
    }
}
