//! Sparse Cholesky solver backed by `faer`.
//!
//! Implements the [`SparseSolver`] trait using faer's supernodal LLᵀ
//! factorization.
//!
//! ## Workflow
//! 1. `factorize(matrix)` — converts CSR→CSC, computes symbolic + numeric LLᵀ
//! 2. `solve(rhs, solution)` — forward/backward substitution (cached factorization)
//! 3. Repeat `solve()` with different RHS without re-factorizing

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::SparseColMat;
use faer::sparse::Triplet;
use faer::Side;
use pliant_types::{PliantError, PliantResult};

use crate::sparse::{dimension_mismatch, CsrMatrix, SparseSolver};

/// Sparse Cholesky (LLᵀ) solver using `faer`.
///
/// Stores the factorization for reuse across multiple solves. The
/// Schur complement uses one factorization of the eliminated block for
/// every column of the coupling block and for back-substitution.
pub struct FaerSolver {
    /// Cached LLᵀ factorization.
    factorization: Option<Llt<usize, f64>>,
    /// Matrix dimension (N×N).
    dimension: usize,
}

impl FaerSolver {
    /// Creates a new solver (unfactorized).
    pub fn new() -> Self {
        Self {
            factorization: None,
            dimension: 0,
        }
    }

    /// Returns the dimension of the factorized matrix.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Convert our CSR matrix to faer's CSC matrix.
    fn csr_to_csc(matrix: &CsrMatrix) -> PliantResult<SparseColMat<usize, f64>> {
        let mut triplets: Vec<Triplet<usize, usize, f64>> = Vec::with_capacity(matrix.nnz());
        for row in 0..matrix.rows {
            for idx in matrix.row_ptr[row]..matrix.row_ptr[row + 1] {
                let col = matrix.col_idx[idx];
                let val = matrix.values[idx];
                triplets.push(Triplet { row, col, val });
            }
        }

        SparseColMat::try_new_from_triplets(matrix.rows, matrix.cols, &triplets).map_err(|e| {
            PliantError::InvalidConfig(format!("Failed to construct faer CSC matrix: {e:?}"))
        })
    }
}

impl Default for FaerSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseSolver for FaerSolver {
    fn factorize(&mut self, matrix: &CsrMatrix) -> PliantResult<()> {
        if matrix.rows != matrix.cols {
            return Err(PliantError::InvalidConfig(format!(
                "Matrix must be square, got {}×{}",
                matrix.rows, matrix.cols
            )));
        }
        if matrix.rows == 0 {
            return Err(PliantError::InvalidConfig(
                "Cannot factorize empty matrix".into(),
            ));
        }

        self.factorization = None;
        self.dimension = matrix.rows;

        let csc = Self::csr_to_csc(matrix)?;

        // Symbolic analysis (ordering, fill-in prediction)
        let symbolic = SymbolicLlt::try_new(csc.symbolic().as_ref(), Side::Upper)
            .map_err(|e| PliantError::Numerical(format!("Symbolic analysis failed: {e:?}")))?;

        // Numeric factorization. A non-positive pivot means the matrix is not SPD.
        let llt = Llt::try_new_with_symbolic(symbolic, csc.as_ref(), Side::Upper)
            .map_err(|e| PliantError::Numerical(format!("Cholesky factorization failed: {e:?}")))?;

        self.factorization = Some(llt);
        Ok(())
    }

    fn solve(&self, rhs: &[f64], solution: &mut [f64]) -> PliantResult<()> {
        let llt = self.factorization.as_ref().ok_or_else(|| {
            PliantError::InvalidConfig("Solver not factorized. Call factorize() first.".into())
        })?;

        if rhs.len() != self.dimension {
            return Err(dimension_mismatch("RHS", rhs.len(), self.dimension));
        }
        if solution.len() != self.dimension {
            return Err(dimension_mismatch("Solution", solution.len(), self.dimension));
        }

        let rhs_mat: faer::Mat<f64> = faer::Mat::from_fn(self.dimension, 1, |i, _| rhs[i]);

        // L Lᵀ x = b
        let sol = llt.solve(&rhs_mat);

        for (i, out) in solution.iter_mut().enumerate() {
            *out = sol[(i, 0)];
        }

        Ok(())
    }

    fn is_factorized(&self) -> bool {
        self.factorization.is_some()
    }
}
