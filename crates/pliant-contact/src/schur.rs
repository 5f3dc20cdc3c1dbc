//! Schur complement of a symmetric block system.
//!
//! For
//!
//! ```text
//! [ A   B ] [x_elim]   [r_elim]
//! [ Bᵀ  C ] [x_ret ] = [r_ret ]
//! ```
//!
//! the eliminated block `A` is factorized once with sparse Cholesky. The
//! reduced operator `D = C − Bᵀ A⁻¹ B` is dense: it only spans the DOFs
//! of vertices in contact.

use faer::Mat;
use pliant_math::{CsrMatrix, FaerSolver, SparseSolver};
use pliant_types::{PliantError, PliantResult};

/// Dense Schur complement with the factorization needed to back-substitute.
pub struct SchurComplement {
    eliminated: Vec<usize>,
    retained: Vec<usize>,
    /// `A⁻¹`, absent when nothing is eliminated.
    solver: Option<FaerSolver>,
    /// `B` as (eliminated × retained).
    coupling: CsrMatrix,
    complement: Mat<f64>,
}

impl SchurComplement {
    /// Eliminates every index of `matrix` not listed in `retained`.
    ///
    /// Returns `ContactConsistency` if the eliminated block is not SPD.
    pub fn new(matrix: &CsrMatrix, retained: &[usize]) -> PliantResult<Self> {
        let n = matrix.rows;
        if matrix.cols != n {
            return Err(PliantError::ContactConsistency(format!(
                "Schur complement needs a square matrix, got {}×{}",
                matrix.rows, matrix.cols
            )));
        }

        let mut keep = vec![false; n];
        for &index in retained {
            if index >= n || keep[index] {
                return Err(PliantError::ContactConsistency(format!(
                    "retained index {index} is out of range or repeated (n = {n})"
                )));
            }
            keep[index] = true;
        }
        let mut retained = retained.to_vec();
        retained.sort_unstable();
        let eliminated: Vec<usize> = (0..n).filter(|&i| !keep[i]).collect();

        let block_a = matrix.submatrix(&eliminated, &eliminated);
        let coupling = matrix.submatrix(&eliminated, &retained);
        let mut complement = matrix.submatrix(&retained, &retained).to_dense();

        let solver = if eliminated.is_empty() {
            None
        } else {
            let mut solver = FaerSolver::new();
            solver.factorize(&block_a).map_err(|e| {
                PliantError::ContactConsistency(format!(
                    "eliminated block is not symmetric positive definite: {e}"
                ))
            })?;
            Some(solver)
        };

        if let Some(solver) = &solver {
            let m = eliminated.len();
            let mut column = vec![0.0; m];
            let mut a_inv_column = vec![0.0; m];
            for j in 0..retained.len() {
                for (row, slot) in column.iter_mut().enumerate() {
                    *slot = coupling.get(row, j);
                }
                solver.solve(&column, &mut a_inv_column)?;
                let correction = transpose_mul(&coupling, &a_inv_column);
                for (i, value) in correction.into_iter().enumerate() {
                    complement[(i, j)] -= value;
                }
            }
        }

        tracing::trace!(
            eliminated = eliminated.len(),
            retained = retained.len(),
            "schur complement"
        );

        Ok(Self {
            eliminated,
            retained,
            solver,
            coupling,
            complement,
        })
    }

    /// Eliminated indices (ascending).
    pub fn eliminated(&self) -> &[usize] {
        &self.eliminated
    }

    /// Retained indices (ascending); the complement is ordered this way.
    pub fn retained(&self) -> &[usize] {
        &self.retained
    }

    /// `C − Bᵀ A⁻¹ B`.
    pub fn complement(&self) -> &Mat<f64> {
        &self.complement
    }

    /// `r_ret − Bᵀ A⁻¹ r_elim`.
    pub fn reduced_rhs(&self, r_elim: &[f64], r_ret: &[f64]) -> PliantResult<Vec<f64>> {
        self.check_len("eliminated RHS", r_elim.len(), self.eliminated.len())?;
        self.check_len("retained RHS", r_ret.len(), self.retained.len())?;
        let mut reduced = r_ret.to_vec();
        if let Some(solver) = &self.solver {
            let mut y = vec![0.0; self.eliminated.len()];
            solver.solve(r_elim, &mut y)?;
            for (out, value) in reduced.iter_mut().zip(transpose_mul(&self.coupling, &y)) {
                *out -= value;
            }
        }
        Ok(reduced)
    }

    /// `x_elim = A⁻¹ (r_elim − B x_ret)`.
    pub fn back_substitute(&self, r_elim: &[f64], x_ret: &[f64]) -> PliantResult<Vec<f64>> {
        self.check_len("eliminated RHS", r_elim.len(), self.eliminated.len())?;
        self.check_len("retained solution", x_ret.len(), self.retained.len())?;
        let Some(solver) = &self.solver else {
            return Ok(Vec::new());
        };
        let mut rhs = vec![0.0; self.eliminated.len()];
        self.coupling.mul_vec(x_ret, &mut rhs);
        for (b, r) in rhs.iter_mut().zip(r_elim) {
            *b = r - *b;
        }
        let mut x = vec![0.0; self.eliminated.len()];
        solver.solve(&rhs, &mut x)?;
        Ok(x)
    }

    fn check_len(&self, what: &str, got: usize, expected: usize) -> PliantResult<()> {
        if got != expected {
            return Err(PliantError::ContactConsistency(format!(
                "{what} has length {got}, expected {expected}"
            )));
        }
        Ok(())
    }
}

/// `Bᵀ y` for a CSR `B`.
fn transpose_mul(b: &CsrMatrix, y: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; b.cols];
    for (row, &yi) in y.iter().enumerate().take(b.rows) {
        for idx in b.row_ptr[row]..b.row_ptr[row + 1] {
            out[b.col_idx[idx]] += b.values[idx] * yi;
        }
    }
    out
}
