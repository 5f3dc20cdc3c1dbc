//! Sparse matrix representation and solver interface.
//!
//! Provides a CSR (Compressed Sparse Row) matrix assembled from
//! triplets, plus the trait for sparse SPD factorizations.

use faer::Mat;
use pliant_types::{PliantError, PliantResult};
use serde::{Deserialize, Serialize};

/// Compressed Sparse Row (CSR) matrix.
///
/// Stores a sparse matrix in row-major order. Columns within a row are
/// sorted and unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrMatrix {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Row pointer array (length = rows + 1).
    /// `row_ptr[i]..row_ptr[i+1]` are the indices into `col_idx` and `values`
    /// for non-zeros in row `i`.
    pub row_ptr: Vec<usize>,
    /// Column indices of non-zero entries.
    pub col_idx: Vec<usize>,
    /// Non-zero values.
    pub values: Vec<f64>,
}

impl CsrMatrix {
    /// Creates an empty CSR matrix with the given dimensions.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            row_ptr: vec![0; rows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Creates the n×n identity.
    pub fn identity(n: usize) -> Self {
        Self {
            rows: n,
            cols: n,
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: vec![1.0; n],
        }
    }

    /// Returns the number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Creates a CSR matrix from triplets (row, col, value).
    ///
    /// Duplicate entries are summed. Explicit zeros are kept so that the
    /// sparsity pattern does not depend on the values.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut sorted: Vec<(usize, usize, f64)> = triplets.to_vec();
        sorted.sort_unstable_by_key(|&(r, c, _)| (r, c));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx = Vec::with_capacity(sorted.len());
        let mut values = Vec::with_capacity(sorted.len());

        let mut last: Option<(usize, usize)> = None;
        for (r, c, v) in sorted {
            if last == Some((r, c)) {
                if let Some(acc) = values.last_mut() {
                    *acc += v;
                }
                continue;
            }
            col_idx.push(c);
            values.push(v);
            row_ptr[r + 1] += 1;
            last = Some((r, c));
        }

        for i in 0..rows {
            row_ptr[i + 1] += row_ptr[i];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Converts a dense matrix, skipping exact zeros.
    pub fn from_dense(dense: &Mat<f64>) -> Self {
        let mut triplets = Vec::new();
        for i in 0..dense.nrows() {
            for j in 0..dense.ncols() {
                let v = dense[(i, j)];
                if v != 0.0 {
                    triplets.push((i, j, v));
                }
            }
        }
        Self::from_triplets(dense.nrows(), dense.ncols(), &triplets)
    }

    /// Returns entry (i, j), zero if not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];
        match self.col_idx[start..end].binary_search(&j) {
            Ok(pos) => self.values[start + pos],
            Err(_) => 0.0,
        }
    }

    /// Computes `y = A x`.
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        for (row, out) in y.iter_mut().enumerate().take(self.rows) {
            let mut sum = 0.0;
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                sum += self.values[idx] * x[self.col_idx[idx]];
            }
            *out = sum;
        }
    }

    /// Returns the main diagonal.
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows.min(self.cols)).map(|i| self.get(i, i)).collect()
    }

    /// Multiplies every stored value by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.values {
            *v *= factor;
        }
    }

    /// Replaces the rows and columns flagged in `mask` by those of the identity.
    ///
    /// The diagonal entry of every flagged row must already be stored.
    pub fn replace_with_identity(&mut self, mask: &[bool]) {
        for row in 0..self.rows {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                let col = self.col_idx[idx];
                if mask[row] || mask[col] {
                    self.values[idx] = if row == col { 1.0 } else { 0.0 };
                }
            }
        }
    }

    /// Extracts the block with the given (sorted or unsorted) row and
    /// column index sets, renumbered to `0..rows.len()` × `0..cols.len()`.
    pub fn submatrix(&self, rows: &[usize], cols: &[usize]) -> Self {
        let mut col_map = vec![usize::MAX; self.cols];
        for (local, &global) in cols.iter().enumerate() {
            col_map[global] = local;
        }
        let mut triplets = Vec::new();
        for (local_row, &row) in rows.iter().enumerate() {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                let local_col = col_map[self.col_idx[idx]];
                if local_col != usize::MAX {
                    triplets.push((local_row, local_col, self.values[idx]));
                }
            }
        }
        Self::from_triplets(rows.len(), cols.len(), &triplets)
    }

    /// Expands into a dense `faer` matrix.
    pub fn to_dense(&self) -> Mat<f64> {
        let mut dense = Mat::<f64>::zeros(self.rows, self.cols);
        for row in 0..self.rows {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                dense[(row, self.col_idx[idx])] += self.values[idx];
            }
        }
        dense
    }

    /// Largest absolute difference between `A` and `Aᵀ`.
    pub fn asymmetry(&self) -> f64 {
        let mut worst = 0.0_f64;
        for row in 0..self.rows {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                let col = self.col_idx[idx];
                worst = worst.max((self.values[idx] - self.get(col, row)).abs());
            }
        }
        worst
    }
}

/// Trait for sparse symmetric positive-definite solvers.
pub trait SparseSolver {
    /// Factorize the matrix. Fails if the matrix is not SPD.
    fn factorize(&mut self, matrix: &CsrMatrix) -> PliantResult<()>;

    /// Solve Ax = b using the pre-computed factorization.
    /// Returns x in the provided output buffer.
    fn solve(&self, rhs: &[f64], solution: &mut [f64]) -> PliantResult<()>;

    /// Returns true if the solver holds a valid factorization.
    fn is_factorized(&self) -> bool;
}

pub(crate) fn dimension_mismatch(what: &str, got: usize, expected: usize) -> PliantError {
    PliantError::InvalidConfig(format!("{what} length ({got}) != matrix dimension ({expected})"))
}
