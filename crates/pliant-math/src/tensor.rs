//! Fourth-order tensors acting on 3×3 matrices.
//!
//! A tangent ∂P/∂F is stored as a 9×9 matrix over the column-major
//! vectorization of F, i.e. `vec(F)[3·j + i] = F[i][j]`. This matches
//! `glam::DMat3::to_cols_array`.

use glam::DMat3;

/// Index of matrix entry (row, col) in the column-major vectorization.
#[inline]
pub fn vec_index(row: usize, col: usize) -> usize {
    3 * col + row
}

/// Column-major vectorization of a 3×3 matrix.
#[inline]
pub fn vectorize(m: &DMat3) -> [f64; 9] {
    m.to_cols_array()
}

/// Inverse of [`vectorize`].
#[inline]
pub fn unvectorize(v: &[f64; 9]) -> DMat3 {
    DMat3::from_cols_array(v)
}

/// The matrix with a single unit entry at `vec_index`.
pub fn unit_matrix(index: usize) -> DMat3 {
    let mut v = [0.0; 9];
    v[index] = 1.0;
    unvectorize(&v)
}

/// A 9×9 fourth-order tensor (row = output component, column = input).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tensor9 {
    pub data: [[f64; 9]; 9],
}

impl Tensor9 {
    pub const ZERO: Self = Self {
        data: [[0.0; 9]; 9],
    };

    /// Builds the tensor column by column: column k is the response to
    /// the unit perturbation of vec(F) entry k.
    pub fn from_columns<Fun>(mut response: Fun) -> Self
    where
        Fun: FnMut(&DMat3) -> DMat3,
    {
        let mut t = Self::ZERO;
        for k in 0..9 {
            let column = vectorize(&response(&unit_matrix(k)));
            for (row, value) in column.iter().enumerate() {
                t.data[row][k] = *value;
            }
        }
        t
    }

    /// Contracts with a perturbation: returns dP = T : dF.
    pub fn contract(&self, df: &DMat3) -> DMat3 {
        let x = vectorize(df);
        let mut out = [0.0; 9];
        for (row, value) in out.iter_mut().enumerate() {
            *value = self.data[row].iter().zip(&x).map(|(a, b)| a * b).sum();
        }
        unvectorize(&out)
    }

    /// Largest absolute entry of `self − selfᵀ` (major symmetry check).
    pub fn asymmetry(&self) -> f64 {
        let mut worst = 0.0_f64;
        for i in 0..9 {
            for j in 0..9 {
                worst = worst.max((self.data[i][j] - self.data[j][i]).abs());
            }
        }
        worst
    }
}

impl std::ops::Add for Tensor9 {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        for i in 0..9 {
            for j in 0..9 {
                self.data[i][j] += rhs.data[i][j];
            }
        }
        self
    }
}

impl std::ops::Mul<f64> for Tensor9 {
    type Output = Self;

    fn mul(mut self, rhs: f64) -> Self {
        for row in &mut self.data {
            for v in row.iter_mut() {
                *v *= rhs;
            }
        }
        self
    }
}
