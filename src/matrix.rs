use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::error::HarnessError;

/// a rows x cols grid of signed integers, row major.
///
/// operands on the wire are 8 bit and results are 16 bit, so the host
/// side keeps everything as i16 and lets the codec decide the packed
/// width. the shape is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<i16>,
}

impl Matrix {
    /// an all zero matrix
    pub fn new(rows: usize, cols: usize) -> Result<Self, HarnessError> {
        if rows == 0 || cols == 0 {
            return Err(HarnessError::InvalidShape { rows, cols });
        }
        Ok(Matrix {
            rows,
            cols,
            data: vec![0; rows * cols],
        })
    }

    /// build from explicit row vectors, every row must have the same length
    pub fn from_rows(values: Vec<Vec<i16>>) -> Result<Self, HarnessError> {
        let rows = values.len();
        let cols = values.first().map_or(0, |row| row.len());
        let mut matrix = Self::new(rows, cols)?;
        for (i, row) in values.iter().enumerate() {
            if row.len() != cols {
                return Err(HarnessError::InvalidShape {
                    rows,
                    cols: row.len(),
                });
            }
            for (j, &value) in row.iter().enumerate() {
                matrix.data[i * cols + j] = value;
            }
        }
        Ok(matrix)
    }

    pub fn identity(order: usize) -> Result<Self, HarnessError> {
        let mut matrix = Self::new(order, order)?;
        for i in 0..order {
            matrix.data[i * order + i] = 1;
        }
        Ok(matrix)
    }

    /// random int8 operand matrix. the value range matches the original
    /// bench's randint(-128, 127): the high end is exclusive.
    pub fn random_int8<R: Rng>(
        rows: usize,
        cols: usize,
        rng: &mut R,
    ) -> Result<Self, HarnessError> {
        let mut matrix = Self::new(rows, cols)?;
        for value in matrix.data.iter_mut() {
            *value = rng.gen_range(-128i16..127);
        }
        Ok(matrix)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> i16 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: i16) {
        self.data[row * self.cols + col] = value;
    }

    /// the elements in row major flatten order, the order the codec packs
    pub fn flat(&self) -> &[i16] {
        &self.data
    }

    /// host side reference multiply, i16 accumulation with two's
    /// complement wrapping like the datapath
    pub fn multiply(&self, rhs: &Matrix) -> Result<Matrix, HarnessError> {
        if self.cols != rhs.rows {
            return Err(HarnessError::InvalidShape {
                rows: rhs.rows,
                cols: rhs.cols,
            });
        }
        let mut out = Matrix::new(self.rows, rhs.cols)?;
        for i in 0..self.rows {
            for j in 0..rhs.cols {
                let mut acc: i16 = 0;
                for k in 0..self.cols {
                    acc = acc.wrapping_add(self.get(i, k).wrapping_mul(rhs.get(k, j)));
                }
                out.set(i, j, acc);
            }
        }
        Ok(out)
    }

    /// tolerance equality with the assert_allclose rule:
    /// |actual - desired| <= atol + rtol * |desired|
    pub fn allclose(&self, desired: &Matrix, rtol: f64, atol: f64) -> bool {
        if self.rows != desired.rows || self.cols != desired.cols {
            return false;
        }
        self.data
            .iter()
            .zip(desired.data.iter())
            .all(|(&actual, &want)| {
                let actual = f64::from(actual);
                let want = f64::from(want);
                (actual - want).abs() <= atol + rtol * want.abs()
            })
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            for col in 0..self.cols {
                write!(f, "{:>7}", self.get(row, col))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_zero_shape_rejected() {
        assert_eq!(
            Matrix::new(0, 4),
            Err(HarnessError::InvalidShape { rows: 0, cols: 4 })
        );
        assert_eq!(
            Matrix::new(4, 0),
            Err(HarnessError::InvalidShape { rows: 4, cols: 0 })
        );
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = Matrix::from_rows(vec![vec![1, 2], vec![3]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_identity_multiply() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Matrix::random_int8(4, 4, &mut rng).unwrap();
        let eye = Matrix::identity(4).unwrap();
        assert_eq!(a.multiply(&eye).unwrap(), a);
    }

    #[test]
    fn test_multiply_known_values() {
        let a = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
        let b = Matrix::from_rows(vec![vec![5, 6], vec![7, 8]]).unwrap();
        let c = a.multiply(&b).unwrap();
        assert_eq!(c, Matrix::from_rows(vec![vec![19, 22], vec![43, 50]]).unwrap());
    }

    #[test]
    fn test_multiply_wraps_on_overflow() {
        let a = Matrix::from_rows(vec![vec![i16::MAX, 1]]).unwrap();
        let b = Matrix::from_rows(vec![vec![1], vec![1]]).unwrap();
        let c = a.multiply(&b).unwrap();
        assert_eq!(c.get(0, 0), i16::MAX.wrapping_add(1));
    }

    #[test]
    fn test_allclose_boundary() {
        let a = Matrix::from_rows(vec![vec![100]]).unwrap();
        let b = Matrix::from_rows(vec![vec![90]]).unwrap();
        // |100 - 90| = 10 <= 10 + 0.1 * 90
        assert!(a.allclose(&b, 0.1, 10.0));
        let c = Matrix::from_rows(vec![vec![120]]).unwrap();
        // |120 - 90| = 30 > 19
        assert!(!c.allclose(&b, 0.1, 10.0));
    }

    #[test]
    fn test_random_int8_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let m = Matrix::random_int8(8, 8, &mut rng).unwrap();
        assert!(m.flat().iter().all(|&v| (-128..127).contains(&v)));
    }
}
