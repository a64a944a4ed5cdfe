//! Dense row-major matrices for batched states and actions.
//!
//! Row `i` is slot `i` of the batch. The flat layout is exactly the
//! slot-major order used on the wire, so conversion is a move.

use crate::error::{GymwireError, Result};

/// Row-major `f32` matrix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

/// One state vector per slot.
pub type StateMatrix = Matrix;

/// One action vector per slot.
pub type ActionMatrix = Matrix;

impl Matrix {
    /// All-zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wrap a flat slot-major buffer.
    pub fn from_flat(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(GymwireError::ShapeMismatch {
                expected_rows: rows,
                expected_cols: cols,
                rows: if cols == 0 { 0 } else { data.len() / cols },
                cols,
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from one `Vec` per row. Ragged input is a shape error.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let n_rows = rows.len();
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_rows * cols);
        for row in rows {
            if row.len() != cols {
                return Err(GymwireError::ShapeMismatch {
                    expected_rows: n_rows,
                    expected_cols: cols,
                    rows: n_rows,
                    cols: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            rows: n_rows,
            cols,
            data,
        })
    }

    /// Build by evaluating `f(row, col)` for every cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Borrow row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    pub fn row(&self, i: usize) -> &[f32] {
        assert!(i < self.rows, "row {} out of range for {} rows", i, self.rows);
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Mutably borrow row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        assert!(i < self.rows, "row {} out of range for {} rows", i, self.rows);
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Cell at `(row, col)`, if in range.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    /// Iterate rows in slot order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.rows).map(move |i| &self.data[i * self.cols..(i + 1) * self.cols])
    }

    /// Flat slot-major view.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Take the flat slot-major buffer.
    #[inline]
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Copy out as one `Vec` per row.
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.iter_rows().map(<[f32]>::to_vec).collect()
    }

    /// Check the shape, reporting a [`GymwireError::ShapeMismatch`] otherwise.
    pub fn expect_shape(&self, rows: usize, cols: usize) -> Result<()> {
        if self.rows == rows && self.cols == cols {
            Ok(())
        } else {
            Err(GymwireError::ShapeMismatch {
                expected_rows: rows,
                expected_cols: cols,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }
}

/// Results of one batched step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepBatch {
    /// Next state per slot.
    pub states: StateMatrix,
    /// Reward per slot.
    pub rewards: Vec<f32>,
    /// Done flag per slot.
    pub dones: Vec<bool>,
}

impl StepBatch {
    /// Number of slots.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.rewards.len()
    }

    /// Whether every slot reported done.
    pub fn all_done(&self) -> bool {
        self.dones.iter().all(|&d| d)
    }

    /// Whether any slot reported done.
    pub fn any_done(&self) -> bool {
        self.dones.iter().any(|&d| d)
    }

    /// Batch-level termination: slot 0 is done and every slot agrees.
    ///
    /// Slots cannot restart independently; when this holds the caller is
    /// expected to issue a fresh reset. Mixed flags mean the batch keeps
    /// running.
    pub fn is_finished(&self) -> bool {
        match self.dones.first() {
            Some(&first) => first && self.dones.iter().all(|&d| d == first),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat_checks_length() {
        let m = Matrix::from_flat(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);

        let err = Matrix::from_flat(2, 3, vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, GymwireError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let m = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0]);

        let err = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            GymwireError::ShapeMismatch {
                expected_cols: 2,
                cols: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_from_fn_and_get() {
        let m = Matrix::from_fn(2, 2, |r, c| (r * 10 + c) as f32);
        assert_eq!(m.get(1, 1), Some(11.0));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.to_rows(), vec![vec![0.0, 1.0], vec![10.0, 11.0]]);
    }

    #[test]
    fn test_row_mut_and_iter_rows() {
        let mut m = Matrix::zeros(3, 1);
        m.row_mut(2)[0] = 7.0;
        let rows: Vec<&[f32]> = m.iter_rows().collect();
        assert_eq!(rows, vec![&[0.0][..], &[0.0][..], &[7.0][..]]);
    }

    #[test]
    fn test_expect_shape() {
        let m = Matrix::zeros(2, 2);
        assert!(m.expect_shape(2, 2).is_ok());
        assert!(matches!(
            m.expect_shape(3, 2),
            Err(GymwireError::ShapeMismatch {
                expected_rows: 3,
                rows: 2,
                ..
            })
        ));
    }

    fn batch(dones: Vec<bool>) -> StepBatch {
        StepBatch {
            states: Matrix::zeros(dones.len(), 1),
            rewards: vec![0.0; dones.len()],
            dones,
        }
    }

    #[test]
    fn test_is_finished_needs_slot_zero_and_agreement() {
        assert!(batch(vec![true, true]).is_finished());
        assert!(!batch(vec![false, false]).is_finished());
        assert!(!batch(vec![true, false]).is_finished());
        assert!(!batch(vec![false, true]).is_finished());
        assert!(!batch(vec![]).is_finished());
    }

    #[test]
    fn test_any_and_all_done() {
        let b = batch(vec![false, true]);
        assert!(b.any_done());
        assert!(!b.all_done());
        assert_eq!(b.batch_size(), 2);
    }
}
