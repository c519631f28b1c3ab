use crate::error::{MppiError, Result};
use ndarray::parallel::prelude::*;
use ndarray::{Array3, Axis};

/// 入力の箱型制約。0 行目が下限、1 行目が上限
#[derive(Debug, Clone, PartialEq)]
pub struct ClampBounds {
    m: na::Matrix2xX<f64>,
}

impl ClampBounds {
    pub fn new(lower: &[f64], upper: &[f64]) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(MppiError::InvalidBounds(format!(
                "lower has {} entries, upper has {}",
                lower.len(),
                upper.len()
            )));
        }
        for (i, (lo, hi)) in lower.iter().zip(upper).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(MppiError::InvalidBounds(format!(
                    "dim {i}: [{lo}, {hi}]"
                )));
            }
        }
        let m = na::Matrix2xX::from_fn(lower.len(), |r, c| if r == 0 { lower[c] } else { upper[c] });
        Ok(Self { m })
    }

    // 制約なし (型の最小値・最大値)
    pub fn unbounded(dim: usize) -> Self {
        let m = na::Matrix2xX::from_fn(dim, |r, _| if r == 0 { f64::MIN } else { f64::MAX });
        Self { m }
    }

    pub fn dim(&self) -> usize {
        self.m.ncols()
    }

    pub fn lower(&self, d: usize) -> f64 {
        self.m[(0, d)]
    }

    pub fn upper(&self, d: usize) -> f64 {
        self.m[(1, d)]
    }

    pub fn contains(&self, action: &[f64]) -> bool {
        action.len() == self.dim()
            && action
                .iter()
                .enumerate()
                .all(|(d, a)| *a >= self.lower(d) && *a <= self.upper(d))
    }

    pub fn apply_row(&self, action: &mut [f64]) {
        for (d, a) in action.iter_mut().enumerate() {
            *a = a.clamp(self.m[(0, d)], self.m[(1, d)]);
        }
    }

    /// (K, H, dim) のバッチ全体をクランプする
    pub fn apply(&self, batch: &mut Array3<f64>) {
        assert_eq!(batch.len_of(Axis(2)), self.dim(), "clamp dim mismatch");
        batch
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut slab| {
                for mut row in slab.rows_mut() {
                    for (d, a) in row.iter_mut().enumerate() {
                        *a = a.clamp(self.m[(0, d)], self.m[(1, d)]);
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        assert!(ClampBounds::new(&[1.0], &[-1.0]).is_err());
        assert!(ClampBounds::new(&[f64::NAN], &[1.0]).is_err());
        assert!(ClampBounds::new(&[0.0, 0.0], &[1.0]).is_err());
    }

    #[test]
    fn clamps_per_dimension() {
        let b = ClampBounds::new(&[-1.0, 0.0], &[1.0, 0.5]).unwrap();
        let mut batch = Array3::from_shape_fn((3, 4, 2), |(k, t, d)| {
            (k as f64 - 1.0) * (t as f64 + 1.0) * if d == 0 { 1.0 } else { -1.0 }
        });
        b.apply(&mut batch);
        for row in batch.rows() {
            assert!(b.contains(row.as_slice().unwrap()));
        }
        assert_eq!(batch[[2, 3, 0]], 1.0);
        assert_eq!(batch[[0, 3, 1]], 0.5);
        assert_eq!(batch[[2, 3, 1]], 0.0);
        assert_eq!(batch[[1, 0, 0]], 0.0);
    }

    #[test]
    fn unbounded_is_noop() {
        let b = ClampBounds::unbounded(2);
        let orig = Array3::from_shape_fn((2, 3, 2), |(k, t, d)| {
            1e300 * (k as f64 - 0.5) + t as f64 - d as f64 * 1e-12
        });
        let mut batch = orig.clone();
        b.apply(&mut batch);
        assert_eq!(batch, orig);

        let mut row = [-3.5, 7.25];
        b.apply_row(&mut row);
        assert_eq!(row, [-3.5, 7.25]);
    }
}
