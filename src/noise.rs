use crate::error::{MppiError, Result};
use ndarray::{Array3, Axis};
use rand::prelude::*;
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

// 共分散の対称性判定の相対許容誤差
const SYMMETRY_TOL: f64 = 1e-9;

/// 相関のある正規ノイズの生成器
///
/// 共分散 Σ の Cholesky 因子 L (下三角, Σ = L Lᵀ) を構築時に 1 度だけ計算し、
/// 標準正規乱数 z を L z に変換する。
pub struct Perturbation {
    l: na::DMatrix<f64>,
    rng: Xoshiro256PlusPlus,
}

impl Perturbation {
    pub fn new(covariance: &na::DMatrix<f64>, dim: usize, rng: Xoshiro256PlusPlus) -> Result<Self> {
        let l = cholesky_factor(covariance, dim)?;
        Ok(Self { l, rng })
    }

    pub fn dim(&self) -> usize {
        self.l.nrows()
    }

    pub fn factor(&self) -> &na::DMatrix<f64> {
        &self.l
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    }

    /// (K, H, dim) のバッファを相関ノイズで埋める
    ///
    /// 乱数は (k, t, dim) の順に 1 本のストリームから引くので、同じシードなら結果は同じ。
    pub fn fill(&mut self, noise: &mut Array3<f64>) {
        let dim = self.dim();
        assert_eq!(noise.len_of(Axis(2)), dim, "noise dim mismatch");

        for z in noise.iter_mut() {
            *z = self.rng.sample(StandardNormal);
        }
        for mut row in noise.rows_mut() {
            // 下三角なので下の行から上書きすれば追加のバッファは不要
            for i in (0..dim).rev() {
                let mut acc = 0.0;
                for j in 0..=i {
                    acc += self.l[(i, j)] * row[j];
                }
                row[i] = acc;
            }
        }
    }
}

// 正方・対称・正定値を確認してから分解する
fn cholesky_factor(covariance: &na::DMatrix<f64>, dim: usize) -> Result<na::DMatrix<f64>> {
    let (rows, cols) = covariance.shape();
    if rows != dim || cols != dim {
        return Err(MppiError::CovarianceShape {
            expected: dim,
            rows,
            cols,
        });
    }
    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(MppiError::CovarianceNotPositiveDefinite);
    }
    let scale = covariance.amax().max(1.0);
    if (covariance - covariance.transpose()).amax() > SYMMETRY_TOL * scale {
        return Err(MppiError::CovarianceNotSymmetric);
    }
    na::Cholesky::new(covariance.clone())
        .map(|c| c.l())
        .ok_or(MppiError::CovarianceNotPositiveDefinite)
}
