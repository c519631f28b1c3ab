use crate::error::{MppiError, Result};
use ndarray::{Array3, Axis};

/// コストから正規化済みのソフトマックス重みを計算して `weights` に書く
///
/// w_k = exp((β - c_k) / λ) / η,  β = min c_k
///
/// 非有限のコストは重み 0 とする。戻り値は除外したサンプル数。
pub fn softmax_weights(costs: &[f64], lambda: f64, weights: &mut [f64]) -> Result<usize> {
    assert_eq!(costs.len(), weights.len(), "cost/weight length mismatch");

    let beta = costs
        .iter()
        .copied()
        .filter(|c| c.is_finite())
        .fold(f64::INFINITY, f64::min);
    if !beta.is_finite() {
        return Err(MppiError::NumericDegeneracy(
            "all trajectory costs are non-finite".into(),
        ));
    }

    let mut excluded = 0;
    let mut eta = 0.0;
    for (w, c) in weights.iter_mut().zip(costs) {
        *w = if c.is_finite() {
            ((beta - c) / lambda).exp()
        } else {
            excluded += 1;
            0.0
        };
        eta += *w;
    }
    // 最小コストの項が exp(0) = 1 なので η >= 1
    if !(eta.is_finite() && eta > 0.0) {
        return Err(MppiError::NumericDegeneracy(format!(
            "softmax normalizer is {eta}"
        )));
    }
    for w in weights.iter_mut() {
        *w /= eta;
    }
    Ok(excluded)
}

/// 重み付き平均 Σ w_k v_k を `out` (dim × H, 列優先) に書く
///
/// `batch` は平均込み・クランプ済みの入力列なので、結果はそのまま新しい平均になる。
pub fn weighted_mean(weights: &[f64], batch: &Array3<f64>, out: &mut na::DMatrix<f64>) -> Result<()> {
    let (_, h, dim) = batch.dim();
    assert_eq!(weights.len(), batch.len_of(Axis(0)), "weight/batch length mismatch");
    assert_eq!(out.shape(), (dim, h), "mean shape mismatch");

    out.fill(0.0);
    // (H, dim) 行優先と (dim, H) 列優先はメモリ上の並びが同じ
    let m = out.as_mut_slice();
    for (w, slab) in weights.iter().zip(batch.outer_iter()) {
        if *w == 0.0 {
            continue;
        }
        for (acc, v) in m.iter_mut().zip(slab.iter()) {
            *acc += w * v;
        }
    }
    if m.iter().any(|v| !v.is_finite()) {
        return Err(MppiError::NumericDegeneracy(
            "combined control sequence is non-finite".into(),
        ));
    }
    Ok(())
}

/// 有効サンプル数 1 / Σ w²
pub fn effective_samples(weights: &[f64]) -> f64 {
    let s: f64 = weights.iter().map(|w| w * w).sum();
    if s > 0.0 {
        1.0 / s
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn weights_are_normalized() {
        let costs = [3.0, 1.0, 2.5, 1e3, 0.2];
        let mut w = [0.0; 5];
        assert_eq!(softmax_weights(&costs, 0.3, &mut w).unwrap(), 0);
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(w.iter().all(|w| *w >= 0.0));
        // 最小コストが最大重み
        let best = w.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(best, w[4]);
    }

    #[test]
    fn equal_costs_give_uniform_weights() {
        let costs = [1e6; 8];
        let mut w = [0.0; 8];
        softmax_weights(&costs, 1e-3, &mut w).unwrap();
        for w in w {
            assert_abs_diff_eq!(w, 1.0 / 8.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn large_costs_do_not_overflow() {
        let costs = [1e300, 1e300 + 1e285, -1e300];
        let mut w = [0.0; 3];
        softmax_weights(&costs, 0.01, &mut w).unwrap();
        assert_abs_diff_eq!(w[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_costs_are_excluded() {
        let costs = [f64::INFINITY, 2.0, f64::NAN, 2.0];
        let mut w = [1.0; 4];
        assert_eq!(softmax_weights(&costs, 0.5, &mut w).unwrap(), 2);
        assert_eq!(w, [0.0, 0.5, 0.0, 0.5]);
    }

    #[test]
    fn all_non_finite_is_degenerate() {
        let costs = [f64::INFINITY, f64::NAN];
        let mut w = [0.0; 2];
        let e = softmax_weights(&costs, 0.5, &mut w).unwrap_err();
        assert!(e.is_numeric());
    }

    #[test]
    fn mean_of_clamped_samples() {
        // K=2, H=3, dim=2
        let batch = Array3::from_shape_fn((2, 3, 2), |(k, t, d)| {
            if k == 0 {
                (t * 2 + d) as f64
            } else {
                -1.0
            }
        });
        let mut out = na::DMatrix::zeros(2, 3);
        weighted_mean(&[0.25, 0.75], &batch, &mut out).unwrap();
        for t in 0..3 {
            for d in 0..2 {
                let expect = 0.25 * (t * 2 + d) as f64 - 0.75;
                assert_relative_eq!(out[(d, t)], expect);
            }
        }
    }

    #[test]
    fn effective_sample_count() {
        assert_relative_eq!(effective_samples(&[0.25; 4]), 4.0);
        assert_relative_eq!(effective_samples(&[1.0, 0.0, 0.0]), 1.0);
    }
}
