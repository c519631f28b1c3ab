use crate::clamp::ClampBounds;
use crate::error::{MppiError, Result};
use crate::horizon::ReinitFn;
use crate::rollout::ValueFn;

/// MPPI の設定
pub struct MppiConfig {
    pub samples: usize,
    pub horizon: usize,
    // 空なら単位行列
    pub covariance: na::DMatrix<f64>,
    // (0, 1]
    pub lambda: f64,
    // (0, 1]
    pub gamma: f64,
    // None なら環境の制約、それもなければ制約なし
    pub bounds: Option<ClampBounds>,
    pub value_fn: Option<ValueFn>,
    pub reinit: Option<ReinitFn>,
    // None なら CPU のスレッド数
    pub workers: Option<usize>,
    pub seed: Option<u64>,
}

impl Default for MppiConfig {
    fn default() -> Self {
        Self {
            samples: 256,
            horizon: 8,
            covariance: na::DMatrix::zeros(0, 0),
            lambda: 0.5,
            gamma: 1.0,
            bounds: None,
            value_fn: None,
            reinit: None,
            workers: None,
            seed: None,
        }
    }
}

impl MppiConfig {
    pub fn new(samples: usize, horizon: usize) -> Self {
        Self {
            samples,
            horizon,
            ..Default::default()
        }
    }

    pub fn with_covariance(mut self, covariance: na::DMatrix<f64>) -> Self {
        self.covariance = covariance;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_bounds(mut self, bounds: ClampBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_value_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.value_fn = Some(Box::new(f));
        self
    }

    pub fn with_reinit(mut self, reinit: ReinitFn) -> Self {
        self.reinit = Some(reinit);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(MppiError::InvalidSamples);
        }
        if self.horizon == 0 {
            return Err(MppiError::InvalidHorizon);
        }
        // NaN も弾く
        if !(self.lambda > 0.0 && self.lambda <= 1.0) {
            return Err(MppiError::InvalidLambda(self.lambda));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(MppiError::InvalidGamma(self.gamma));
        }
        if self.workers == Some(0) {
            return Err(MppiError::InvalidWorkers);
        }
        Ok(())
    }

    /// 実際に使うワーカー数 (1 以上 K 以下)
    pub fn pool_size(&self) -> usize {
        let n = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        n.clamp(1, self.samples.max(1))
    }
}

impl std::fmt::Debug for MppiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MppiConfig")
            .field("samples", &self.samples)
            .field("horizon", &self.horizon)
            .field("covariance", &self.covariance)
            .field("lambda", &self.lambda)
            .field("gamma", &self.gamma)
            .field("bounds", &self.bounds)
            .field("value_fn", &self.value_fn.is_some())
            .field("reinit", &self.reinit.is_some())
            .field("workers", &self.workers)
            .field("seed", &self.seed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(MppiConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range() {
        let cases = [
            MppiConfig::new(0, 8),
            MppiConfig::new(8, 0),
            MppiConfig::new(8, 8).with_lambda(0.0),
            MppiConfig::new(8, 8).with_lambda(1.5),
            MppiConfig::new(8, 8).with_lambda(f64::NAN),
            MppiConfig::new(8, 8).with_gamma(0.0),
            MppiConfig::new(8, 8).with_gamma(1.01),
            MppiConfig::new(8, 8).with_workers(0),
        ];
        for c in &cases {
            let e = c.validate().unwrap_err();
            assert!(e.is_configuration(), "{c:?}");
        }
    }

    #[test]
    fn boundary_values_are_accepted() {
        let c = MppiConfig::new(1, 1).with_lambda(1.0).with_gamma(1.0);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn pool_size_is_capped_by_samples() {
        assert_eq!(MppiConfig::new(3, 4).with_workers(16).pool_size(), 3);
        assert_eq!(MppiConfig::new(64, 4).with_workers(4).pool_size(), 4);
        assert!(MppiConfig::new(64, 4).pool_size() >= 1);
    }
}
