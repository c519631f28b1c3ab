use thiserror::Error;

/// MPPI の全エラー
#[derive(Debug, Error)]
pub enum MppiError {
    // 設定エラー
    #[error("sample count must be > 0")]
    InvalidSamples,
    #[error("horizon must be > 0")]
    InvalidHorizon,
    #[error("lambda must be in (0, 1], got {0}")]
    InvalidLambda(f64),
    #[error("gamma must be in (0, 1], got {0}")]
    InvalidGamma(f64),
    #[error("worker count must be >= 1")]
    InvalidWorkers,
    #[error("covariance must be {expected}x{expected}, got {rows}x{cols}")]
    CovarianceShape {
        expected: usize,
        rows: usize,
        cols: usize,
    },
    #[error("covariance is not symmetric")]
    CovarianceNotSymmetric,
    #[error("covariance is not positive definite")]
    CovarianceNotPositiveDefinite,
    #[error("invalid clamp bounds: {0}")]
    InvalidBounds(String),
    #[error("replica reports action dim {actual}, expected {expected}")]
    ActionDimMismatch { expected: usize, actual: usize },
    #[error("action buffer has length {actual}, expected {expected}")]
    ActionLength { expected: usize, actual: usize },
    #[error("mean trajectory must be {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    MeanShape {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },
    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    // 環境側の失敗
    #[error("rollout of sample {sample} failed")]
    Rollout {
        sample: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("non-finite reward in sample {sample} at step {step}")]
    NonFiniteReward { sample: usize, step: usize },
    #[error("non-finite observation at the end of sample {sample}")]
    NonFiniteObservation { sample: usize },

    // 数値的な縮退
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),
}

impl MppiError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidSamples
                | Self::InvalidHorizon
                | Self::InvalidLambda(_)
                | Self::InvalidGamma(_)
                | Self::InvalidWorkers
                | Self::CovarianceShape { .. }
                | Self::CovarianceNotSymmetric
                | Self::CovarianceNotPositiveDefinite
                | Self::InvalidBounds(_)
                | Self::ActionDimMismatch { .. }
                | Self::ActionLength { .. }
                | Self::MeanShape { .. }
                | Self::ThreadPool(_)
        )
    }

    pub fn is_collaborator(&self) -> bool {
        matches!(
            self,
            Self::Rollout { .. } | Self::NonFiniteReward { .. } | Self::NonFiniteObservation { .. }
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::NumericDegeneracy(_))
    }
}

pub type Result<T, E = MppiError> = std::result::Result<T, E>;
