use crate::clamp::ClampBounds;
use crate::combine;
use crate::config::MppiConfig;
use crate::dispatch;
use crate::env::Environment;
use crate::error::{MppiError, Result};
use crate::horizon::{self, RecedingHorizon};
use crate::noise::Perturbation;
use crate::rollout::{ValueFn, Worker};
use ndarray::parallel::prelude::*;
use ndarray::{Array3, ArrayView3, Axis};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// 1 回の計画の統計 (有限のコストのみ)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanStats {
    pub min_cost: f64,
    pub max_cost: f64,
    pub effective_samples: f64,
    pub workers: usize,
}

// MPPI (Model Predictive Path Integral) controller
pub struct Mppi<E> {
    dim: usize,
    samples: usize,
    horizon: usize,
    lambda: f64,
    gamma: f64,
    bounds: ClampBounds,
    value_fn: Option<ValueFn>,
    noise: Perturbation,
    plan: RecedingHorizon,
    // (K, H, dim)。ノイズを引いた後、平均を足してクランプする
    batch: Array3<f64>,
    costs: Vec<f64>,
    weights: Vec<f64>,
    next: na::DMatrix<f64>,
    workers: Vec<Worker<E>>,
    pool: rayon::ThreadPool,
    steps: u64,
}

impl<E: Environment> Mppi<E> {
    /// `factory` でワーカーごとのレプリカを作る
    pub fn new<F>(config: MppiConfig, mut factory: F) -> Result<Self>
    where
        F: FnMut() -> E,
    {
        config.validate()?;
        let pool_size = config.pool_size();

        let workers: Vec<Worker<E>> = (0..pool_size).map(|_| Worker::new(factory())).collect();
        let dim = workers[0].env().action_dim();
        for w in &workers {
            let actual = w.env().action_dim();
            if actual != dim {
                return Err(MppiError::ActionDimMismatch {
                    expected: dim,
                    actual,
                });
            }
        }

        let bounds = match config.bounds {
            Some(b) => b,
            None => match workers[0].env().action_bounds() {
                Some((lo, hi)) => ClampBounds::new(&lo, &hi)?,
                None => ClampBounds::unbounded(dim),
            },
        };
        if bounds.dim() != dim {
            return Err(MppiError::InvalidBounds(format!(
                "bounds have {} dims, action has {dim}",
                bounds.dim()
            )));
        }

        let covariance = if config.covariance.is_empty() {
            na::DMatrix::identity(dim, dim)
        } else {
            config.covariance
        };
        let rng = match config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let noise = Perturbation::new(&covariance, dim, rng)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(pool_size)
            .build()?;

        let (k, h) = (config.samples, config.horizon);
        log::info!("mppi: K={k}, H={h}, action dim={dim}, workers={pool_size}");

        Ok(Self {
            dim,
            samples: k,
            horizon: h,
            lambda: config.lambda,
            gamma: config.gamma,
            bounds,
            value_fn: config.value_fn,
            noise,
            plan: RecedingHorizon::new(dim, h, config.reinit.unwrap_or_else(horizon::zero_fill)),
            batch: Array3::zeros((k, h, dim)),
            costs: vec![0.0; k],
            weights: vec![0.0; k],
            next: na::DMatrix::zeros(dim, h),
            workers,
            pool,
            steps: 0,
        })
    }

    pub fn compute(&mut self, x: &[f64], action: &mut [f64]) -> Result<PlanStats> {
        self.compute_with_workers(x, action, self.workers.len())
    }

    /// ワーカー数を指定して計画する。`workers` は [1, min(プール, K)] に丸める
    pub fn compute_with_workers(
        &mut self,
        x: &[f64],
        action: &mut [f64],
        workers: usize,
    ) -> Result<PlanStats> {
        if action.len() != self.dim {
            return Err(MppiError::ActionLength {
                expected: self.dim,
                actual: action.len(),
            });
        }
        let workers = workers.clamp(1, self.workers.len());

        self.sample();

        // 並列処理でコストの計算を行う
        dispatch::dispatch(
            &self.pool,
            &mut self.workers[..workers],
            x,
            &self.batch,
            &mut self.costs,
            self.gamma,
            self.value_fn.as_ref(),
        )?;

        // 正規化項
        let excluded = combine::softmax_weights(&self.costs, self.lambda, &mut self.weights)?;
        if excluded > 0 {
            log::warn!(
                "mppi step {}: {excluded}/{} samples have non-finite cost",
                self.steps,
                self.samples
            );
        }
        // 重み付け平均。不正値なら平均列は更新しない
        combine::weighted_mean(&self.weights, &self.batch, &mut self.next)?;
        // 丸め誤差で制約をはみ出さないよう平均もクランプする
        for u_t in self.next.as_mut_slice().chunks_mut(self.dim) {
            self.bounds.apply_row(u_t);
        }
        std::mem::swap(self.plan.mean_mut(), &mut self.next);

        self.plan.first(action);
        self.plan.shift();

        let stats = self.stats(workers);
        log::debug!(
            "mppi step {}: min cost {:.4}, ess {:.1}",
            self.steps,
            stats.min_cost,
            stats.effective_samples
        );
        self.steps += 1;
        Ok(stats)
    }

    // ノイズ + 平均 -> クランプ
    fn sample(&mut self) {
        self.noise.fill(&mut self.batch);
        let mean = self.plan.mean().as_slice();
        let bounds = &self.bounds;
        let batch = &mut self.batch;
        self.pool.install(|| {
            batch.axis_iter_mut(Axis(0)).into_par_iter().for_each(|mut slab| {
                for (v, m) in slab.iter_mut().zip(mean) {
                    *v += m;
                }
            });
            bounds.apply(batch);
        });
    }

    fn stats(&self, workers: usize) -> PlanStats {
        let (min_cost, max_cost) = self
            .costs
            .iter()
            .filter(|c| c.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(*c), hi.max(*c))
            });
        PlanStats {
            min_cost,
            max_cost,
            effective_samples: combine::effective_samples(&self.weights),
            workers: dispatch::active_workers(self.samples, workers),
        }
    }

    // エピソードの区切り
    pub fn reset(&mut self) {
        self.plan.reset();
        self.steps = 0;
    }

    pub fn reseed(&mut self, seed: u64) {
        self.noise.reseed(seed);
    }

    /// 外部から平均入力列 (dim × H) を与える
    pub fn set_mean_trajectory(&mut self, mean: &na::DMatrix<f64>) -> Result<()> {
        let (rows, cols) = mean.shape();
        if (rows, cols) != (self.dim, self.horizon) {
            return Err(MppiError::MeanShape {
                expected_rows: self.dim,
                expected_cols: self.horizon,
                rows,
                cols,
            });
        }
        self.plan.mean_mut().copy_from(mean);
        Ok(())
    }

    pub fn mean_trajectory(&self) -> &na::DMatrix<f64> {
        self.plan.mean()
    }

    // (K, H, dim)
    pub fn perturbed_actions(&self) -> ArrayView3<f64> {
        self.batch.view()
    }

    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bounds(&self) -> &ClampBounds {
        &self.bounds
    }

    pub fn action_dim(&self) -> usize {
        self.dim
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}
