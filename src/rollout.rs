use crate::env::Environment;
use crate::error::{MppiError, Result};
use ndarray::ArrayView2;

/// 終端価値関数。最終観測から地平線より先の報酬を見積もる
pub type ValueFn = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// ワーカー 1 つ分のレプリカと作業領域
pub struct Worker<E> {
    env: E,
    action: Vec<f64>,
}

impl<E: Environment> Worker<E> {
    pub fn new(env: E) -> Self {
        let action = vec![0.0; env.action_dim()];
        Self { env, action }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// サンプル `sample` の入力列 (H, dim) でシミュレーションし、コストを返す
    ///
    /// cost = -(Σ γ^t r_t + γ^H V(o_H))
    pub fn rollout(
        &mut self,
        sample: usize,
        x: &[f64],
        actions: ArrayView2<f64>,
        gamma: f64,
        value: Option<&ValueFn>,
    ) -> Result<f64> {
        self.env
            .reset_to(x)
            .map_err(|source| MppiError::Rollout { sample, source })?;

        let mut reward = 0.0;
        let mut discount = 1.0;
        for (t, row) in actions.rows().into_iter().enumerate() {
            for (a, v) in self.action.iter_mut().zip(row.iter()) {
                *a = *v;
            }
            self.env
                .step(&self.action)
                .map_err(|source| MppiError::Rollout { sample, source })?;
            let r = self
                .env
                .reward(self.env.state(), &self.action, self.env.observation());
            if !r.is_finite() {
                return Err(MppiError::NonFiniteReward { sample, step: t });
            }
            reward += r * discount;
            discount *= gamma;
        }

        // ループ後の discount は γ^H
        let terminal = match value {
            Some(v) => {
                let o = self.env.observation();
                if o.iter().any(|x| !x.is_finite()) {
                    return Err(MppiError::NonFiniteObservation { sample });
                }
                v(o)
            }
            None => 0.0,
        };
        Ok(-(reward + terminal * discount))
    }
}
