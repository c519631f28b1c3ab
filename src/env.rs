/// ロールアウトに使うシミュレーション環境
///
/// プランナはワーカーごとに 1 つずつレプリカを持ち、レプリカを他のワーカーと共有しない。
pub trait Environment: Send {
    fn action_dim(&self) -> usize;

    // (lower, upper)
    fn action_bounds(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        None
    }

    fn reset_to(&mut self, state: &[f64]) -> anyhow::Result<()>;

    fn step(&mut self, action: &[f64]) -> anyhow::Result<()>;

    fn observation(&self) -> &[f64];

    fn state(&self) -> &[f64];

    fn reward(&self, state: &[f64], action: &[f64], observation: &[f64]) -> f64;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Environment;

    // x_{t+1} = x_t + u_t, 報酬は -|u|
    #[derive(Debug, Clone)]
    pub struct Integrator {
        pub dim: usize,
        pub x: Vec<f64>,
        pub bounds: Option<(Vec<f64>, Vec<f64>)>,
    }

    impl Integrator {
        pub fn new(dim: usize) -> Self {
            Self {
                dim,
                x: vec![0.0; dim],
                bounds: None,
            }
        }
    }

    impl Environment for Integrator {
        fn action_dim(&self) -> usize {
            self.dim
        }
        fn action_bounds(&self) -> Option<(Vec<f64>, Vec<f64>)> {
            self.bounds.clone()
        }
        fn reset_to(&mut self, state: &[f64]) -> anyhow::Result<()> {
            anyhow::ensure!(state.len() == self.dim, "state length {}", state.len());
            self.x.copy_from_slice(state);
            Ok(())
        }
        fn step(&mut self, action: &[f64]) -> anyhow::Result<()> {
            for (x, u) in self.x.iter_mut().zip(action) {
                *x += u;
            }
            Ok(())
        }
        fn observation(&self) -> &[f64] {
            &self.x
        }
        fn state(&self) -> &[f64] {
            &self.x
        }
        fn reward(&self, _state: &[f64], action: &[f64], _observation: &[f64]) -> f64 {
            -action.iter().map(|u| u.abs()).sum::<f64>()
        }
    }
}
