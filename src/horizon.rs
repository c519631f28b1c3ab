/// 空いた末尾の列を埋める関数。呼び出し時点では直前の末尾の値が入っている
pub type ReinitFn = Box<dyn Fn(&mut [f64]) + Send + Sync>;

pub fn zero_fill() -> ReinitFn {
    Box::new(|tail: &mut [f64]| tail.fill(0.0))
}

// 直前の末尾の入力をそのまま使う
pub fn hold_last() -> ReinitFn {
    Box::new(|_: &mut [f64]| {})
}

/// 平均入力列 (dim × H) を持ち、1 ステップずつずらして次の計画の初期値にする
pub struct RecedingHorizon {
    mean: na::DMatrix<f64>,
    reinit: ReinitFn,
}

impl RecedingHorizon {
    pub fn new(dim: usize, horizon: usize, reinit: ReinitFn) -> Self {
        Self {
            mean: na::DMatrix::zeros(dim, horizon),
            reinit,
        }
    }

    pub fn mean(&self) -> &na::DMatrix<f64> {
        &self.mean
    }

    pub fn mean_mut(&mut self) -> &mut na::DMatrix<f64> {
        &mut self.mean
    }

    pub fn reset(&mut self) {
        self.mean.fill(0.0);
    }

    // 先頭の入力
    pub fn first(&self, out: &mut [f64]) {
        out.copy_from_slice(&self.mean.as_slice()[..self.mean.nrows()]);
    }

    pub fn shift(&mut self) {
        let dim = self.mean.nrows();
        let data = self.mean.as_mut_slice();
        data.copy_within(dim.., 0);
        let tail = data.len() - dim;
        (self.reinit)(&mut data[tail..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(dim: usize, h: usize, reinit: ReinitFn) -> RecedingHorizon {
        let mut buf = RecedingHorizon::new(dim, h, reinit);
        for t in 0..h {
            for d in 0..dim {
                buf.mean_mut()[(d, t)] = (10 * (t + 1) + d) as f64;
            }
        }
        buf
    }

    #[test]
    fn shift_advances_window() {
        let mut buf = ramp(2, 5, zero_fill());
        let mut first = [0.0; 2];
        for n in 1..=3 {
            buf.first(&mut first);
            assert_eq!(first, [(10 * n) as f64, (10 * n + 1) as f64]);
            buf.shift();
        }
        // 3 回ずらした後: 列 0,1 は元の列 3,4、残りは 0
        assert_eq!(&buf.mean().as_slice()[..4], &[40.0, 41.0, 50.0, 51.0]);
        for t in 2..5 {
            assert!(buf.mean().column(t).iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    fn hold_last_repeats_tail() {
        let mut buf = ramp(1, 3, hold_last());
        buf.shift();
        buf.shift();
        assert_eq!(buf.mean().as_slice(), &[30.0, 30.0, 30.0]);
    }

    #[test]
    fn custom_policy_and_reset() {
        let mut buf = ramp(1, 2, Box::new(|tail: &mut [f64]| tail[0] *= 0.5));
        buf.shift();
        assert_eq!(buf.mean().as_slice(), &[20.0, 10.0]);
        buf.reset();
        assert!(buf.mean().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn horizon_of_one() {
        let mut buf = ramp(2, 1, zero_fill());
        buf.shift();
        assert_eq!(buf.mean().as_slice(), &[0.0, 0.0]);
    }
}
