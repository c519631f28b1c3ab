extern crate nalgebra as na;
use anyhow::{Context, Result};
use mppi::{ClampBounds, Environment, Mppi, MppiConfig};

// ref: https://zenn.dev/teruyamato0731/scraps/bc2b2b7c96bd07
// cargo run --example mppi4 --release

// 予測ホライゾン
const T: f64 = 0.8;
const N: usize = 8;
const DT: f64 = T / N as f64;

// サンプル数
const K: usize = 1e5 as usize;
const LAMBDA: f64 = 0.5;
const GAMMA: f64 = 0.98;
const R: f64 = 5.0;

// 制約
const LIMIT: (f64, f64) = (-20.0, 20.0);

// 系ダイナミクスを記述
const M1: f64 = 150e-3;
const R_W: f64 = 50e-3;
const M2: f64 = 2.3 - 2.0 * M1 + 2.0;
const L: f64 = 0.2474; // 重心までの距離
const J1: f64 = M1 * R_W * R_W;
const J2: f64 = 0.5;
const G: f64 = 9.81;
const KT: f64 = 0.15; // m2006
const D: f64 = (M1 + M2 + J1 / R_W * R_W) * (M2 * L * L + J2) - M2 * M2 * L * L;

fn dynamics(state: &na::Vector4<f64>, u: f64) -> na::Vector4<f64> {
    let mut x = *state;
    x[3] += ((M1 + M2 + J1 / R_W * R_W) / D * M2 * G * L * x[2] - M2 * L / D / R_W * KT * u) * DT;
    x[2] += x[3] * DT;
    x[1] += (-M2 * M2 * G * L * L / D * x[2] + (M2 * L * L + J2) / D / R_W * KT * u) * DT;
    x[0] += x[1] * DT;
    x
}

fn cost(x: &na::Vector4<f64>) -> f64 {
    let term1 = 5.0 * x[0].clamp(-7.0, 7.0).powi(2);
    let term2 = 9.0 * (x[1] + x[0].clamp(-4.0, 4.0)).clamp(-5.0, 5.0).powi(2);
    let term3 = 5.0 * x[2].powi(2);
    let term4 = 1.0 * x[3].powi(2);
    term1 + term2 + term3 + term4
}

// 倒立振子 [x, dx, θ, dθ]
#[derive(Debug, Clone)]
struct Pendulum {
    x: na::Vector4<f64>,
}

impl Pendulum {
    fn new() -> Self {
        Self {
            x: na::Vector4::zeros(),
        }
    }
}

impl Environment for Pendulum {
    fn action_dim(&self) -> usize {
        1
    }

    fn action_bounds(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        Some((vec![LIMIT.0], vec![LIMIT.1]))
    }

    fn reset_to(&mut self, state: &[f64]) -> Result<()> {
        anyhow::ensure!(state.len() == 4, "state must have 4 elements");
        self.x.copy_from_slice(state);
        Ok(())
    }

    fn step(&mut self, action: &[f64]) -> Result<()> {
        self.x = dynamics(&self.x, action[0]);
        Ok(())
    }

    fn observation(&self) -> &[f64] {
        self.x.as_slice()
    }

    fn state(&self) -> &[f64] {
        self.x.as_slice()
    }

    fn reward(&self, state: &[f64], _action: &[f64], _observation: &[f64]) -> f64 {
        -cost(&na::Vector4::from_column_slice(state))
    }
}

fn main() -> Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()?;

    let config = MppiConfig::new(K, N)
        .with_lambda(LAMBDA)
        .with_gamma(GAMMA)
        .with_covariance(na::DMatrix::from_element(1, 1, R * R))
        .with_bounds(ClampBounds::new(&[LIMIT.0], &[LIMIT.1])?)
        // 地平線の先は角度の二乗誤差で見積もる
        .with_value_fn(|o: &[f64]| -10.0 * o[2].powi(2))
        .with_seed(0);
    let mut mppi = Mppi::new(config, Pendulum::new)?;

    let mut x = na::Vector4::new(0.5, 0.0, 0.1, 0.0);
    let mut u = [0.0];

    // ログファイルの作成
    std::fs::create_dir_all("logs")?;
    let file_path = "logs/mppi.csv";
    let mut wtr = csv::Writer::from_path(file_path).context("file open error")?;
    wtr.write_record(["t", "u", "x", "dx", "theta", "dtheta"])?;

    let start = std::time::Instant::now();
    let mut t = 0.0;
    while t < 10.0 {
        let stats = mppi.compute(x.as_slice(), &mut u)?;
        x = dynamics(&x, u[0]);

        println!(
            "t: {:.2}, u: {:6.2}, x: [{:6.2}, {:5.2}, {:5.2}, {:5.2}], ess: {:7.1}",
            t, u[0], x[0], x[1], x[2], x[3], stats.effective_samples
        );
        wtr.write_record(&[
            t.to_string(),
            u[0].to_string(),
            x[0].to_string(),
            x[1].to_string(),
            x[2].to_string(),
            x[3].to_string(),
        ])?;

        // x[2] が 60度 以上になったら終了
        if x[2].abs() > 60.0f64.to_radians() {
            println!("x[2] is over 60 degrees");
            break;
        }

        t += DT;
    }
    wtr.flush()?;
    println!("elapsed: {:.2} sec", start.elapsed().as_secs_f64());

    Ok(())
}
