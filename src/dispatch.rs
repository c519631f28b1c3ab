use crate::env::Environment;
use crate::error::Result;
use crate::rollout::{ValueFn, Worker};
use ndarray::{Array3, Axis};
use rayon::prelude::*;
use std::ops::Range;

// 1 ワーカーあたりのサンプル数
fn chunk_len(samples: usize, workers: usize) -> usize {
    samples.div_ceil(workers.clamp(1, samples.max(1))).max(1)
}

// 実際に区間を受け持つワーカー数
pub(crate) fn active_workers(samples: usize, workers: usize) -> usize {
    samples.div_ceil(chunk_len(samples, workers))
}

/// K 個のサンプル番号を連続した区間に分ける。区間の数は `workers` 以下
pub fn partition(samples: usize, workers: usize) -> Vec<Range<usize>> {
    let n = chunk_len(samples, workers);
    (0..samples)
        .step_by(n)
        .map(|s| s..(s + n).min(samples))
        .collect()
}

/// 全サンプルのロールアウトを実行し、`costs[k]` にサンプル k のコストを書き込む
///
/// 各ワーカーは自分の区間の `costs` だけを書くのでロックは不要。
/// 戻った時点で全区間の計算が終わっている。
pub fn dispatch<E: Environment>(
    pool: &rayon::ThreadPool,
    workers: &mut [Worker<E>],
    x: &[f64],
    batch: &Array3<f64>,
    costs: &mut [f64],
    gamma: f64,
    value: Option<&ValueFn>,
) -> Result<()> {
    let samples = costs.len();
    assert_eq!(batch.len_of(Axis(0)), samples, "batch/cost length mismatch");
    assert!(!workers.is_empty(), "no workers");

    let run = |worker: &mut Worker<E>, start: usize, chunk: &mut [f64]| -> Result<()> {
        for (i, c) in chunk.iter_mut().enumerate() {
            let k = start + i;
            *c = worker.rollout(k, x, batch.index_axis(Axis(0), k), gamma, value)?;
        }
        Ok(())
    };

    // 1 ワーカーならスレッドを使わずに逐次実行
    if workers.len() == 1 {
        return run(&mut workers[0], 0, costs);
    }

    let n = chunk_len(samples, workers.len());
    pool.install(|| {
        costs
            .par_chunks_mut(n)
            .zip(workers.par_iter_mut())
            .enumerate()
            .try_for_each(|(i, (chunk, worker))| run(worker, i * n, chunk))
    })
}
