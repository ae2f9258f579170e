//! Worker pool for pairwise similarity computation.
//!
//! The `N * (N - 1) / 2` pairwise alignments are independent, so a driver
//! thread feeds `(i, j)` tasks to a pool of named worker threads over a
//! bounded crossbeam channel and collects `(worker, (i, j), similarity)`
//! results from a second channel. The similarity matrix is written only by
//! the driver; workers return immutable result records. Completed pairs
//! are appended to the checkpoint file as they arrive.
//!
//! On shutdown the driver closes the task channel (workers finish their
//! in-flight task and exit) and then polls worker liveness for up to ten
//! seconds; stragglers are detached with a warning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{info, warn};
use ndarray::Array2;

use crate::config::AlignConfig;

use super::checkpoint::{read_checkpoint, CheckpointWriter};
use super::{align, Alignment, AlignError};

type PairTask = (usize, usize);

struct PairResult {
    worker: usize,
    pair: (usize, usize),
    similarity: Result<f64, String>,
}

/// Liveness polling budget after the task channel closes.
const SHUTDOWN_POLLS: u32 = 40;
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Computes the symmetric pairwise similarity matrix on a worker pool.
///
/// Pairs recorded in the configured checkpoint are not recomputed; sparse
/// mode restricts the pairs considered. Per-pair failures are logged and
/// leave the matrix entry at zero.
pub(crate) fn similarity_matrix(
    alignments: &[Alignment],
    d: f64,
    gap: f64,
    config: &AlignConfig,
) -> Result<Array2<f64>, AlignError> {
    let n = alignments.len();
    let mut sim = Array2::zeros((n, n));

    let prior = match &config.checkpoint {
        Some(path) if path.is_file() => read_checkpoint(path)?,
        _ => Default::default(),
    };
    for (&(i, j), &similarity) in &prior {
        if i < n && j < n {
            sim[[i, j]] = similarity;
            sim[[j, i]] = similarity;
        }
    }

    let mut tasks: Vec<PairTask> = Vec::new();
    for i in 0..n.saturating_sub(1) {
        for j in (i + 1)..n {
            if let Some(sparse) = &config.sparse {
                if !sparse.includes(i, j) {
                    continue;
                }
            }
            if prior.contains_key(&(i, j)) || prior.contains_key(&(j, i)) {
                continue;
            }
            tasks.push((i, j));
        }
    }
    if tasks.is_empty() {
        return Ok(sim);
    }

    let workers = config.worker_count().min(tasks.len());
    info!(
        "aligning {} pair(s) on {} worker(s) ({} restored from checkpoint)",
        tasks.len(),
        workers,
        prior.len()
    );

    let shared: Arc<Vec<Alignment>> = Arc::new(alignments.to_vec());
    let keep_going = Arc::new(AtomicBool::new(true));
    let (task_tx, task_rx) = bounded::<PairTask>(workers);
    let (done_tx, done_rx) = unbounded::<PairResult>();

    let handles = spawn_workers(workers, &shared, d, gap, &task_rx, &done_tx, &keep_going)?;
    drop(done_tx);

    let mut writer = match &config.checkpoint {
        Some(path) => Some(CheckpointWriter::append(path)?),
        None => None,
    };

    let drive = drive(&tasks, task_tx, &done_rx, &mut sim, &mut writer);
    keep_going.store(false, Ordering::SeqCst);
    join_workers(handles);
    drive?;

    Ok(sim)
}

#[allow(clippy::too_many_arguments)]
fn spawn_workers(
    workers: usize,
    alignments: &Arc<Vec<Alignment>>,
    d: f64,
    gap: f64,
    task_rx: &Receiver<PairTask>,
    done_tx: &Sender<PairResult>,
    keep_going: &Arc<AtomicBool>,
) -> Result<Vec<JoinHandle<()>>, AlignError> {
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let alignments = Arc::clone(alignments);
        let task_rx = task_rx.clone();
        let done_tx = done_tx.clone();
        let keep_going = Arc::clone(keep_going);

        let handle = thread::Builder::new()
            .name(format!("align-worker-{worker}"))
            .spawn(move || {
                for (i, j) in task_rx {
                    if !keep_going.load(Ordering::SeqCst) {
                        break;
                    }
                    let similarity = align(&alignments[i], &alignments[j], d, gap)
                        .map(|merged| merged.similarity().unwrap_or(0.0))
                        .map_err(|e| e.to_string());
                    if done_tx
                        .send(PairResult {
                            worker,
                            pair: (i, j),
                            similarity,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            })
            .map_err(|e| AlignError::Pool(format!("failed to spawn worker: {e}")))?;
        handles.push(handle);
    }
    Ok(handles)
}

fn drive(
    tasks: &[PairTask],
    task_tx: Sender<PairTask>,
    done_rx: &Receiver<PairResult>,
    sim: &mut Array2<f64>,
    writer: &mut Option<CheckpointWriter>,
) -> Result<(), AlignError> {
    // dispatch the initial batch, then one task per completion
    let mut next_task = 0;
    while next_task < tasks.len() && !task_tx.is_full() {
        task_tx
            .send(tasks[next_task])
            .map_err(|_| AlignError::Pool("task channel closed early".into()))?;
        next_task += 1;
    }

    let total = tasks.len();
    for completed in 0..total {
        let result = done_rx
            .recv()
            .map_err(|_| AlignError::Pool("all workers exited early".into()))?;
        let (i, j) = result.pair;
        match result.similarity {
            Ok(similarity) => {
                sim[[i, j]] = similarity;
                sim[[j, i]] = similarity;
                if let Some(writer) = writer {
                    writer.record(i, j, similarity)?;
                }
            }
            Err(message) => {
                warn!(
                    "worker {} failed on pair ({i}, {j}): {message}",
                    result.worker
                );
            }
        }
        info!("completed {} of {} pair(s)", completed + 1, total);

        if next_task < total {
            task_tx
                .send(tasks[next_task])
                .map_err(|_| AlignError::Pool("task channel closed early".into()))?;
            next_task += 1;
        }
    }
    // closing the channel lets idle workers exit
    drop(task_tx);
    Ok(())
}

fn join_workers(handles: Vec<JoinHandle<()>>) {
    let mut remaining = handles;
    for _ in 0..SHUTDOWN_POLLS {
        remaining.retain(|handle| !handle.is_finished());
        if remaining.is_empty() {
            break;
        }
        thread::sleep(SHUTDOWN_POLL_INTERVAL);
    }

    for handle in remaining {
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            warn!(
                "alignment worker {:?} did not stop within the shutdown budget; detaching",
                handle.thread().name().unwrap_or("?")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::Experiment;
    use crate::peak::Peak;
    use crate::spectrum::MassSpectrum;

    fn experiment(code: &str, rts: &[f64]) -> Experiment {
        let peaks = rts
            .iter()
            .map(|&rt| {
                let ms =
                    MassSpectrum::new(vec![50.0, 51.0, 52.0], vec![5.0, 10.0, 1.0]).unwrap();
                Peak::with_spectrum(rt, ms)
            })
            .collect();
        Experiment::new(code, peaks)
    }

    fn singletons() -> Vec<Alignment> {
        vec![
            Alignment::from_experiment(&experiment("a", &[60.0, 120.0])),
            Alignment::from_experiment(&experiment("b", &[60.5, 120.5])),
            Alignment::from_experiment(&experiment("c", &[61.0, 121.0])),
        ]
    }

    fn serial_matrix(alignments: &[Alignment], d: f64, gap: f64) -> Array2<f64> {
        let n = alignments.len();
        let mut sim = Array2::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let merged = align(&alignments[i], &alignments[j], d, gap).unwrap();
                let s = merged.similarity().unwrap();
                sim[[i, j]] = s;
                sim[[j, i]] = s;
            }
        }
        sim
    }

    #[test]
    fn pool_matches_serial_computation() {
        let alignments = singletons();
        let config = AlignConfig {
            parallel: true,
            workers: Some(2),
            ..AlignConfig::default()
        };
        let pooled = similarity_matrix(&alignments, 2.0, 0.3, &config).unwrap();
        let serial = serial_matrix(&alignments, 2.0, 0.3);
        for (a, b) in pooled.iter().zip(serial.iter()) {
            assert!((a - b).abs() < 1e-9, "pooled {a} != serial {b}");
        }
    }

    #[test]
    fn checkpoint_resumes_without_recomputation() {
        let alignments = singletons();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.txt");

        // seed the checkpoint with a fake value; it must be trusted
        CheckpointWriter::append(&path)
            .unwrap()
            .record(0, 1, 99.5)
            .unwrap();

        let config = AlignConfig {
            parallel: true,
            workers: Some(2),
            checkpoint: Some(path.clone()),
            ..AlignConfig::default()
        };
        let sim = similarity_matrix(&alignments, 2.0, 0.3, &config).unwrap();
        assert_eq!(sim[[0, 1]], 99.5);
        assert_eq!(sim[[1, 0]], 99.5);

        // all three pairs are now recorded
        let recorded = read_checkpoint(&path).unwrap();
        assert_eq!(recorded.len(), 3);
    }

    #[test]
    fn sparse_mode_skips_distant_pairs() {
        let alignments = singletons();
        let config = AlignConfig {
            parallel: true,
            workers: Some(2),
            sparse: Some(crate::config::SparseMode {
                diagonal_width: 1,
                full_compare: Default::default(),
            }),
            ..AlignConfig::default()
        };
        let sim = similarity_matrix(&alignments, 2.0, 0.3, &config).unwrap();
        // (0, 2) is outside the band and stays at zero
        assert_eq!(sim[[0, 2]], 0.0);
        assert!(sim[[0, 1]] != 0.0);
        assert!(sim[[1, 2]] != 0.0);
    }
}
