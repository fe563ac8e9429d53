use crossbeam_channel::{Receiver, Sender};
use lockstep_engine::{OutputRecord, OutputSink, TaskId, TaskRegistry};
use std::time::Instant;

// ─── Statistics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Stats {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchResult {
    pub name: String,
    pub unit: String,
    pub stats: Stats,
}

pub fn compute_stats(samples: &mut [u64]) -> Stats {
    assert!(!samples.is_empty(), "cannot compute stats on empty samples");
    samples.sort_unstable();

    let count = samples.len();
    let mean = samples.iter().sum::<u64>() as f64 / count as f64;
    let variance = samples
        .iter()
        .map(|&x| {
            let diff = x as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    Stats {
        min: samples[0],
        max: samples[count - 1],
        mean,
        stddev: variance.sqrt(),
        p50: percentile_sorted(samples, 50.0),
        p90: percentile_sorted(samples, 90.0),
        p99: percentile_sorted(samples, 99.0),
        p999: percentile_sorted(samples, 99.9),
        count,
    }
}

fn percentile_sorted(sorted: &[u64], pct: f64) -> u64 {
    let len = sorted.len();
    let rank = (pct / 100.0 * len as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(len - 1)]
}

// ─── Workloads ──────────────────────────────────────────────────────────────

/// Every task registered with an empty body: measures pure scheduling cost.
pub fn noop_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    for id in TaskId::ALL {
        registry.register(id, |_| {});
    }
    registry
}

/// Every task writes a value derived from its inputs, so the store is
/// exercised on each call.
pub fn touching_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    for id in TaskId::ALL {
        registry.register(id, move |ctx| {
            for &sig in id.outputs() {
                ctx.write(sig, ctx.read_previous(sig) + 1.0);
            }
        });
    }
    registry
}

/// Records the wall-clock gap between consecutive emitted records, in ns.
/// The samples are sent back when the recorder is dropped, i.e. when the
/// closing lane finishes.
#[derive(Debug)]
pub struct GapRecorder {
    last: Option<Instant>,
    gaps: Vec<u64>,
    done: Sender<Vec<u64>>,
}

impl GapRecorder {
    pub fn new(capacity: usize) -> (Self, Receiver<Vec<u64>>) {
        let (done, rx) = crossbeam_channel::bounded(1);
        let recorder = Self {
            last: None,
            gaps: Vec::with_capacity(capacity),
            done,
        };
        (recorder, rx)
    }
}

impl OutputSink for GapRecorder {
    fn emit(&mut self, _record: &OutputRecord) {
        let now = Instant::now();
        if let Some(prev) = self.last.replace(now) {
            self.gaps.push(now.duration_since(prev).as_nanos() as u64);
        }
    }
}

impl Drop for GapRecorder {
    fn drop(&mut self) {
        let _ = self.done.try_send(std::mem::take(&mut self.gaps));
    }
}

// ─── Output ─────────────────────────────────────────────────────────────────

pub fn print_table_header() {
    println!(
        "  {:<30} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}  unit",
        "Benchmark", "min", "p50", "p90", "p99", "p99.9", "max",
    );
    println!("  {}", "─".repeat(96));
}

pub fn print_result_row(r: &BenchResult) {
    println!(
        "  {:<30} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}  {}",
        r.name, r.stats.min, r.stats.p50, r.stats.p90, r.stats.p99, r.stats.p999, r.stats.max, r.unit,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_on_known_samples() {
        let mut samples: Vec<u64> = (1..=100).rev().collect();
        let stats = compute_stats(&mut samples);
        assert_eq!(stats.min, 1);
        assert_eq!(stats.max, 100);
        assert_eq!(stats.p50, 50);
        assert_eq!(stats.p99, 99);
        assert_eq!(stats.mean, 50.5);
    }

    #[test]
    fn single_sample() {
        let stats = compute_stats(&mut [7]);
        assert_eq!((stats.min, stats.p999, stats.max), (7, 7, 7));
    }

    #[test]
    fn recorder_hands_back_gaps_on_drop() {
        let (mut recorder, rx) = GapRecorder::new(4);
        for _ in 0..3 {
            recorder.emit(&OutputRecord::default());
        }
        drop(recorder);
        assert_eq!(rx.try_recv().map(|gaps| gaps.len()), Ok(2));
    }

    #[test]
    fn workloads_are_complete() {
        assert!(noop_registry().missing().is_empty());
        assert!(touching_registry().missing().is_empty());
    }
}
