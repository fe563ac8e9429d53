//! Tick-period distribution of a full run, as a table and as JSON.
//!
//! Usage: `perf_report [ticks] [--json]`

use lockstep_engine::{Scheduler, SchedulerConfig, TaskRegistry};
use lockstep_perf::{
    BenchResult, GapRecorder, compute_stats, noop_registry, print_result_row, print_table_header,
    touching_registry,
};

const DEFAULT_TICKS: u64 = 20_000;

fn measure(name: &str, registry: TaskRegistry, ticks: u64) -> BenchResult {
    let (recorder, gaps_rx) = GapRecorder::new(ticks as usize);
    let report = Scheduler::with_config(registry, recorder, SchedulerConfig::default())
        .run(ticks)
        .unwrap_or_else(|err| {
            eprintln!("run failed: {err}");
            std::process::exit(err.exit_code());
        });

    let mut gaps = gaps_rx.try_recv().unwrap_or_default();
    if gaps.is_empty() {
        gaps.push(0);
    }
    BenchResult {
        name: format!("{name} ({} records)", report.emitted),
        unit: "ns/record".to_string(),
        stats: compute_stats(&mut gaps),
    }
}

fn main() {
    let mut ticks = DEFAULT_TICKS;
    let mut json = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            other => match other.parse() {
                Ok(n) => ticks = n,
                Err(_) => {
                    eprintln!("usage: perf_report [ticks] [--json]");
                    std::process::exit(2);
                }
            },
        }
    }

    let results = [
        measure("noop tasks", noop_registry(), ticks),
        measure("touching tasks", touching_registry(), ticks),
    ];

    if json {
        match serde_json::to_string_pretty(&results) {
            Ok(s) => println!("{s}"),
            Err(err) => {
                eprintln!("failed to encode results: {err}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("\n  lockstep tick period, {ticks} ticks\n");
    print_table_header();
    for r in &results {
        print_result_row(r);
    }
}
