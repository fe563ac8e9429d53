mod demo;

use anyhow::Context;
use lockstep_config::{LockstepConfig, OutputFormat};
use lockstep_engine::{OutputRecord, OutputSink, Scheduler};
use std::io::{self, BufWriter, Write};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Writes records to stdout. Stops writing after the first I/O error
/// (usually a closed pipe) rather than failing the run.
struct RecordWriter<W: Write> {
    out: W,
    format: OutputFormat,
    broken: bool,
}

impl<W: Write> RecordWriter<W> {
    fn new(mut out: W, format: OutputFormat) -> io::Result<Self> {
        if format == OutputFormat::Csv {
            writeln!(out, "t_simu,va,vz,q,az,h,delta_th_c,delta_e_c")?;
        }
        Ok(Self {
            out,
            format,
            broken: false,
        })
    }

    fn write_record(&mut self, r: &OutputRecord) -> io::Result<()> {
        match self.format {
            OutputFormat::Csv => writeln!(
                self.out,
                "{},{},{},{},{},{},{},{}",
                r.t_simu, r.va, r.vz, r.q, r.az, r.h, r.delta_th_c, r.delta_e_c
            ),
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, r)?;
                self.out.write_all(b"\n")
            }
        }
    }
}

impl<W: Write + Send> OutputSink for RecordWriter<W> {
    fn emit(&mut self, record: &OutputRecord) {
        if self.broken {
            return;
        }
        if let Err(err) = self.write_record(record) {
            warn!(error = %err, "output closed; dropping further records");
            self.broken = true;
        }
    }
}

impl<W: Write> Drop for RecordWriter<W> {
    fn drop(&mut self) {
        if !self.broken {
            let _ = self.out.flush();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => LockstepConfig::load(path.as_str())
            .with_context(|| format!("failed to load config from {path}"))?,
        None => LockstepConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_level))
                .context("invalid log_level")?,
        )
        .with_writer(io::stderr)
        .init();

    info!(
        ticks = config.ticks,
        real_time = config.real_time,
        commands = config.commands.len(),
        "starting lockstep"
    );

    let sink = RecordWriter::new(BufWriter::new(io::stdout()), config.output)
        .context("failed to write output header")?;
    let scheduler = Scheduler::with_config(
        demo::registry(config.initial_altitude),
        sink,
        config.to_scheduler_config(),
    );

    match scheduler.run(config.ticks) {
        Ok(report) => {
            info!(ticks = report.ticks, emitted = report.emitted, "done");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "run failed");
            std::process::exit(err.exit_code());
        }
    }
}
