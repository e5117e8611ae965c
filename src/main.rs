use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use cachesim_l2_mesi::mesi::{Controller, Core, Scheduler, SYSTEM};
use cachesim_l2_mesi::report::{CsvCounters, Report};
use cachesim_l2_mesi::trace::{TraceReader, DEFAULT_TRACE_CORE1, DEFAULT_TRACE_CORE2};

/// Simulates a multilevel cache shared by two cores.
#[derive(Parser)]
#[command(name = "cachesim-l2-mesi", version, about)]
struct Cli {
    /// Memory trace executed by core 1
    #[arg(default_value = DEFAULT_TRACE_CORE1)]
    trace_core1: PathBuf,
    /// Memory trace executed by core 2
    #[arg(default_value = DEFAULT_TRACE_CORE2)]
    trace_core2: PathBuf,
}

fn main() -> Result<()> {
    // logging
    let env = Env::default()
        .filter_or("CACHESIM_LOG", "info")
        .write_style_or("CACHESIM_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    let cli = Cli::parse();
    let spec = SYSTEM;
    spec.validate()?;

    // both traces must exist before anything runs
    let core1 = TraceReader::open(&cli.trace_core1)?;
    let core2 = TraceReader::open(&cli.trace_core2)?;
    println!("Processing program {} in core 1", core1.name());
    println!("Processing program {} in core 2", core2.name());

    let csv = match env::var_os("CACHESIM_CSV") {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create counters file {}", PathBuf::from(&path).display()))?;
            Some(CsvCounters::new(BufWriter::new(file))?)
        }
        None => None,
    };
    let mut report = Report::new(csv);

    let mut ctrl = Controller::new(&spec);
    let stats = Scheduler::new(&spec).run(&mut ctrl, core1, core2, &mut report)?;
    report.finish()?;

    // print stats
    println!("finished simulation in {} instructions", stats.total_cycles());
    for core in [Core::One, Core::Two] {
        println!(
            "{}: {} instructions, {} L1 misses ({:.2}%)",
            core,
            stats.cycles[core.index()],
            stats.l1_misses[core.index()],
            100.0 * stats.l1_miss_rate(core)
        );
    }
    println!("L2: {} misses", stats.l2_misses);
    println!("invalidations: {}, writebacks: {}", stats.invalidations, stats.writebacks);
    if stats.invalid_actions > 0 || stats.invalid_states > 0 {
        println!(
            "invalid actions: {}, invalid states: {}",
            stats.invalid_actions, stats.invalid_states
        );
    }
    Ok(())
}
