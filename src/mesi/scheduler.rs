use anyhow::{Context, Result};
use log::{debug, info};

use super::common::*;
use super::controller::Controller;
use super::event::*;

/// Feeds the two instruction streams into the controller, `core1_burst`
/// instructions of core 1 for every `core2_burst` of core 2.
pub struct Scheduler {
    bursts: [usize; 2],
}

impl Scheduler {
    pub fn new(spec: &SystemSpec) -> Self {
        Scheduler { bursts: [spec.core1_burst, spec.core2_burst] }
    }

    /// Run until both streams are exhausted. An `Err` from either stream stops
    /// the simulation immediately.
    pub fn run<A, B>(
        &self,
        ctrl: &mut Controller,
        core1: A,
        core2: B,
        sink: &mut dyn EventSink,
    ) -> Result<Stats>
    where
        A: IntoIterator<Item = Result<Instr>>,
        B: IntoIterator<Item = Result<Instr>>,
    {
        let mut core1 = core1.into_iter();
        let mut core2 = core2.into_iter();
        let mut done = [false, false];
        let mut rounds = 0u64;

        while !done.iter().all(|d| *d) {
            rounds += 1;
            for _ in 0..self.bursts[0] {
                if !issue(Core::One, &mut core1, &mut done[0], ctrl, sink)? { break; }
            }
            for _ in 0..self.bursts[1] {
                if !issue(Core::Two, &mut core2, &mut done[1], ctrl, sink)? { break; }
            }
        }

        info!("finished simulation after {} rounds, {} instructions", rounds, ctrl.stats().total_cycles());
        Ok(*ctrl.stats())
    }
}

/// Execute the next instruction of `core`. Returns false once the stream has
/// nothing left.
fn issue<I>(
    core: Core,
    stream: &mut I,
    done: &mut bool,
    ctrl: &mut Controller,
    sink: &mut dyn EventSink,
) -> Result<bool>
where
    I: Iterator<Item = Result<Instr>>,
{
    if *done {
        return Ok(false);
    }
    match stream.next() {
        None => {
            debug!("{}: instruction stream exhausted", core);
            *done = true;
            Ok(false)
        }
        Some(instr) => {
            let instr = instr.with_context(|| format!("{}: cannot continue the trace", core))?;
            ctrl.execute(core, &instr, sink);
            sink.on_retired(core, ctrl.stats());
            Ok(true)
        }
    }
}
