use std::fmt;

use super::common::*;

/// Where a line lives, for writeback reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    L1(Core),
    L2,
    Memory,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::L1(core) => write!(f, "L1 {}", core),
            Level::L2 => write!(f, "L2"),
            Level::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    L1Hit,
    L1MissL2Hit,
    L1MissL2Miss,
    /// `target`'s copy of `addr` was forced to Invalid
    Invalidate { target: Core, addr: Addr },
    Writeback { from: Level, to: Level, addr: Addr },
    InvalidAction,
    /// an eviction found its victim in an impossible state; what follows for
    /// this operation must not be trusted. Victims always come from a tag the
    /// set currently holds, so a consistent hierarchy never emits this.
    InvalidState { level: Level, addr: Addr },
}

/// One record emitted by the controller. `core`, `addr` and `mode` describe
/// the operation being executed; addresses inside `outcome` name the line
/// actually affected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub core: Core,
    pub addr: Addr,
    pub mode: Mode,
    pub outcome: Outcome,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.mode {
            Mode::Load => "Read",
            Mode::Store => "Write",
            Mode::Other(_) => "Access",
        };
        match &self.outcome {
            Outcome::L1Hit => write!(f, "{}: {} HIT L1, address {}", self.core, access, self.addr),
            Outcome::L1MissL2Hit => write!(f, "{}: {} MISS L1, HIT L2, address {}", self.core, access, self.addr),
            Outcome::L1MissL2Miss => write!(f, "{}: {} MISS L1, MISS L2, address {}, must fetch from memory", self.core, access, self.addr),
            Outcome::Invalidate { target, addr } => write!(f, "{}: invalidating {} copy, address {}", self.core, target, addr),
            Outcome::Writeback { from, to, addr } => write!(f, "{}: write back {} -> {}, address {}", self.core, from, to, addr),
            Outcome::InvalidAction => write!(f, "{}: invalid action '{}', address {}", self.core, self.mode, self.addr),
            Outcome::InvalidState { level, addr } => write!(f, "{}: invalid state for victim in {}, address {}", self.core, level, addr),
        }
    }
}

/// Subscriber for everything the controller reports.
pub trait EventSink {
    fn on_event(&mut self, event: &Event);
    /// called once per executed instruction, after all of its events
    fn on_retired(&mut self, _core: Core, _stats: &Stats) {}
}

impl EventSink for Vec<Event> {
    fn on_event(&mut self, event: &Event) {
        self.push(event.clone());
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// instructions executed per core
    pub cycles: [u64; 2],
    pub l1_misses: [u64; 2],
    pub l2_misses: u64,
    pub invalidations: u64,
    pub writebacks: u64,
    pub invalid_actions: u64,
    pub invalid_states: u64,
}

impl Stats {
    pub fn record(&mut self, event: &Event) {
        match event.outcome {
            Outcome::L1Hit => (),
            Outcome::L1MissL2Hit => self.l1_misses[event.core.index()] += 1,
            Outcome::L1MissL2Miss => {
                self.l1_misses[event.core.index()] += 1;
                self.l2_misses += 1;
            }
            Outcome::Invalidate { .. } => self.invalidations += 1,
            Outcome::Writeback { .. } => self.writebacks += 1,
            Outcome::InvalidAction => self.invalid_actions += 1,
            Outcome::InvalidState { .. } => self.invalid_states += 1,
        }
    }
    pub fn total_cycles(&self) -> u64 {
        self.cycles.iter().sum()
    }
    pub fn l1_miss_rate(&self, core: Core) -> f64 {
        match self.cycles[core.index()] {
            0 => 0.0,
            n => self.l1_misses[core.index()] as f64 / n as f64,
        }
    }
}
