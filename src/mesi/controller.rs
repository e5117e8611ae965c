use log::{debug, error};

use super::cache::*;
use super::common::*;
use super::event::*;

use super::common::MesiState::*;

/// The two private caches, the shared one, and the counters they feed.
pub struct Controller {
    l1: [L1Cache; 2],
    l2: L2Cache,
    stats: Stats,
}

impl Controller {
    pub fn new(spec: &SystemSpec) -> Self {
        Self {
            l1: [L1Cache::new("L1 CPU1", spec.l1), L1Cache::new("L1 CPU2", spec.l1)],
            l2: L2Cache::new("L2", spec.l2),
            stats: Stats::default(),
        }
    }

    pub fn l1(&self, core: Core) -> &L1Cache {
        &self.l1[core.index()]
    }
    pub fn l2(&self) -> &L2Cache {
        &self.l2
    }
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Run one instruction of `core` to completion.
    pub fn execute(&mut self, core: Core, instr: &Instr, sink: &mut dyn EventSink) {
        let Self { l1, l2, stats } = self;
        stats.cycles[core.index()] += 1;
        let [l1_core1, l1_core2] = l1;
        let (local, peer) = match core {
            Core::One => (l1_core1, l1_core2),
            Core::Two => (l1_core2, l1_core1),
        };
        let mut op = Operation {
            core,
            addr: instr.addr,
            mode: &instr.mode,
            local,
            peer,
            l2,
            stats,
            sink,
        };
        match instr.mode {
            Mode::Load => op.load(),
            Mode::Store => op.store(),
            Mode::Other(_) => {
                debug!("{}: invalid action '{}' at {}", core, instr.mode, instr.addr);
                op.emit(Outcome::InvalidAction);
            }
        }
    }
}

/// Borrowed view of the hierarchy from one core's point of view.
struct Operation<'a, S: EventSink + ?Sized> {
    core: Core,
    addr: Addr,
    mode: &'a Mode,
    local: &'a mut L1Cache,
    peer: &'a mut L1Cache,
    l2: &'a mut L2Cache,
    stats: &'a mut Stats,
    sink: &'a mut S,
}

impl<'a, S: EventSink + ?Sized> Operation<'a, S> {
    fn emit(&mut self, outcome: Outcome) {
        let event = Event { core: self.core, addr: self.addr, mode: self.mode.clone(), outcome };
        self.stats.record(&event);
        self.sink.on_event(&event);
    }

    fn peer_id(&self) -> Core {
        self.core.peer()
    }

    /// Probe L1 and, on a miss, L2. Returns the local L1 state when it hit,
    /// otherwise whether L2 hit.
    fn probe(&mut self) -> Result<MesiState, bool> {
        match self.local.read(self.addr) {
            Some(state) if state.is_valid() => Ok(state),
            _ => Err(is_hit(self.l2.read(self.addr))),
        }
    }

    fn load(&mut self) {
        let hit_l2 = match self.probe() {
            Ok(state) => {
                debug!("{}: load hit {} in {}", self.core, self.addr, state.letter());
                return self.emit(Outcome::L1Hit);
            }
            Err(hit_l2) => hit_l2,
        };
        self.emit(if hit_l2 { Outcome::L1MissL2Hit } else { Outcome::L1MissL2Miss });
        self.evict_local_victim();

        if !hit_l2 {
            self.evict_l2_victim();
            self.local.install(self.addr, Exclusive);
            self.l2.install(self.addr, Shared);
            return;
        }

        let peer_state = self.peer.peek(self.addr);
        debug!("{}: load miss {}, peer holds {:?}", self.core, self.addr, peer_state);
        match peer_state {
            Some(Modified) => {
                self.emit(Outcome::Writeback { from: Level::L1(self.peer_id()), to: Level::L2, addr: self.addr });
                self.peer.set_state(self.addr, Invalid);
                self.emit(Outcome::Invalidate { target: self.peer_id(), addr: self.addr });
                self.local.install(self.addr, Exclusive);
            }
            Some(Exclusive) => {
                self.peer.set_state(self.addr, Shared);
                self.local.install(self.addr, Shared);
            }
            Some(Shared) => self.local.install(self.addr, Shared),
            Some(Invalid) | None => self.local.install(self.addr, Exclusive),
        }
        self.l2.set_state(self.addr, Shared);
    }

    fn store(&mut self) {
        let hit_l2 = match self.probe() {
            Ok(state) => {
                debug!("{}: store hit {} in {}", self.core, self.addr, state.letter());
                self.emit(Outcome::L1Hit);
                if state == Shared {
                    self.invalidate_peer();
                }
                self.local.set_state(self.addr, Modified);
                return;
            }
            Err(hit_l2) => hit_l2,
        };
        self.emit(if hit_l2 { Outcome::L1MissL2Hit } else { Outcome::L1MissL2Miss });
        self.evict_local_victim();

        if hit_l2 {
            self.invalidate_peer();
            self.local.install(self.addr, Modified);
            self.l2.set_state(self.addr, Shared);
        } else {
            self.evict_l2_victim();
            self.local.install(self.addr, Modified);
            self.l2.install(self.addr, Shared);
        }
    }

    /// Drop the peer's copy, writing it back first if it is dirty.
    fn invalidate_peer(&mut self) {
        let peer_state = match self.peer.peek(self.addr) {
            Some(state) if state.is_valid() => state,
            _ => return,
        };
        if peer_state == Modified {
            self.emit(Outcome::Writeback { from: Level::L1(self.peer_id()), to: Level::L2, addr: self.addr });
        }
        self.peer.set_state(self.addr, Invalid);
        self.emit(Outcome::Invalidate { target: self.peer_id(), addr: self.addr });
    }

    /// Make room in the local L1 for `addr`; a dirty victim is written back
    /// into L2.
    fn evict_local_victim(&mut self) {
        let victim = match self.local.victim_address(self.addr) {
            Some(victim) => victim,
            None => return,
        };
        match self.local.peek(victim) {
            Some(Modified) => {
                debug!("{}: evicting dirty {} from L1", self.core, victim);
                self.emit(Outcome::Writeback { from: Level::L1(self.core), to: Level::L2, addr: victim });
                self.l2.set_state(victim, Modified);
                self.local.set_state(victim, Invalid);
            }
            Some(Exclusive | Shared | Invalid) => (),
            None => {
                error!("{}: L1 victim {} missing from its own set", self.core, victim);
                self.emit(Outcome::InvalidState { level: Level::L1(self.core), addr: victim });
            }
        }
    }

    /// Make room in L2 for `addr`. The victim leaves the hierarchy entirely:
    /// dirty data goes to memory and both L1s lose their copies.
    fn evict_l2_victim(&mut self) {
        let victim = match self.l2.victim_address(self.addr) {
            Some(victim) => victim,
            None => return,
        };
        match self.l2.peek(victim) {
            Some(Modified) => {
                debug!("{}: evicting dirty {} from L2", self.core, victim);
                self.emit(Outcome::Writeback { from: Level::L2, to: Level::Memory, addr: victim });
            }
            Some(Exclusive | Shared | Invalid) => (),
            None => {
                error!("{}: L2 victim {} missing from its own set", self.core, victim);
                self.emit(Outcome::InvalidState { level: Level::L2, addr: victim });
                return;
            }
        }
        let peer_id = self.peer_id();
        let snooped = self.l2.snoop_invalidate(
            victim,
            [(self.core, &mut *self.local), (peer_id, &mut *self.peer)],
        );
        for Snooped { core, prior } in snooped {
            if prior == Modified {
                self.emit(Outcome::Writeback { from: Level::L1(core), to: Level::Memory, addr: victim });
            }
            self.emit(Outcome::Invalidate { target: core, addr: victim });
        }
    }
}
