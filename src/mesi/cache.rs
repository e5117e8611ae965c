use log::trace;

use super::common::*;

// cache lines and sets

#[derive(Default, Clone, Copy, Debug)]
pub struct CacheLine {
    /// `None` until the slot is filled for the first time
    pub tag: Option<u64>,
    pub state: MesiState,
    last_used: u64,
}

#[derive(Clone, Debug)]
pub struct CacheSet<const ASSOC: usize> {
    lines: [CacheLine; ASSOC],
    mru_ctr: u64,
}

impl<const ASSOC: usize> Default for CacheSet<ASSOC> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ASSOC: usize> CacheSet<ASSOC> {
    pub fn new() -> Self {
        Self { lines: [CacheLine::default(); ASSOC], mru_ctr: 0 }
    }
    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }
    fn way_of(&self, tag: u64) -> Option<usize> {
        self.lines.iter().position(|l| l.tag == Some(tag))
    }
    fn touch(&mut self, way: usize) {
        self.mru_ctr += 1;
        self.lines[way].last_used = self.mru_ctr;
    }
    fn lru_way(&self) -> usize {
        // never-used slots keep last_used == 0 and are picked first
        self.lines
            .iter().enumerate()
            .min_by_key(|(_, l)| l.last_used)
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// State of the line holding `tag` (Invalid included), making it MRU.
    /// `None` if no line carries the tag.
    pub fn lookup(&mut self, tag: u64) -> Option<MesiState> {
        let way = self.way_of(tag)?;
        self.touch(way);
        Some(self.lines[way].state)
    }
    /// Like `lookup` but leaves the LRU order alone.
    pub fn peek(&self, tag: u64) -> Option<MesiState> {
        self.way_of(tag).map(|w| self.lines[w].state)
    }
    /// tag of the least recently used line, if that slot was ever filled
    pub fn select_victim(&self) -> Option<u64> {
        self.lines[self.lru_way()].tag
    }
    /// Fill a line with `tag`. A line that already carries the tag is refilled
    /// in place so tags stay unique within the set; otherwise the LRU line is
    /// overwritten.
    pub fn install(&mut self, tag: u64, state: MesiState) {
        let way = self.way_of(tag).unwrap_or_else(|| self.lru_way());
        self.lines[way].tag = Some(tag);
        self.lines[way].state = state;
        self.touch(way);
    }
    /// Overwrite the state of the line holding `tag`. Returns false (and
    /// changes nothing) when the tag is absent.
    pub fn set_state(&mut self, tag: u64, state: MesiState) -> bool {
        match self.way_of(tag) {
            Some(way) => {
                self.lines[way].state = state;
                true
            }
            None => false,
        }
    }
}

// caches

pub struct Cache<const ASSOC: usize> {
    name: &'static str,
    geometry: Geometry,
    sets: Vec<CacheSet<ASSOC>>,
}

/// private per-core cache
pub type L1Cache = Cache<L1_ASSOC>;
/// shared backing cache
pub type L2Cache = Cache<L2_ASSOC>;

impl<const ASSOC: usize> Cache<ASSOC> {
    pub fn new(name: &'static str, geometry: Geometry) -> Self {
        Self {
            name,
            geometry,
            sets: vec![CacheSet::new(); geometry.num_sets()],
        }
    }

    // helper functions
    fn set_and_tag_of(&self, addr: Addr) -> (&CacheSet<ASSOC>, u64) {
        let f = addr.decode(&self.geometry);
        (&self.sets[f.index], f.tag)
    }
    fn set_and_tag_of_mut(&mut self, addr: Addr) -> (&mut CacheSet<ASSOC>, u64) {
        let f = addr.decode(&self.geometry);
        (&mut self.sets[f.index], f.tag)
    }

    pub fn read(&mut self, addr: Addr) -> Option<MesiState> {
        let (set, tag) = self.set_and_tag_of_mut(addr);
        set.lookup(tag)
    }
    pub fn peek(&self, addr: Addr) -> Option<MesiState> {
        let (set, tag) = self.set_and_tag_of(addr);
        set.peek(tag)
    }
    pub fn set_state(&mut self, addr: Addr, state: MesiState) -> bool {
        let name = self.name;
        let (set, tag) = self.set_and_tag_of_mut(addr);
        let found = set.set_state(tag, state);
        if found {
            trace!("{}: {} -> {}", name, addr, state.letter());
        }
        found
    }
    pub fn install(&mut self, addr: Addr, state: MesiState) {
        trace!("{}: fill {} as {}", self.name, addr, state.letter());
        let (set, tag) = self.set_and_tag_of_mut(addr);
        set.install(tag, state);
    }
    /// Block address of the line that installing `addr` would overwrite.
    /// `None` when the set already holds the tag or the slot is still empty.
    pub fn victim_address(&self, addr: Addr) -> Option<Addr> {
        let f = addr.decode(&self.geometry);
        let set = &self.sets[f.index];
        if set.peek(f.tag).is_some() {
            return None;
        }
        let tag = set.select_victim()?;
        Some(Addr::encode(Fields { index: f.index, tag, offset: 0 }, &self.geometry))
    }
}

/// An L1 snooped by the shared cache during an eviction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snooped {
    pub core: Core,
    pub prior: MesiState,
}

impl L2Cache {
    /// Evict `addr` from the whole hierarchy: its L2 line goes Invalid and so
    /// does every L1 copy still held in a valid state. Reports the L1s that
    /// were hit and the state they held, so the caller can issue writebacks
    /// for Modified ones.
    pub fn snoop_invalidate(&mut self, addr: Addr, l1s: [(Core, &mut L1Cache); 2]) -> Vec<Snooped> {
        self.set_state(addr, MesiState::Invalid);
        let mut snooped = Vec::new();
        for (core, l1) in l1s {
            if let Some(prior) = l1.peek(addr).filter(|s| s.is_valid()) {
                l1.set_state(addr, MesiState::Invalid);
                snooped.push(Snooped { core, prior });
            }
        }
        snooped
    }
}
