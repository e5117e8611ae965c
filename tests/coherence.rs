use cachesim_l2_mesi::mesi::*;
use cachesim_l2_mesi::mesi::MesiState::*;

fn exec(ctrl: &mut Controller, core: Core, instr: Instr) -> Vec<Outcome> {
    let mut events: Vec<Event> = Vec::new();
    ctrl.execute(core, &instr, &mut events);
    for e in &events {
        assert_eq!(e.core, core);
        assert_eq!(e.mode, instr.mode);
        assert_eq!(e.addr, instr.addr);
    }
    events.into_iter().map(|e| e.outcome).collect()
}

fn state(ctrl: &Controller, core: Core, addr: u64) -> Option<MesiState> {
    ctrl.l1(core).peek(Addr(addr))
}

const A: u64 = 0x1000;

#[test]
fn store_then_remote_load_writes_back_and_invalidates() {
    let mut ctrl = Controller::new(&SYSTEM);

    assert_eq!(exec(&mut ctrl, Core::One, Instr::store(A)), vec![Outcome::L1MissL2Miss]);
    assert_eq!(state(&ctrl, Core::One, A), Some(Modified));

    let events = exec(&mut ctrl, Core::Two, Instr::load(A));
    assert_eq!(
        events,
        vec![
            Outcome::L1MissL2Hit,
            Outcome::Writeback { from: Level::L1(Core::One), to: Level::L2, addr: Addr(A) },
            Outcome::Invalidate { target: Core::One, addr: Addr(A) },
        ]
    );
    assert_eq!(state(&ctrl, Core::One, A), Some(Invalid));
    assert_eq!(state(&ctrl, Core::Two, A), Some(Exclusive));
    assert_eq!(ctrl.l2().peek(Addr(A)), Some(Shared));
}

#[test]
fn store_after_store_hits_and_stays_modified() {
    let mut ctrl = Controller::new(&SYSTEM);
    exec(&mut ctrl, Core::One, Instr::store(A));
    assert_eq!(exec(&mut ctrl, Core::One, Instr::store(A + 4)), vec![Outcome::L1Hit]);
    assert_eq!(state(&ctrl, Core::One, A), Some(Modified));
    assert_eq!(ctrl.stats().l1_misses, [1, 0]);
}

#[test]
fn load_after_store_reads_own_write() {
    let mut ctrl = Controller::new(&SYSTEM);
    exec(&mut ctrl, Core::Two, Instr::store(A));
    let l2_before = ctrl.l2().peek(Addr(A));
    assert_eq!(exec(&mut ctrl, Core::Two, Instr::load(A)), vec![Outcome::L1Hit]);
    assert_eq!(state(&ctrl, Core::Two, A), Some(Modified));
    assert_eq!(ctrl.l2().peek(Addr(A)), l2_before);
}

#[test]
fn remote_load_of_exclusive_line_shares_it() {
    let mut ctrl = Controller::new(&SYSTEM);
    assert_eq!(exec(&mut ctrl, Core::One, Instr::load(A)), vec![Outcome::L1MissL2Miss]);
    assert_eq!(state(&ctrl, Core::One, A), Some(Exclusive));

    assert_eq!(exec(&mut ctrl, Core::Two, Instr::load(A)), vec![Outcome::L1MissL2Hit]);
    assert_eq!(state(&ctrl, Core::One, A), Some(Shared));
    assert_eq!(state(&ctrl, Core::Two, A), Some(Shared));
    assert_eq!(ctrl.l2().peek(Addr(A)), Some(Shared));

    // upgrading a shared line drops the other copy
    assert_eq!(
        exec(&mut ctrl, Core::One, Instr::store(A)),
        vec![Outcome::L1Hit, Outcome::Invalidate { target: Core::Two, addr: Addr(A) }]
    );
    assert_eq!(state(&ctrl, Core::One, A), Some(Modified));
    assert_eq!(state(&ctrl, Core::Two, A), Some(Invalid));
}

#[test]
fn store_miss_with_l2_hit_takes_ownership() {
    let mut ctrl = Controller::new(&SYSTEM);
    exec(&mut ctrl, Core::One, Instr::store(A));
    assert_eq!(
        exec(&mut ctrl, Core::Two, Instr::store(A)),
        vec![
            Outcome::L1MissL2Hit,
            Outcome::Writeback { from: Level::L1(Core::One), to: Level::L2, addr: Addr(A) },
            Outcome::Invalidate { target: Core::One, addr: Addr(A) },
        ]
    );
    assert_eq!(state(&ctrl, Core::One, A), Some(Invalid));
    assert_eq!(state(&ctrl, Core::Two, A), Some(Modified));
    assert_eq!(ctrl.l2().peek(Addr(A)), Some(Shared));
}

#[test]
fn l2_eviction_invalidates_both_private_copies() {
    let mut ctrl = Controller::new(&SYSTEM);
    exec(&mut ctrl, Core::One, Instr::load(A));
    exec(&mut ctrl, Core::Two, Instr::load(A));

    // same L2 index, different L1 set
    let x = A + (1 << 17);
    assert_eq!(
        exec(&mut ctrl, Core::Two, Instr::load(x)),
        vec![
            Outcome::L1MissL2Miss,
            Outcome::Invalidate { target: Core::Two, addr: Addr(A) },
            Outcome::Invalidate { target: Core::One, addr: Addr(A) },
        ]
    );
    assert_eq!(state(&ctrl, Core::One, A), Some(Invalid));
    assert_eq!(state(&ctrl, Core::Two, A), Some(Invalid));
    assert_eq!(state(&ctrl, Core::Two, x), Some(Exclusive));
    assert_eq!(ctrl.l2().peek(Addr(A)), None);

    // the line is gone from the whole hierarchy
    assert_eq!(exec(&mut ctrl, Core::One, Instr::load(A))[0], Outcome::L1MissL2Miss);
}

#[test]
fn l2_eviction_writes_back_dirty_private_copy() {
    let mut ctrl = Controller::new(&SYSTEM);
    exec(&mut ctrl, Core::One, Instr::store(A));
    let x = A + (1 << 21);
    assert_eq!(
        exec(&mut ctrl, Core::One, Instr::store(x)),
        vec![
            Outcome::L1MissL2Miss,
            Outcome::Writeback { from: Level::L1(Core::One), to: Level::Memory, addr: Addr(A) },
            Outcome::Invalidate { target: Core::One, addr: Addr(A) },
        ]
    );
    assert_eq!(state(&ctrl, Core::One, x), Some(Modified));
}

/// Small L1 in front of a larger L2, so L1 conflicts do not collide in L2.
/// 0x000, 0x080 and 0x100 share L1 set 0 but sit at distinct L2 indices.
fn small_l1() -> SystemSpec {
    let spec = SystemSpec {
        l1: Geometry { offset_bits: 5, index_bits: 2 },
        l2: Geometry { offset_bits: 5, index_bits: 8 },
        ..SYSTEM
    };
    spec.validate().unwrap();
    spec
}

#[test]
fn refetch_from_l2_joins_a_shared_peer() {
    let mut ctrl = Controller::new(&small_l1());
    exec(&mut ctrl, Core::One, Instr::load(0x000));
    exec(&mut ctrl, Core::Two, Instr::load(0x000));
    // push the clean copy out of core 1's L1
    exec(&mut ctrl, Core::One, Instr::load(0x080));
    assert_eq!(exec(&mut ctrl, Core::One, Instr::load(0x100)), vec![Outcome::L1MissL2Miss]);
    assert_eq!(state(&ctrl, Core::One, 0x000), None);
    assert_eq!(state(&ctrl, Core::Two, 0x000), Some(Shared));

    assert_eq!(exec(&mut ctrl, Core::One, Instr::load(0x000)), vec![Outcome::L1MissL2Hit]);
    assert_eq!(state(&ctrl, Core::One, 0x000), Some(Shared));
    assert_eq!(state(&ctrl, Core::Two, 0x000), Some(Shared));
    assert_eq!(ctrl.l2().peek(Addr(0x000)), Some(Shared));
    assert_eq!(ctrl.stats().writebacks, 0);
}

#[test]
fn refetch_from_l2_without_peer_copy_is_exclusive() {
    let mut ctrl = Controller::new(&small_l1());
    exec(&mut ctrl, Core::One, Instr::load(0x000));
    exec(&mut ctrl, Core::One, Instr::load(0x080));
    exec(&mut ctrl, Core::One, Instr::load(0x100));
    assert_eq!(state(&ctrl, Core::One, 0x000), None);

    assert_eq!(exec(&mut ctrl, Core::Two, Instr::load(0x000)), vec![Outcome::L1MissL2Hit]);
    assert_eq!(state(&ctrl, Core::Two, 0x000), Some(Exclusive));
    assert_eq!(state(&ctrl, Core::One, 0x000), None);
    assert_eq!(ctrl.l2().peek(Addr(0x000)), Some(Shared));
    assert_eq!(ctrl.stats().invalidations, 0);
}

#[test]
fn dirty_l1_victims_go_to_l2_then_memory() {
    let mut ctrl = Controller::new(&small_l1());

    exec(&mut ctrl, Core::One, Instr::store(0x000));
    exec(&mut ctrl, Core::One, Instr::store(0x080));
    assert_eq!(
        exec(&mut ctrl, Core::One, Instr::store(0x100)),
        vec![
            Outcome::L1MissL2Miss,
            Outcome::Writeback { from: Level::L1(Core::One), to: Level::L2, addr: Addr(0x000) },
        ]
    );
    assert_eq!(ctrl.l2().peek(Addr(0x000)), Some(Modified));
    assert_eq!(state(&ctrl, Core::One, 0x000), None);

    // 0x2000 shares L2 index 0 with 0x000 and L1 set 0 with the rest
    assert_eq!(
        exec(&mut ctrl, Core::One, Instr::store(0x2000)),
        vec![
            Outcome::L1MissL2Miss,
            Outcome::Writeback { from: Level::L1(Core::One), to: Level::L2, addr: Addr(0x080) },
            Outcome::Writeback { from: Level::L2, to: Level::Memory, addr: Addr(0x000) },
        ]
    );
    assert_eq!(ctrl.l2().peek(Addr(0x080)), Some(Modified));
    assert_eq!(ctrl.stats().writebacks, 3);
    assert_eq!(ctrl.stats().invalid_states, 0);
}

#[test]
fn lru_picks_least_recently_touched_way() {
    let mut ctrl = Controller::new(&small_l1());
    // three tags on L1 set 0
    let (t1, t2, t3) = (0x000, 0x080, 0x100);
    exec(&mut ctrl, Core::One, Instr::load(t1));
    exec(&mut ctrl, Core::One, Instr::load(t2));
    exec(&mut ctrl, Core::One, Instr::load(t3));
    assert_eq!(state(&ctrl, Core::One, t1), None);
    assert_eq!(state(&ctrl, Core::One, t2), Some(Exclusive));
    assert_eq!(state(&ctrl, Core::One, t3), Some(Exclusive));

    // touching t2 makes t3 the next victim
    assert_eq!(exec(&mut ctrl, Core::One, Instr::load(t2)), vec![Outcome::L1Hit]);
    exec(&mut ctrl, Core::One, Instr::load(t1));
    assert_eq!(state(&ctrl, Core::One, t3), None);
    assert_eq!(state(&ctrl, Core::One, t2), Some(Exclusive));
}

#[test]
fn distinct_loads_miss_everywhere() {
    let mut ctrl = Controller::new(&SYSTEM);
    let n = 100;
    for i in 0..n {
        assert_eq!(exec(&mut ctrl, Core::One, Instr::load(i * 32)), vec![Outcome::L1MissL2Miss]);
    }
    let stats = ctrl.stats();
    assert_eq!(stats.l1_misses, [n, 0]);
    assert_eq!(stats.l2_misses, n);
    assert_eq!(stats.cycles, [n, 0]);
}

#[test]
fn unknown_mode_changes_nothing() {
    let mut ctrl = Controller::new(&SYSTEM);
    let instr = Instr { addr: Addr(A), mode: Mode::Other("X".into()) };
    assert_eq!(exec(&mut ctrl, Core::One, instr), vec![Outcome::InvalidAction]);
    assert_eq!(state(&ctrl, Core::One, A), None);
    assert_eq!(ctrl.l2().peek(Addr(A)), None);
    assert_eq!(ctrl.stats().cycles, [1, 0]);
    assert_eq!(ctrl.stats().invalid_actions, 1);
}

// deterministic xorshift so the walk is reproducible
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

#[test]
fn random_walk_keeps_coherence_invariants() {
    let mut ctrl = Controller::new(&SYSTEM);
    let mut rng = Rng(0x9e37_79b9_7f4a_7c15);

    // blocks that collide in L1 sets (bit 21+) and in L2 (bit 17+)
    let pool: Vec<u64> = (0..3u64)
        .flat_map(|k| (0..3u64).map(move |j| 0x40 + (k << 21) + (j << 17)))
        .collect();

    for _ in 0..5000 {
        let core = if rng.next() % 2 == 0 { Core::One } else { Core::Two };
        let addr = pool[(rng.next() % pool.len() as u64) as usize] + rng.next() % 32;
        let instr = if rng.next() % 3 == 0 { Instr::store(addr) } else { Instr::load(addr) };
        exec(&mut ctrl, core, instr);

        for &a in &pool {
            let s1 = state(&ctrl, Core::One, a).filter(|s| s.is_valid());
            let s2 = state(&ctrl, Core::Two, a).filter(|s| s.is_valid());
            let both = [s1, s2];
            let modified = both.iter().filter(|s| **s == Some(Modified)).count();
            assert!(modified <= 1, "two modified copies of {:#x}", a);
            if both.contains(&Some(Shared)) {
                assert!(!both.contains(&Some(Modified)), "shared and modified copies of {:#x}", a);
                assert!(!both.contains(&Some(Exclusive)), "shared and exclusive copies of {:#x}", a);
            }
            if s1.is_some() || s2.is_some() {
                assert!(ctrl.l2().peek(Addr(a)).is_some(), "{:#x} cached in L1 but not in L2", a);
            }
        }
    }
    assert_eq!(ctrl.stats().invalid_states, 0);
}
