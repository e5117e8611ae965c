use std::fmt;

use anyhow::{bail, Result};

/// Bit layout of one cache level. Addresses read as `tag | index | offset`,
/// tag being the most significant field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub offset_bits: u32,
    pub index_bits: u32,
}

impl Geometry {
    pub const fn num_sets(&self) -> usize {
        1 << self.index_bits
    }
    pub const fn tag_shift(&self) -> u32 {
        self.offset_bits + self.index_bits
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemSpec {         // unit         reasonable defaults
    pub l1: Geometry,           // bits         offset 5, index 16
    pub l2: Geometry,           // bits         offset 5, index 12
    pub core1_burst: usize,     // instrs       3
    pub core2_burst: usize,     // instrs       1
}

pub const L1_ASSOC: usize = 2;  // blocks per L1 set
pub const L2_ASSOC: usize = 1;  // direct-mapped

/// sets are allocated up front, keep that bounded
pub const MAX_INDEX_BITS: u32 = 24;

pub const SYSTEM: SystemSpec = SystemSpec {
    l1: Geometry { offset_bits: 5, index_bits: 16 },
    l2: Geometry { offset_bits: 5, index_bits: 12 },
    core1_burst: 3,
    core2_burst: 1,
};

impl Default for SystemSpec {
    fn default() -> Self {
        SYSTEM
    }
}

impl SystemSpec {
    pub fn validate(&self) -> Result<()> {
        for (name, geo) in [("L1", &self.l1), ("L2", &self.l2)] {
            if geo.tag_shift() >= u64::BITS {
                bail!("{} geometry leaves no tag bits: {:?}", name, geo);
            }
            if geo.index_bits > MAX_INDEX_BITS {
                bail!("{} index width {} exceeds {} bits", name, geo.index_bits, MAX_INDEX_BITS);
            }
        }
        if self.core1_burst == 0 || self.core2_burst == 0 {
            bail!(
                "issue bursts must be non-zero (core 1: {}, core 2: {})",
                self.core1_burst,
                self.core2_burst
            );
        }
        Ok(())
    }
}

// addresses

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fields {
    pub index: usize,
    pub tag: u64,
    pub offset: u64,
}

fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

impl Addr {
    /// split this address into index, tag and offset under the given geometry
    pub fn decode(self, geo: &Geometry) -> Fields {
        Fields {
            index: ((self.0 >> geo.offset_bits) & mask(geo.index_bits)) as usize,
            tag: self.0 >> geo.tag_shift(),
            offset: self.0 & mask(geo.offset_bits),
        }
    }
    pub fn encode(fields: Fields, geo: &Geometry) -> Addr {
        Addr(
            (fields.tag << geo.tag_shift())
                | ((fields.index as u64 & mask(geo.index_bits)) << geo.offset_bits)
                | (fields.offset & mask(geo.offset_bits)),
        )
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// line states

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MesiState {
    Modified,
    Exclusive,
    Shared,
    #[default]
    Invalid,
}

impl MesiState {
    /// usable for a hit: one of M, E, S
    pub fn is_valid(self) -> bool {
        matches!(self, MesiState::Modified | MesiState::Exclusive | MesiState::Shared)
    }
    pub fn letter(self) -> char {
        match self {
            MesiState::Modified => 'M',
            MesiState::Exclusive => 'E',
            MesiState::Shared => 'S',
            MesiState::Invalid => 'I',
        }
    }
}

/// valid-hit test on a lookup result; `None` means the tag is not present
pub fn is_hit(state: Option<MesiState>) -> bool {
    state.map_or(false, MesiState::is_valid)
}

// cores

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Core {
    One,
    Two,
}

impl Core {
    pub fn index(self) -> usize {
        match self {
            Core::One => 0,
            Core::Two => 1,
        }
    }
    pub fn peer(self) -> Core {
        match self {
            Core::One => Core::Two,
            Core::Two => Core::One,
        }
    }
}

impl fmt::Display for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CPU{}", self.index() + 1)
    }
}

// instructions

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Load,
    Store,
    /// anything the trace carried that is neither `L` nor `S`
    Other(String),
}

impl Mode {
    pub fn parse(token: &str) -> Mode {
        match token {
            "L" => Mode::Load,
            "S" => Mode::Store,
            other => Mode::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Load => write!(f, "L"),
            Mode::Store => write!(f, "S"),
            Mode::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instr {
    pub addr: Addr,
    pub mode: Mode,
}

impl Instr {
    pub fn load(addr: u64) -> Self {
        Instr { addr: Addr(addr), mode: Mode::Load }
    }
    pub fn store(addr: u64) -> Self {
        Instr { addr: Addr(addr), mode: Mode::Store }
    }
}
