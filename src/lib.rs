//! A trace-driven simulator of two cores with private L1 caches and a shared
//! direct-mapped L2, kept coherent by a snooping MESI protocol.

pub mod mesi;
pub mod report;
pub mod trace;
