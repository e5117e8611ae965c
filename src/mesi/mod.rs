mod cache;
mod common;
mod controller;
mod event;
mod scheduler;

pub use cache::{Cache, CacheLine, CacheSet, L1Cache, L2Cache, Snooped};
pub use common::*;
pub use controller::Controller;
pub use event::*;
pub use scheduler::Scheduler;
