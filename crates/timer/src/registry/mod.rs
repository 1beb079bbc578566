//! Timer registry -- non-owning handles to started timers, the cached next
//! wake time, and the expiry sweep.
//!
//! Split into focused submodules:
//! - `core`: registry struct, timer ownership handoff, start/stop, accessors
//! - `scheduling`: lazy next-wake computation
//! - `sweep`: expiry sweep, dispatch, and direct fire

mod core;
mod scheduling;
mod sweep;

pub use self::core::TimerRegistry;
pub use self::sweep::SweepReport;
