//! Periodic timer registry for the vigil monitoring daemon.
//!
//! Timers live in the registry's arena and are addressed by [`TimerId`]
//! handles. Started timers are swept by [`TimerRegistry::run_expiry_sweep`],
//! normally driven by an [`EventLoop`].

mod arena;
pub mod clock;
pub mod error;
pub mod event_loop;
pub mod metrics;
pub mod registry;
pub mod timer;

pub use arena::TimerId;
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use error::TimerError;
pub use event_loop::{EventLoop, Tick};
pub use metrics::RegistryMetrics;
pub use registry::{SweepReport, TimerRegistry};
pub use timer::{FireContext, SubscriptionId, Timer, TimerCallback, TimerEvent, UserArgs};
