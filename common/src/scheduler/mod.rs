// Scheduler module: the clock/trigger loop that turns due entries into
// executed transitions

pub mod engine;

pub use engine::{Scheduler, SchedulerEngine};
