//! Time-ordered test scenarios against a device under test
//!
//! A [`ScenarioBuilder`] collects `(simulated time, action)` pairs. The built
//! [`Scenario`] sorts them, sets the device clock whenever the simulated time
//! changes and stops at the first action reporting a diagnostic.

mod bench;
mod builder;
pub mod expect;
pub mod fixture;
mod runner;

use std::fmt;

pub use bench::Bench;
pub use builder::{sim_time, ScenarioBuilder, DAY_ORIGIN, SECONDS_PER_DAY};
pub use runner::{run_sequence, Scenario, ScenarioFailure, ScenarioOutcome};

/// `None` (or an empty diagnostic) is success, anything else is a failure
pub type Outcome = Option<String>;

/// The deferred work of one action
pub type Operation = Box<dyn FnOnce(&mut Bench) -> Outcome + Send>;

/// When an action runs
///
/// Setup actions run before all timed ones, without touching the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SimTime {
    Setup,
    At(u32),
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimTime::Setup => write!(f, "at setup time"),
            SimTime::At(t) => write!(f, "at {}h", crate::device::format_clock(*t)),
        }
    }
}

/// One queued step of a scenario
pub struct Action {
    pub time: SimTime,
    /// Fixture event this action came from
    pub guid: Option<String>,
    pub operation: Operation,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("time", &self.time)
            .field("guid", &self.guid)
            .finish_non_exhaustive()
    }
}

pub(crate) fn is_failure(outcome: &Outcome) -> bool {
    outcome.as_deref().is_some_and(|diag| !diag.is_empty())
}
