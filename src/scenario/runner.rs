//! Scenario execution
//!
//! Actions run in time order, setup actions first. The device clock is set
//! once per distinct simulated time; the first failing action ends the run.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use uuid::Uuid;

use super::{is_failure, Action, Bench, SimTime};

/// A built, not yet run, list of actions
///
/// Running consumes it: actions act on a real device and cannot be replayed.
#[derive(Debug)]
pub struct Scenario {
    name: String,
    actions: Vec<Action>,
}

impl Scenario {
    pub(super) fn new(name: String, actions: Vec<Action>) -> Self {
        Self { name, actions }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn run(self, bench: &mut Bench) -> ScenarioOutcome {
        let Scenario { name, mut actions } = self;
        // stable: equal times keep insertion order
        actions.sort_by_key(|a| a.time);

        tracing::info!(scenario = %name, actions = actions.len(), "Running scenario");

        let mut previous_time = None;
        for (step, action) in actions.into_iter().enumerate() {
            if let SimTime::At(time) = action.time {
                if previous_time != Some(time) {
                    if time == 0 {
                        tracing::warn!(step, "Not setting the reserved clock value 0");
                    } else {
                        previous_time = Some(time);
                        if let Err(e) = bench.device().set_time(time) {
                            return ScenarioFailure::new(
                                name,
                                action.time,
                                action.guid,
                                format!("failed to set time: {e}"),
                            )
                            .into();
                        }
                    }
                }
            }

            let operation = action.operation;
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| operation(bench))) {
                Ok(outcome) => outcome,
                Err(payload) => Some(format!("action panicked: {}", panic_message(&*payload))),
            };
            if is_failure(&outcome) {
                let diagnostic = outcome.unwrap_or_default();
                return ScenarioFailure::new(name, action.time, action.guid, diagnostic).into();
            }
        }

        tracing::info!(scenario = %name, "Scenario passed");
        ScenarioOutcome::Success { name }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Run scenarios one after another on fresh state
///
/// A failing scenario does not prevent the following ones from running.
pub fn run_sequence(bench: &mut Bench, scenarios: Vec<Scenario>) -> Vec<ScenarioOutcome> {
    scenarios
        .into_iter()
        .map(|scenario| {
            bench.clear_state();
            scenario.run(bench)
        })
        .collect()
}

/// Why a scenario stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioFailure {
    /// Also logged, to find the failure in the log file
    pub correlation: Uuid,
    pub scenario: String,
    pub time: SimTime,
    pub guid: Option<String>,
    pub diagnostic: String,
}

impl ScenarioFailure {
    fn new(scenario: String, time: SimTime, guid: Option<String>, diagnostic: String) -> Self {
        let failure = Self {
            correlation: Uuid::new_v4(),
            scenario,
            time,
            guid,
            diagnostic,
        };
        tracing::error!(
            correlation = %failure.correlation,
            scenario = %failure.scenario,
            time = %failure.time,
            guid = failure.guid.as_deref().unwrap_or_default(),
            diagnostic = %failure.diagnostic,
            "Scenario failed"
        );
        failure
    }
}

impl fmt::Display for ScenarioFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Result: Failure ({}): {} {}: ", self.correlation, self.scenario, self.time)?;
        if let Some(guid) = &self.guid {
            write!(f, "[event {guid}] ")?;
        }
        write!(f, "{}", self.diagnostic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Success { name: String },
    Failure(ScenarioFailure),
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ScenarioOutcome::Success { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            ScenarioOutcome::Success { name } => name,
            ScenarioOutcome::Failure(failure) => &failure.scenario,
        }
    }

    pub fn failure(&self) -> Option<&ScenarioFailure> {
        match self {
            ScenarioOutcome::Success { .. } => None,
            ScenarioOutcome::Failure(failure) => Some(failure),
        }
    }
}

impl From<ScenarioFailure> for ScenarioOutcome {
    fn from(failure: ScenarioFailure) -> Self {
        ScenarioOutcome::Failure(failure)
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioOutcome::Success { name } => write!(f, "Result: Success ({name})"),
            ScenarioOutcome::Failure(failure) => failure.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::common::config::DeviceConfig;
    use crate::device::loopback::{Loopback, SentLog};
    use crate::device::Device;
    use crate::scenario::ScenarioBuilder;

    fn bench() -> (Bench, SentLog) {
        let loopback = Loopback::new();
        let log = loopback.log();
        let config = DeviceConfig {
            settle_delay_ms: 0,
            reboot_wait_secs: 0,
        };
        (Bench::new(Device::new(Box::new(loopback), &config), 0x2B0A), log)
    }

    #[test]
    fn test_stable_order_and_coalesced_clock_sets() {
        let (mut bench, log) = bench();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut builder = ScenarioBuilder::new("ordering");

        let times = [None, Some(5), Some(3), Some(5), None];
        for (i, time) in times.into_iter().enumerate() {
            if let Some(t) = time {
                builder.set_time_since_midnight(t);
            } else {
                builder.clear_time();
            }
            let order = Arc::clone(&order);
            builder.add_event(move |_| {
                order.lock().unwrap().push(i);
                None
            });
        }

        let outcome = builder.build().run(&mut bench);
        assert!(outcome.passed());
        assert_eq!(*order.lock().unwrap(), vec![0, 4, 2, 1, 3]);
        assert_eq!(log.clock_sets(), vec![259_203, 259_205]);
    }

    #[test]
    fn test_fail_fast() {
        let (mut bench, _log) = bench();
        let c_ran = Arc::new(AtomicBool::new(false));
        let mut builder = ScenarioBuilder::new("fail fast");

        builder.add_event(|_| None);
        builder.add_event(|_| Some("X".to_string()));
        let flag = Arc::clone(&c_ran);
        builder.add_event(move |_| {
            flag.store(true, Ordering::SeqCst);
            None
        });

        let outcome = builder.build().run(&mut bench);
        let text = outcome.to_string();
        assert!(!outcome.passed());
        assert!(text.starts_with("Result: Failure ("));
        assert!(text.ends_with("fail fast at setup time: X"));
        assert!(!c_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_reserved_zero_time_is_never_sent() {
        let (mut bench, log) = bench();
        let mut builder = ScenarioBuilder::new("midnight");
        builder.set_time(0, 0, None);
        builder.add_event(|_| None);
        builder.set_time(9, 30, None);
        builder.add_event(|_| None);

        assert!(builder.build().run(&mut bench).passed());
        assert_eq!(log.clock_sets(), vec![34200]);
    }

    #[test]
    fn test_failure_shows_clock_and_event() {
        let (mut bench, _log) = bench();
        let mut builder = ScenarioBuilder::new("clock");
        builder.set_time(9, 30, None);
        builder.set_guid(Some("e1".to_string()));
        builder.add_event(|_| Some("broken".to_string()));

        let outcome = builder.build().run(&mut bench);
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.time, SimTime::At(34200));
        assert!(outcome.to_string().ends_with("clock at 09:30h: [event e1] broken"));
    }

    #[test]
    fn test_empty_diagnostic_counts_as_success() {
        let (mut bench, _log) = bench();
        let mut builder = ScenarioBuilder::new("empty");
        builder.add_event(|_| Some(String::new()));
        let outcome = builder.build().run(&mut bench);
        assert_eq!(outcome.to_string(), "Result: Success (empty)");
    }

    #[test]
    fn test_run_sequence_continues_after_failure() {
        let (mut bench, _log) = bench();
        let mut failing = ScenarioBuilder::new("first");
        failing.add_event(|_| Some("nope".to_string()));
        let mut passing = ScenarioBuilder::new("second");
        passing.add_event(|_| None);

        let outcomes = run_sequence(&mut bench, vec![failing.build(), passing.build()]);
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].passed());
        assert!(outcomes[1].passed());
        assert_eq!(outcomes[1].name(), "second");
    }

    #[test]
    fn test_panicking_action_becomes_failure() {
        let (mut bench, _log) = bench();
        let after_ran = Arc::new(AtomicBool::new(false));

        let mut faulty = ScenarioBuilder::new("faulty");
        faulty.set_time(8, 0, None);
        faulty.add_event(|_| panic!("op fault"));
        let flag = Arc::clone(&after_ran);
        faulty.add_event(move |_| {
            flag.store(true, Ordering::SeqCst);
            None
        });
        let mut passing = ScenarioBuilder::new("after");
        passing.add_event(|_| None);

        let outcomes = run_sequence(&mut bench, vec![faulty.build(), passing.build()]);
        assert_eq!(outcomes.len(), 2);
        let text = outcomes[0].to_string();
        assert!(text.starts_with("Result: Failure ("));
        assert!(text.ends_with("faulty at 08:00h: action panicked: op fault"));
        assert!(!after_ran.load(Ordering::SeqCst));
        assert_eq!(outcomes[1].to_string(), "Result: Success (after)");
    }

    #[test]
    fn test_panic_message_formats() {
        let owned = String::from("owned");
        assert_eq!(panic_message(&owned), "owned");
        assert_eq!(panic_message(&"borrowed"), "borrowed");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
