use std::panic::Location;
use std::time::Duration;

use crate::common::Result;
use crate::device::Device;

use super::expect::{expect_any, expect_one};
use super::runner::Scenario;
use super::{Action, Bench, Outcome, SimTime};

pub const SECONDS_PER_DAY: u32 = 86_400;

/// Day 0 of simulated time; chosen so weekdays line up with the device calendar
pub const DAY_ORIGIN: u32 = 3 * SECONDS_PER_DAY;

/// Absolute device time for a wall clock time, optionally on a given day
///
/// Without a day the result is plain seconds since midnight.
pub fn sim_time(hours: u32, minutes: u32, day: Option<u32>) -> u32 {
    let time_of_day = hours.saturating_mul(3600).saturating_add(minutes.saturating_mul(60));
    match day {
        Some(day) => day
            .saturating_add(3)
            .saturating_mul(SECONDS_PER_DAY)
            .saturating_add(time_of_day),
        None => time_of_day,
    }
}

/// Collects the actions of one scenario
///
/// Every action is stamped with the current time cursor; expectations default
/// their message to the current comment.
pub struct ScenarioBuilder {
    name: String,
    actions: Vec<Action>,
    time_cursor: SimTime,
    comment_cursor: Option<String>,
    guid_cursor: Option<String>,
}

impl ScenarioBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            time_cursor: SimTime::Setup,
            comment_cursor: None,
            guid_cursor: None,
        }
    }

    pub fn time_cursor(&self) -> SimTime {
        self.time_cursor
    }

    /// Move the time cursor, returning the absolute device time
    pub fn set_time(&mut self, hours: u32, minutes: u32, day: Option<u32>) -> u32 {
        let time = sim_time(hours, minutes, day);
        self.time_cursor = SimTime::At(time);
        time
    }

    /// Move the time cursor to `seconds` past midnight of day 0
    pub fn set_time_since_midnight(&mut self, seconds: u32) -> u32 {
        let time = DAY_ORIGIN.saturating_add(seconds);
        self.time_cursor = SimTime::At(time);
        time
    }

    /// Subsequent actions are setup actions again
    pub fn clear_time(&mut self) {
        self.time_cursor = SimTime::Setup;
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment_cursor = Some(comment.into());
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment_cursor.as_deref()
    }

    pub fn clear_comment(&mut self) {
        self.comment_cursor = None;
    }

    /// Tag subsequent actions with a fixture event id
    pub fn set_guid(&mut self, guid: Option<String>) {
        self.guid_cursor = guid;
    }

    /// Queue an arbitrary action at the current time
    pub fn add_event<F>(&mut self, operation: F)
    where
        F: FnOnce(&mut Bench) -> Outcome + Send + 'static,
    {
        self.actions.push(Action {
            time: self.time_cursor,
            guid: self.guid_cursor.clone(),
            operation: Box::new(operation),
        });
    }

    /// Queue a device command; a send error becomes the diagnostic
    pub fn add_command<F>(&mut self, command: F)
    where
        F: FnOnce(&mut Device) -> Result<()> + Send + 'static,
    {
        self.add_event(move |bench| command(bench.device()).err().map(|e| e.to_string()));
    }

    /// Queue an expectation that `type_tag.field == expected`
    #[track_caller]
    pub fn add_expect(
        &mut self,
        type_tag: &str,
        field: &str,
        expected: &str,
        message: Option<&str>,
    ) {
        let message = self.expect_message(message, Location::caller());
        let (type_tag, field, expected) =
            (type_tag.to_string(), field.to_string(), expected.to_string());
        self.add_event(move |bench| expect_one(bench, &type_tag, &field, &expected, &message));
    }

    /// Queue an expectation that `type_tag.field` is one of `expected`
    #[track_caller]
    pub fn add_expect_any<S: AsRef<str>>(
        &mut self,
        type_tag: &str,
        field: &str,
        expected: &[S],
        message: Option<&str>,
    ) {
        let message = self.expect_message(message, Location::caller());
        let (type_tag, field) = (type_tag.to_string(), field.to_string());
        let expected: Vec<String> = expected.iter().map(|e| e.as_ref().to_string()).collect();
        self.add_event(move |bench| expect_any(bench, &type_tag, &field, &expected, &message));
    }

    fn expect_message(&self, message: Option<&str>, caller: &Location<'_>) -> String {
        let text = message.or(self.comment_cursor.as_deref()).unwrap_or_default();
        format!("Line {}: {text}", caller.line())
    }

    /// Queue a pause
    pub fn wait(&mut self, duration: Duration) {
        self.add_event(move |_| {
            tracing::debug!(secs = duration.as_secs_f64(), "Waiting");
            std::thread::sleep(duration);
            None
        });
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn build(self) -> Scenario {
        Scenario::new(self.name, self.actions)
    }
}
