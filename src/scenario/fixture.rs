//! Persisted scenario and behaviour fixtures
//!
//! Fixtures are JSON (or YAML, by extension) documents holding a list of
//! records, each with a uuid `guid`. Records are typed and checked up front:
//! unknown fields, unknown commands and bad arguments are rejected before
//! anything is sent to a device.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{Error, Result};

use super::builder::SECONDS_PER_DAY;
use super::expect::{expect_any, expect_one};
use super::{Scenario, ScenarioBuilder};

/// A scenario as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub events: Vec<ScenarioEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioEvent {
    pub guid: String,
    /// Seconds since midnight; `None` for setup events
    pub time: Option<u32>,
    pub commandname: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// A behaviour store as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviourDocument {
    pub entries: Vec<BehaviourEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviourEntry {
    pub guid: String,
    pub index: u8,
    /// Seconds since midnight
    pub fromfield: u32,
    pub untilfield: u32,
    pub intensityfield: u8,
    pub fromuntil_reversed_field: bool,
    pub typefield: BehaviourKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviourKind {
    Switch,
    Twilight,
}

/// Either kind of fixture, told apart by its record list
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureDocument {
    Scenario(ScenarioDocument),
    Behaviour(BehaviourDocument),
}

/// What a scenario event does
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureCommand {
    Wait(Duration),
    Comment(String),
    Expect {
        type_tag: String,
        field: String,
        value: String,
    },
    ExpectAny {
        type_tag: String,
        field: String,
        values: Vec<String>,
    },
    Switch(u8),
    Switchcraft,
    ResetAggregator,
    ResetAggregatorEvent,
    ClearOverride,
    ClearAggregated,
    ClearOverrideAndAggregated,
    ClearBehaviourStore,
    AllowDimming(bool),
    DumbMode(bool),
}

impl TryFrom<&ScenarioEvent> for FixtureCommand {
    type Error = Error;

    fn try_from(event: &ScenarioEvent) -> Result<Self> {
        let guid = event.guid.as_str();
        // editors store an empty argument list as [""]
        let args: Vec<&str> = event
            .arguments
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();

        let command = match event.commandname.trim() {
            "wait" => {
                let [secs] = exact::<1>(guid, &args)?;
                let secs: f64 = secs
                    .parse()
                    .map_err(|_| Error::fixture_event(guid, format!("invalid wait '{secs}'")))?;
                let wait = Duration::try_from_secs_f64(secs)
                    .map_err(|_| Error::fixture_event(guid, format!("invalid wait '{secs}'")))?;
                FixtureCommand::Wait(wait)
            }
            "comment" => {
                if args.is_empty() {
                    return Err(Error::fixture_event(guid, "comment needs text"));
                }
                FixtureCommand::Comment(event.arguments.join(",").trim().to_string())
            }
            "expect" => {
                let [type_tag, field, value] = exact::<3>(guid, &args)?;
                FixtureCommand::Expect {
                    type_tag: type_tag.to_string(),
                    field: field.to_string(),
                    value: value.to_string(),
                }
            }
            "expect_any" => match args.as_slice() {
                [type_tag, field, values @ ..] if !values.is_empty() => FixtureCommand::ExpectAny {
                    type_tag: type_tag.to_string(),
                    field: field.to_string(),
                    values: values.iter().map(|v| v.to_string()).collect(),
                },
                _ => {
                    return Err(Error::fixture_event(
                        guid,
                        "expect_any needs a type, a field and at least one value",
                    ))
                }
            },
            "switch" => {
                let [value] = exact::<1>(guid, &args)?;
                let value = value.parse().map_err(|_| {
                    Error::fixture_event(guid, format!("switch value '{value}' is not in 0..=255"))
                })?;
                FixtureCommand::Switch(value)
            }
            "switchcraft" => none(guid, &args, FixtureCommand::Switchcraft)?,
            "reset_aggregator" => none(guid, &args, FixtureCommand::ResetAggregator)?,
            "reset_aggregator_event" => none(guid, &args, FixtureCommand::ResetAggregatorEvent)?,
            "clear_override" => none(guid, &args, FixtureCommand::ClearOverride)?,
            "clear_aggregated" => none(guid, &args, FixtureCommand::ClearAggregated)?,
            "clear_override_and_aggregated" => {
                none(guid, &args, FixtureCommand::ClearOverrideAndAggregated)?
            }
            "clear_behaviour_store" => none(guid, &args, FixtureCommand::ClearBehaviourStore)?,
            "allow_dimming" => {
                let [flag] = exact::<1>(guid, &args)?;
                FixtureCommand::AllowDimming(parse_flag(guid, flag)?)
            }
            "dumb_mode" => {
                let [flag] = exact::<1>(guid, &args)?;
                FixtureCommand::DumbMode(parse_flag(guid, flag)?)
            }
            other => {
                return Err(Error::fixture_event(guid, format!("unknown command '{other}'")));
            }
        };
        Ok(command)
    }
}

fn exact<'a, const N: usize>(guid: &str, args: &[&'a str]) -> Result<[&'a str; N]> {
    <[&'a str; N]>::try_from(args).map_err(|_| {
        Error::fixture_event(guid, format!("expected {N} argument(s), got {}", args.len()))
    })
}

fn none(guid: &str, args: &[&str], command: FixtureCommand) -> Result<FixtureCommand> {
    exact::<0>(guid, args).map(|_| command)
}

fn parse_flag(guid: &str, flag: &str) -> Result<bool> {
    match flag.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" => Ok(false),
        _ => Err(Error::fixture_event(guid, format!("'{flag}' is not a boolean"))),
    }
}

fn check_guid<'a>(guid: &'a str, seen: &mut HashSet<&'a str>) -> Result<()> {
    Uuid::parse_str(guid)
        .map_err(|_| Error::fixture_event(guid, "guid is not a uuid"))?;
    if !seen.insert(guid) {
        return Err(Error::fixture_event(guid, "duplicate guid"));
    }
    Ok(())
}

/// A fresh guid in the form fixture editors write
pub fn new_guid() -> String {
    Uuid::new_v4().simple().to_string()
}

impl ScenarioDocument {
    /// Check every event, returning the parsed commands in document order
    pub fn validate(&self) -> Result<Vec<FixtureCommand>> {
        let mut seen = HashSet::new();
        self.events
            .iter()
            .map(|event| {
                check_guid(&event.guid, &mut seen)?;
                if let Some(time) = event.time {
                    if time > SECONDS_PER_DAY {
                        return Err(Error::fixture_event(
                            &event.guid,
                            format!("time {time} is past the end of the day"),
                        ));
                    }
                }
                FixtureCommand::try_from(event)
            })
            .collect()
    }

    /// Rehydrate into a runnable scenario
    pub fn to_scenario(&self, fallback_name: &str) -> Result<Scenario> {
        let commands = self.validate()?;
        let name = self.name.as_deref().unwrap_or(fallback_name);
        let mut builder = ScenarioBuilder::new(name);

        for (event, command) in self.events.iter().zip(commands) {
            builder.set_guid(Some(event.guid.clone()));
            match event.time {
                Some(seconds) => {
                    builder.set_time_since_midnight(seconds);
                }
                None => builder.clear_time(),
            }
            queue_command(&mut builder, command);
        }

        Ok(builder.build())
    }
}

fn queue_command(builder: &mut ScenarioBuilder, command: FixtureCommand) {
    match command {
        FixtureCommand::Wait(duration) => builder.wait(duration),
        FixtureCommand::Comment(comment) => builder.set_comment(comment),
        FixtureCommand::Expect {
            type_tag,
            field,
            value,
        } => {
            let message = builder.comment().unwrap_or_default().to_string();
            builder.add_event(move |bench| expect_one(bench, &type_tag, &field, &value, &message));
        }
        FixtureCommand::ExpectAny {
            type_tag,
            field,
            values,
        } => {
            let message = builder.comment().unwrap_or_default().to_string();
            builder.add_event(move |bench| expect_any(bench, &type_tag, &field, &values, &message));
        }
        FixtureCommand::Switch(value) => builder.add_command(move |d| d.switch(value)),
        FixtureCommand::Switchcraft => builder.add_command(|d| d.switchcraft()),
        FixtureCommand::ResetAggregator => {
            builder.add_command(|d| d.reset_aggregator_via_switch_value())
        }
        FixtureCommand::ResetAggregatorEvent => {
            builder.add_command(|d| d.reset_aggregator_via_event())
        }
        FixtureCommand::ClearOverride => builder.add_command(|d| d.clear_override()),
        FixtureCommand::ClearAggregated => builder.add_command(|d| d.clear_aggregated()),
        FixtureCommand::ClearOverrideAndAggregated => {
            builder.add_command(|d| d.clear_override_and_aggregated())
        }
        FixtureCommand::ClearBehaviourStore => builder.add_command(|d| d.clear_behaviour_store()),
        FixtureCommand::AllowDimming(allowed) => {
            builder.add_command(move |d| d.set_allow_dimming(allowed))
        }
        FixtureCommand::DumbMode(dumb) => builder.add_command(move |d| d.set_dumb_mode(dumb)),
    }
}

impl BehaviourDocument {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut indices = HashSet::new();
        for entry in &self.entries {
            check_guid(&entry.guid, &mut seen)?;
            if !indices.insert(entry.index) {
                return Err(Error::fixture_event(
                    &entry.guid,
                    format!("behaviour index {} is used twice", entry.index),
                ));
            }
            for (label, time) in [("from", entry.fromfield), ("until", entry.untilfield)] {
                if time >= SECONDS_PER_DAY {
                    return Err(Error::fixture_event(
                        &entry.guid,
                        format!("{label} time {time} is not a time of day"),
                    ));
                }
            }
            if entry.intensityfield > 100 {
                return Err(Error::fixture_event(
                    &entry.guid,
                    format!("intensity {} exceeds 100", entry.intensityfield),
                ));
            }
        }
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })
}

fn parse_value(path: &Path, content: &str) -> Result<serde_json::Value> {
    let parsed: std::result::Result<serde_json::Value, String> = if is_yaml(path) {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(content).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| Error::fixture(&path.display().to_string(), reason))
}

fn from_value<T: DeserializeOwned>(path: &Path, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::fixture(&path.display().to_string(), e.to_string()))
}

/// Load a fixture of either kind
pub fn load_document(path: &Path) -> Result<FixtureDocument> {
    let value = parse_value(path, &read(path)?)?;
    let is_scenario = value.get("events").is_some();
    let is_behaviour = value.get("entries").is_some();

    if is_scenario {
        from_value(path, value).map(FixtureDocument::Scenario)
    } else if is_behaviour {
        from_value(path, value).map(FixtureDocument::Behaviour)
    } else {
        Err(Error::fixture(
            &path.display().to_string(),
            "expected an 'events' or 'entries' list",
        ))
    }
}

pub fn load_scenario(path: &Path) -> Result<ScenarioDocument> {
    from_value(path, parse_value(path, &read(path)?)?)
}

pub fn load_behaviour(path: &Path) -> Result<BehaviourDocument> {
    from_value(path, parse_value(path, &read(path)?)?)
}

/// Write a fixture as pretty JSON
pub fn save_document<T: Serialize>(path: &Path, document: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(document)?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}

/// Scenario name for a fixture file without a `name`
pub fn default_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
