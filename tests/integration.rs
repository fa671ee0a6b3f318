//! End-to-end integration tests for the firmware harness
//!
//! These tests drive scenarios:
//! 1. Through the library against the simulated firmware
//! 2. Through the `harness` binary with `--simulate`
//! 3. Over the bridge transport, with `mock_device` standing in for the bridge

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use harness::common::config::DeviceConfig;
use harness::device::bridge::BridgeTransport;
use harness::device::loopback::{Loopback, SentLog, SentMessage};
use harness::device::protocol::CommandType;
use harness::device::sim::SimulatedFirmware;
use harness::device::{Device, Frame};
use harness::scenario::fixture;
use harness::scenario::{run_sequence, Bench, ScenarioBuilder};

const OPCODE: u16 = 0x2B0A;

/// Test context with an isolated home for config and log files
struct TestContext {
    temp_dir: tempfile::TempDir,
    harness_bin: PathBuf,
    fixtures_dir: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().expect("Failed to create temp dir"),
            harness_bin: PathBuf::from(env!("CARGO_BIN_EXE_harness")),
            fixtures_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("tests")
                .join("fixtures"),
        }
    }

    fn fixture(&self, name: &str) -> PathBuf {
        self.fixtures_dir.join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write test file");
        path
    }

    /// Run the harness binary with config and data dirs inside the temp dir
    fn harness(&self, args: &[&str]) -> Output {
        let home = self.temp_dir.path();
        Command::new(&self.harness_bin)
            .args(args)
            .env("HOME", home)
            .env("XDG_CONFIG_HOME", home.join("config"))
            .env("XDG_DATA_HOME", home.join("data"))
            .env("RUST_LOG", "harness=debug")
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to run harness")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn quick_device_config() -> DeviceConfig {
    DeviceConfig {
        settle_delay_ms: 0,
        reboot_wait_secs: 0,
    }
}

fn simulated_bench() -> (Bench, SentLog) {
    let loopback = Loopback::with_firmware(SimulatedFirmware::new(OPCODE));
    let log = loopback.log();
    let device = Device::new(Box::new(loopback), &quick_device_config());
    (Bench::new(device, OPCODE), log)
}

fn load_scenario(path: &Path) -> harness::Scenario {
    fixture::load_scenario(path)
        .expect("Failed to load fixture")
        .to_scenario("fixture")
        .expect("Invalid fixture")
}

// ============== Library ==============

#[test]
fn test_state_update_answered_by_device() {
    // the device reports one aggregator field for every switch command
    let loopback = Loopback::with_responder(|message| match message {
        SentMessage::Command {
            command: CommandType::Switch,
            ..
        } => vec![Frame::new(
            OPCODE,
            b"0x1A2B@SwitchAggregator::compute@overrideState@-1".to_vec(),
        )],
        _ => Vec::new(),
    });
    let device = Device::new(Box::new(loopback), &quick_device_config());
    let mut bench = Bench::new(device, OPCODE);

    bench.device().switch(0).unwrap();

    let store = bench.store();
    assert_eq!(store.get_value("SwitchAggregator", "overrideState"), Some("-1"));
    assert_eq!(
        store.assert_failures("SwitchAggregator", "overrideState", &["0", "-1"]),
        Some(vec![])
    );
    assert_eq!(
        store.assert_failures("SwitchAggregator", "overrideState", &["0"]),
        Some(vec!["0x1A2B".to_string()])
    );
}

#[test]
fn test_fixture_scenario_passes_on_simulated_firmware() {
    let ctx = TestContext::new();
    let (mut bench, log) = simulated_bench();

    let outcome = load_scenario(&ctx.fixture("switchcraft.json")).run(&mut bench);

    assert!(outcome.passed(), "{outcome}");
    assert_eq!(outcome.to_string(), "Result: Success (switchcraft toggles)");
    assert_eq!(log.clock_sets(), vec![259_200 + 32_400, 259_200 + 36_000, 259_200 + 39_600]);
}

#[test]
fn test_failed_expectation_reports_line_and_actual_value() {
    let (mut bench, _log) = simulated_bench();
    let mut builder = ScenarioBuilder::new("override");

    builder.set_time(9, 30, None);
    builder.add_command(|device| device.switch(10));
    builder.set_comment("override follows the switch");
    builder.add_expect("SwitchAggregator", "overrideState", "42", None);
    let expect_line = line!() - 1;

    let outcome = builder.build().run(&mut bench);
    let text = outcome.to_string();

    assert!(!outcome.passed());
    assert!(text.contains("override at 09:30h: "), "{text}");
    assert!(
        text.ends_with(&format!(
            "expected SwitchAggregator.overrideState == 42, got 10: Line {expect_line}: override follows the switch"
        )),
        "{text}"
    );
}

#[test]
fn test_fail_fast_leaves_device_untouched() {
    let (mut bench, log) = simulated_bench();
    let ran = Arc::new(AtomicBool::new(false));
    let mut builder = ScenarioBuilder::new("fail fast");

    builder.add_command(|device| device.switch(10));
    builder.add_expect("SwitchAggregator", "overrideState", "99", Some("must fail"));
    let flag = Arc::clone(&ran);
    builder.add_event(move |bench| {
        flag.store(true, Ordering::SeqCst);
        bench.device().switch(20).err().map(|e| e.to_string())
    });

    let outcome = builder.build().run(&mut bench);

    assert!(outcome.to_string().contains("must fail"));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(log.payloads_of(CommandType::Switch), vec![vec![10]]);
}

#[test]
fn test_missing_type_is_not_a_pass() {
    let (mut bench, _log) = simulated_bench();
    let mut builder = ScenarioBuilder::new("nothing reported");
    builder.add_expect("TwilightHandler", "isActive", "True", Some("before any command"));

    let text = builder.build().run(&mut bench).to_string();
    assert!(text.contains("no value found for TwilightHandler.isActive"), "{text}");
}

#[test]
fn test_run_sequence_starts_each_scenario_from_clean_state() {
    let (mut bench, _log) = simulated_bench();

    let mut first = ScenarioBuilder::new("first");
    first.add_command(|device| device.switch(30));
    first.add_expect("SwitchAggregator", "overrideState", "30", None);

    // no command: the state seen by "first" must be gone
    let mut second = ScenarioBuilder::new("second");
    second.add_expect("SwitchAggregator", "overrideState", "30", None);

    let outcomes = run_sequence(&mut bench, vec![first.build(), second.build()]);
    assert!(outcomes[0].passed());
    assert!(!outcomes[1].passed());
}

// ============== Binary ==============

#[test]
fn test_run_prints_results_and_exits_zero_on_failure() {
    let ctx = TestContext::new();
    let failing = ctx.write(
        "failing.yaml",
        "name: failing\n\
         events:\n\
         \x20 - guid: e4a0c2b6-1d3f-4a5b-8c7d-9e0f1a2b3c4d\n\
         \x20   time: 32400\n\
         \x20   commandname: switch\n\
         \x20   arguments: ['10']\n\
         \x20 - guid: f5b1d3c7-2e4a-4b6c-9d8e-0f1a2b3c4d5e\n\
         \x20   time: 32400\n\
         \x20   commandname: expect\n\
         \x20   arguments: [SwitchAggregator, overrideState, '42']\n",
    );
    let passing = ctx.fixture("switchcraft.json");

    let output = ctx.harness(&[
        "run",
        "--simulate",
        failing.to_str().unwrap(),
        passing.to_str().unwrap(),
    ]);
    let out = stdout(&output);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(out.contains("Result: Failure ("), "{out}");
    assert!(
        out.contains("failing at 09:00h: [event f5b1d3c7-2e4a-4b6c-9d8e-0f1a2b3c4d5e]"),
        "{out}"
    );
    assert!(out.contains("expected SwitchAggregator.overrideState == 42, got 10"), "{out}");
    assert!(out.contains("Result: Success (switchcraft toggles)"), "{out}");
}

#[test]
fn test_run_rejects_invalid_fixture_before_running() {
    let ctx = TestContext::new();
    let bad = ctx.write(
        "bad.json",
        r#"{"events": [{"guid": "not-a-uuid", "time": null, "commandname": "switchcraft", "arguments": []}]}"#,
    );

    let output = ctx.harness(&["run", "--simulate", bad.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(!stdout(&output).contains("Result:"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not-a-uuid"));
}

#[test]
fn test_check_fixtures() {
    let ctx = TestContext::new();
    let scenario = ctx.fixture("switchcraft.json");
    let store = ctx.fixture("behaviour_store.json");

    let output = ctx.harness(&["check", scenario.to_str().unwrap(), store.to_str().unwrap()]);
    let out = stdout(&output);
    assert!(output.status.success(), "{out}");
    assert!(out.contains("scenario, 12 events"), "{out}");
    assert!(out.contains("behaviour store, 2 entries"), "{out}");

    let unknown = ctx.write(
        "unknown.json",
        r#"{"events": [{"guid": "a1b2c3d4e5f60718293a4b5c6d7e8f90", "time": 3600, "commandname": "dance", "arguments": []}]}"#,
    );
    let output = ctx.harness(&["check", unknown.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("unknown command 'dance'"));
}

#[test]
fn test_bad_config_is_a_harness_error() {
    let ctx = TestContext::new();
    let config = ctx.write("config.toml", "[device]\nsettle_delay = 3\n");
    let scenario = ctx.fixture("switchcraft.json");

    let output = ctx.harness(&[
        "--config",
        config.to_str().unwrap(),
        "run",
        "--simulate",
        scenario.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
}

// ============== Bridge ==============

fn mock_device_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mock_device"))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_over_bridge() {
    let ctx = TestContext::new();
    let transport = BridgeTransport::spawn(&mock_device_bin(), &[])
        .await
        .expect("Failed to start mock device");
    // frames arrive on the reader task; give them time before each check
    let config = DeviceConfig {
        settle_delay_ms: 200,
        reboot_wait_secs: 0,
    };
    let bench = Bench::new(Device::new(Box::new(transport), &config), OPCODE);
    let scenario = load_scenario(&ctx.fixture("switchcraft.json"));

    let (bench, outcome) = tokio::task::spawn_blocking(move || {
        let mut bench = bench;
        let outcome = scenario.run(&mut bench);
        (bench, outcome)
    })
    .await
    .unwrap();
    drop(bench);

    assert!(outcome.passed(), "{outcome}");
}

#[test]
fn test_binary_run_over_bridge() {
    let ctx = TestContext::new();
    let config = ctx.write(
        "config.toml",
        &format!(
            "[bridge]\nprogram = {:?}\n\n[device]\nsettle_delay_ms = 200\n",
            mock_device_bin().display().to_string()
        ),
    );
    let scenario = ctx.fixture("switchcraft.json");

    let output = ctx.harness(&[
        "--config",
        config.to_str().unwrap(),
        "run",
        scenario.to_str().unwrap(),
    ]);
    let out = stdout(&output);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(out.contains("Result: Success (switchcraft toggles)"), "{out}");
}

#[test]
fn test_missing_bridge_is_reported() {
    let ctx = TestContext::new();
    let config = ctx.write("config.toml", "[bridge]\nprogram = \"no-such-bridge-program\"\n");
    let scenario = ctx.fixture("switchcraft.json");

    let output = ctx.harness(&[
        "--config",
        config.to_str().unwrap(),
        "run",
        scenario.to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no-such-bridge-program"));
}
