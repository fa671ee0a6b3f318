//! State expectations evaluated against the latest firmware state

use super::{Bench, Outcome};

/// Expect `type_tag.field` to equal `expected` on every object of that type
pub fn expect_one(
    bench: &mut Bench,
    type_tag: &str,
    field: &str,
    expected: &str,
    message: &str,
) -> Outcome {
    evaluate(bench, type_tag, field, &[expected], message)
}

/// Expect `type_tag.field` to be one of `expected` on every object of that type
pub fn expect_any<S: AsRef<str>>(
    bench: &mut Bench,
    type_tag: &str,
    field: &str,
    expected: &[S],
    message: &str,
) -> Outcome {
    evaluate(bench, type_tag, field, expected, message)
}

fn evaluate<S: AsRef<str>>(
    bench: &mut Bench,
    type_tag: &str,
    field: &str,
    expected: &[S],
    message: &str,
) -> Outcome {
    let verbose = bench.verbose();
    let store = bench.store();

    match store.assert_failures(type_tag, field, expected) {
        None => {
            if verbose {
                tracing::info!(state = %store, "No {type_tag} object reported");
            }
            Some(format!("no value found for {type_tag}.{field}: {message}"))
        }
        Some(failures) if failures.is_empty() => {
            if verbose {
                tracing::info!(
                    type_tag,
                    field,
                    value = store.get_value(type_tag, field).unwrap_or_default(),
                    "Expectation met"
                );
            }
            None
        }
        Some(failures) => {
            let actual = store.get_value(type_tag, field).unwrap_or("<not found>");
            if verbose {
                tracing::info!(handles = ?failures, state = %store, "Expectation not met");
            }
            // `actual` is the first object's value, which may have passed
            let failing = if store.objects_of(type_tag).nth(1).is_some() {
                format!(" (failing: {})", failures.join(", "))
            } else {
                String::new()
            };
            Some(format!(
                "expected {type_tag}.{field} {}, got {actual}{failing}: {message}",
                describe(expected)
            ))
        }
    }
}

fn describe<S: AsRef<str>>(expected: &[S]) -> String {
    match expected {
        [one] => format!("== {}", one.as_ref()),
        many => {
            let values: Vec<&str> = many.iter().map(AsRef::as_ref).collect();
            format!("in [{}]", values.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::DeviceConfig;
    use crate::device::loopback::Loopback;
    use crate::device::{Device, Frame};
    use crate::telemetry::FIELD_DELIMITER;

    const OPCODE: u16 = 0x2B0A;

    fn bench_with(updates: &[(&str, &str, &str)]) -> Bench {
        let config = DeviceConfig {
            settle_delay_ms: 0,
            reboot_wait_secs: 0,
        };
        let mut bench = Bench::new(Device::new(Box::new(Loopback::new()), &config), OPCODE);
        for (handle, field, value) in updates {
            let d = FIELD_DELIMITER;
            let payload = format!("{handle}{d}SwitchAggregator::compute{d}{field}{d}{value}");
            bench
                .telemetry()
                .ingest_frame(&Frame::new(OPCODE, payload.into_bytes()), OPCODE);
        }
        bench
    }

    #[test]
    fn test_expect_one_passes() {
        let mut bench = bench_with(&[("0x1A2B", "overrideState", "-1")]);
        assert_eq!(expect_one(&mut bench, "SwitchAggregator", "overrideState", "-1", "m"), None);
    }

    #[test]
    fn test_expect_one_reports_missing_type() {
        let mut bench = bench_with(&[]);
        assert_eq!(
            expect_one(&mut bench, "SwitchAggregator", "overrideState", "-1", "after boot"),
            Some("no value found for SwitchAggregator.overrideState: after boot".to_string())
        );
    }

    #[test]
    fn test_expect_one_reports_actual_value() {
        let mut bench = bench_with(&[("0x1A2B", "overrideState", "-1")]);
        assert_eq!(
            expect_one(&mut bench, "SwitchAggregator", "overrideState", "0", "override cleared"),
            Some("expected SwitchAggregator.overrideState == 0, got -1: override cleared".to_string())
        );
    }

    #[test]
    fn test_expect_one_missing_field_is_mismatch() {
        let mut bench = bench_with(&[("0x1A2B", "overrideState", "-1")]);
        assert_eq!(
            expect_one(&mut bench, "SwitchAggregator", "aggregatedState", "0", "m"),
            Some("expected SwitchAggregator.aggregatedState == 0, got <not found>: m".to_string())
        );
    }

    #[test]
    fn test_expect_any_membership() {
        let mut bench = bench_with(&[("0x1A2B", "overrideState", "-1")]);
        assert_eq!(
            expect_any(&mut bench, "SwitchAggregator", "overrideState", &["0", "-1"], "m"),
            None
        );
        assert_eq!(
            expect_any(&mut bench, "SwitchAggregator", "overrideState", &["0", "255"], "m"),
            Some("expected SwitchAggregator.overrideState in [0, 255], got -1: m".to_string())
        );
    }

    #[test]
    fn test_mismatch_names_failing_objects_when_several_exist() {
        let mut bench = bench_with(&[("0x1", "level", "10"), ("0x2", "level", "20")]);
        assert_eq!(
            expect_one(&mut bench, "SwitchAggregator", "level", "10", "m"),
            Some("expected SwitchAggregator.level == 10, got 10 (failing: 0x2): m".to_string())
        );
    }
}
