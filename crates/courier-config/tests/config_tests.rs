// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use courier_config::diagnostic::ConfigError;
use courier_config::model::CourierConfig;
use courier_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_courier_config() {
    let toml = r#"
[log]
level = "debug"

[storage]
database_path = "/tmp/courier-test.db"

[rates.bridge]
min_delay_secs = 45
per_minute = 1
per_hour = 40

[rates.cloud]
min_delay_secs = 1
per_minute = 60
per_hour = 2000

[lock]
max_consecutive_errors = 3
stale_after_secs = 120

[dispatch]
poll_interval_secs = 2
sweep_interval_secs = 60
max_attempts = 5
backoff_base_secs = 10
backoff_cap_secs = 120

[campaign]
batch_size = 25
requeue_delay_secs = 1

[http]
request_timeout_secs = 30
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/courier-test.db");
    assert_eq!(config.rates.bridge.min_delay_secs, 45);
    assert_eq!(config.rates.bridge.per_minute, 1);
    assert_eq!(config.rates.bridge.per_hour, 40);
    assert_eq!(config.rates.cloud.min_delay_secs, 1);
    assert_eq!(config.rates.cloud.per_minute, 60);
    assert_eq!(config.rates.cloud.per_hour, 2000);
    assert_eq!(config.lock.max_consecutive_errors, 3);
    assert_eq!(config.lock.stale_after_secs, 120);
    assert_eq!(config.dispatch.poll_interval_secs, 2);
    assert_eq!(config.dispatch.sweep_interval_secs, 60);
    assert_eq!(config.dispatch.max_attempts, 5);
    assert_eq!(config.dispatch.backoff_base_secs, 10);
    assert_eq!(config.dispatch.backoff_cap_secs, 120);
    assert_eq!(config.campaign.batch_size, 25);
    assert_eq!(config.campaign.requeue_delay_secs, 1);
    assert_eq!(config.http.request_timeout_secs, 30);
}

/// Missing sections use defaults without error.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.log.level, "info");
    assert_eq!(config.rates.bridge.min_delay_secs, 30);
    assert_eq!(config.rates.bridge.per_minute, 2);
    assert_eq!(config.rates.bridge.per_hour, 60);
    assert_eq!(config.rates.cloud.min_delay_secs, 3);
    assert_eq!(config.rates.cloud.per_minute, 30);
    assert_eq!(config.rates.cloud.per_hour, 1000);
    assert_eq!(config.lock.max_consecutive_errors, 5);
    assert_eq!(config.lock.stale_after_secs, 300);
    assert_eq!(config.dispatch.poll_interval_secs, 5);
    assert_eq!(config.dispatch.max_attempts, 3);
    assert_eq!(config.dispatch.backoff_base_secs, 30);
    assert_eq!(config.dispatch.backoff_cap_secs, 300);
    assert_eq!(config.campaign.batch_size, 50);
    assert_eq!(config.http.request_timeout_secs, 10);
}

/// A partial override keeps the untouched keys of the same section.
#[test]
fn partial_section_override_keeps_sibling_defaults() {
    let toml = r#"
[dispatch]
poll_interval_secs = 1
"#;

    let config = load_config_from_str(toml).expect("partial section should parse");
    assert_eq!(config.dispatch.poll_interval_secs, 1);
    assert_eq!(config.dispatch.max_attempts, 3);
    assert_eq!(config.dispatch.backoff_cap_secs, 300);
}

/// Unknown key in a section is rejected by deny_unknown_fields.
#[test]
fn unknown_field_in_section_produces_error() {
    let toml = r#"
[dispatch]
pol_interval_secs = 2
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("pol_interval_secs"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[metrics]
enabled = true
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("metrics"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Invalid type (string where number expected) produces a clear message.
#[test]
fn invalid_type_produces_clear_message() {
    let toml = r#"
[campaign]
batch_size = "lots"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("batch_size"),
        "error should mention type mismatch, got: {err_str}"
    );
}

/// Later figment layers override earlier ones, key by key.
#[test]
fn later_layer_overrides_earlier_key_by_key() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[lock]
max_consecutive_errors = 8
stale_after_secs = 600
"#;

    let config: CourierConfig = Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("lock.max_consecutive_errors", 2))
        .extract()
        .expect("should merge the override");

    assert_eq!(config.lock.max_consecutive_errors, 2);
    // The other key of the section survives from the file layer.
    assert_eq!(config.lock.stale_after_secs, 600);
}

/// Missing config files are silently skipped (Figment's Toml::file behavior).
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: CourierConfig = Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file("/nonexistent/path/courier.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.dispatch.poll_interval_secs, 5);
}

/// Well-formed values with bad semantics fail validation, not parsing, and
/// every problem is reported in one pass.
#[test]
fn validation_collects_every_problem() {
    let toml = r#"
[rates.bridge]
min_delay_secs = 30
per_minute = 0
per_hour = 60

[dispatch]
backoff_base_secs = 600
backoff_cap_secs = 60

[campaign]
batch_size = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("semantic problems should fail");
    assert!(errors.len() >= 3, "expected all three problems, got: {errors:?}");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("per_minute"))));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("backoff_cap_secs"))));
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("batch_size"))));
}

/// An hourly ceiling below the minute ceiling can never be satisfied.
#[test]
fn validation_rejects_inverted_window_ceilings() {
    let toml = r#"
[rates.cloud]
min_delay_secs = 3
per_minute = 500
per_hour = 100
"#;

    let errors = load_and_validate_str(toml).expect_err("inverted ceilings should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("rates.cloud.per_hour"))));
}

/// ConfigError implements miette::Diagnostic and renders with the key path.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::Invalid {
        detail: "unknown field `pol_interval_secs` in dispatch".to_string(),
    };
    assert!(error.code().is_some(), "should have a diagnostic code");

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(
        buf.contains("pol_interval_secs"),
        "rendered report should mention the key, got: {buf}"
    );
}

/// load_and_validate_str with valid TOML returns the merged config.
#[test]
fn load_and_validate_valid_toml() {
    let toml = r#"
[http]
request_timeout_secs = 15
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.http.request_timeout_secs, 15);
}
