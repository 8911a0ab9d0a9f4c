use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use crate::config::{NotificationChannelConfig, RetryConfig, VigilConfig};
use crate::error::ConfigError;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_match_documented_policy() {
    let config = VigilConfig::default();
    assert_eq!(config.monitor.tick_interval(), Duration::from_secs(30));
    assert_eq!(config.thresholds.drift_threshold, 0.7);
    assert_eq!(config.thresholds.accuracy_threshold, 0.85);
    assert_eq!(config.cooldowns.retrain(), Duration::from_secs(600));
    assert_eq!(config.cooldowns.alert_dedup(), Duration::from_secs(3600));
    assert_eq!(config.timeouts.probe(), Duration::from_secs(5));
    assert_eq!(config.timeouts.retrain(), Duration::from_secs(60));
    assert_eq!(config.timeouts.alert(), Duration::from_secs(10));
    assert_eq!(config.monitor.failure_alert_after, 3);
    assert_eq!(
        config.retrain.lock_stale_after(&config.timeouts),
        Duration::from_secs(120)
    );
    config.validate().unwrap();
}

#[test]
fn partial_yaml_keeps_defaults_for_missing_sections() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "monitor:\n  tick_interval_secs: 10\nthresholds:\n  drift_threshold: 0.5\nnotifications:\n  channels:\n    - type: ntfy\n      url: https://ntfy.sh\n      topic: models"
    )
    .unwrap();

    let config = VigilConfig::load_from_path(file.path()).unwrap();
    assert_eq!(config.monitor.tick_interval_secs, 10);
    assert_eq!(config.monitor.failure_alert_after, 3);
    assert_eq!(config.thresholds.drift_threshold, 0.5);
    assert_eq!(config.thresholds.accuracy_threshold, 0.85);
    assert_eq!(
        config.notifications.channels,
        vec![NotificationChannelConfig::Ntfy {
            url: "https://ntfy.sh".into(),
            topic: "models".into(),
        }]
    );
}

#[test]
fn empty_file_yields_defaults() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = VigilConfig::load_from_path(file.path()).unwrap();
    assert_eq!(config, VigilConfig::default());
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "monitor: [unclosed").unwrap();
    let err = VigilConfig::load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn missing_optional_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    assert!(VigilConfig::load(&path, false).is_ok());
    assert!(matches!(
        VigilConfig::load(&path, true),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
fn env_overrides_replace_file_values() {
    let mut config = VigilConfig::default();
    config
        .apply_env_overrides(env(&[
            ("VIGIL_TICK_INTERVAL_SECS", "15"),
            ("VIGIL_ACCURACY_THRESHOLD", "0.9"),
            ("VIGIL_RETRAIN_COOLDOWN_SECS", "120"),
            ("VIGIL_TRACKER_URL", "http://mlflow:5000"),
            ("VIGIL_GENERATOR_URL", "  "),
            ("VIGIL_API_TOKEN", "tok-123"),
        ]))
        .unwrap();
    assert_eq!(config.monitor.tick_interval_secs, 15);
    assert_eq!(config.thresholds.accuracy_threshold, 0.9);
    assert_eq!(config.cooldowns.retrain_secs, 120);
    assert_eq!(config.services.tracker_url.as_deref(), Some("http://mlflow:5000"));
    assert_eq!(config.services.generator_url, None);
    assert_eq!(config.services.api_token.as_deref(), Some("tok-123"));
}

#[test]
fn unparsable_env_override_is_rejected() {
    let mut config = VigilConfig::default();
    let err = config
        .apply_env_overrides(env(&[("VIGIL_DRIFT_THRESHOLD", "high")]))
        .unwrap_err();
    match err {
        ConfigError::InvalidEnv { key, value, .. } => {
            assert_eq!(key, "VIGIL_DRIFT_THRESHOLD");
            assert_eq!(value, "high");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn discord_webhook_env_adds_or_replaces_channel() {
    let mut config = VigilConfig::default();
    config
        .apply_env_overrides(env(&[("DISCORD_WEBHOOK_URL", "https://discord.test/a")]))
        .unwrap();
    config
        .apply_env_overrides(env(&[("DISCORD_WEBHOOK_URL", "https://discord.test/b")]))
        .unwrap();
    assert_eq!(
        config.notifications.channels,
        vec![NotificationChannelConfig::Discord {
            webhook_url: "https://discord.test/b".into(),
            username: None,
        }]
    );
}

#[test]
fn validation_rejects_out_of_range_values() {
    let cases: Vec<fn(&mut VigilConfig)> = vec![
        |c| c.monitor.tick_interval_secs = 0,
        |c| c.thresholds.drift_threshold = 1.5,
        |c| c.thresholds.accuracy_threshold = f64::NAN,
        |c| c.timeouts.probe_secs = 0,
        |c| c.retry.max_attempts = 0,
        |c| c.retry.multiplier = 0.5,
        |c| c.retrain.dataset_samples = 50,
        |c| c.retrain.lock_stale_after_secs = Some(10),
        |c| c.services.serving_url = "localhost:8000".into(),
        |c| c.services.canary_features = Some(vec![]),
    ];
    for mutate in cases {
        let mut config = VigilConfig::default();
        mutate(&mut config);
        assert!(
            matches!(config.validate(), Err(ConfigError::Invalid(_))),
            "expected rejection for {config:?}"
        );
    }
}

#[test]
fn default_config_warns_about_long_retrain_ticks() {
    let warnings = VigilConfig::default().warnings();
    assert!(warnings.iter().any(|w| w.contains("tick interval")));
    assert!(warnings.iter().any(|w| w.contains("notification")));
}

#[test]
fn backoff_grows_and_caps() {
    let retry = RetryConfig {
        max_attempts: 5,
        initial_backoff_ms: 100,
        max_backoff_ms: 350,
        multiplier: 2.0,
    };
    assert_eq!(retry.backoff_after(1), Duration::from_millis(100));
    assert_eq!(retry.backoff_after(2), Duration::from_millis(200));
    assert_eq!(retry.backoff_after(3), Duration::from_millis(350));
    assert_eq!(retry.backoff_after(30), Duration::from_millis(350));
}
