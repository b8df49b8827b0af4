//! Configuration loading tests

use chrono::NaiveDate;
use downtime::{Config, DeriveMode, DowntimeError, GenerationMode};
use downtime_synth::{Field, OutageLength};
use tempfile::TempDir;

#[test]
fn test_default_config_survives_toml() {
    let config = Config::default();
    let text = config.to_toml_string().unwrap();
    let parsed = Config::from_toml_str(&text).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_minimal_file_fills_defaults() {
    let text = r#"
seed = "custom phrase"
output_dir = "out"

[[generations]]
name = "only"
mode = "fresh"
start_date = "2020-01-01"
num_days = 10
fields = ["distance", "g", "orbital_period", "avg_temp", "eccentricity"]
derive = "inline"

[generations.anomalies]
outage_probability = 0.0
outage_length = { kind = "folded_gaussian", mean = 1.0, std_dev = 8.0 }

[[generations.anomalies.overrides]]
date = "2020-01-03"
outage_probability = 1.0
"#;
    let config = Config::from_toml_str(text).unwrap();
    config.validate().unwrap();

    assert_eq!(config.seed, "custom phrase");
    let only = &config.generations[0];
    assert_eq!(only.mode, GenerationMode::Fresh);
    assert_eq!(only.derive, DeriveMode::Inline);
    assert!(only.fields.contains(Field::Eccentricity));
    assert!(!only.fields.contains(Field::Atmosphere));
    assert_eq!(
        only.anomalies.outage_length,
        OutageLength::FoldedGaussian {
            mean: 1.0,
            std_dev: 8.0
        }
    );
    assert_eq!(only.anomalies.null_spike_probability, 0.03);
    assert_eq!(
        only.anomalies.overrides[0].date,
        NaiveDate::from_ymd_opt(2020, 1, 3).unwrap()
    );
    assert_eq!(config.evaluation.thresholds.len(), 15);
}

#[test]
fn test_unknown_field_rejected() {
    let text = r#"
[[generations]]
name = "only"
mode = "fresh"
start_date = "2020-01-01"
num_days = 10
fields = ["distance", "mass"]
"#;
    assert!(matches!(
        Config::from_toml_str(text),
        Err(DowntimeError::TomlDe(_))
    ));
}

#[test]
fn test_probability_out_of_range_rejected() {
    let mut config = Config::default();
    config.generations[0].anomalies.null_spike_severity = 1.2;
    assert!(matches!(config.validate(), Err(DowntimeError::Synth(_))));
}

#[test]
fn test_load_or_default() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.toml");
    assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());

    let path = dir.path().join("downtime.toml");
    let mut config = Config::default();
    config.seed = "written".to_string();
    std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
    assert_eq!(Config::load_or_default(&path).unwrap().seed, "written");
}
