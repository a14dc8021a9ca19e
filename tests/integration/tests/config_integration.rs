//! Configuration loading tests
//!
//! Environment overrides are process-wide, so every test touching them runs
//! serially.

use std::io::Write;

use anyhow::Result;
use serial_test::serial;
use tempfile::NamedTempFile;

use playerbridge::engine::recording::RecordingFactory;
use playerbridge::engine::{OptionCategory, OptionValue};
use playerbridge::utils::Config;
use playerbridge::{BridgeError, PlayerView, ResizeMode};
use playerbridge_integration_tests::LIVE_URL;

const ENV_VARS: [&str; 5] = [
    "PLAYERBRIDGE_VOLUME",
    "PLAYERBRIDGE_HARDWARE_DECODING",
    "PLAYERBRIDGE_PROGRESS_INTERVAL_MS",
    "PLAYERBRIDGE_LOW_LATENCY_MAX_BUFFER",
    "PLAYERBRIDGE_LOG_LEVEL",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn config_file(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
#[serial]
fn test_file_then_env_overrides() -> Result<()> {
    clear_env();
    let file = config_file(
        r#"
[playback]
volume = 0.5
resize_mode = "stretch"

[progress]
interval_ms = 500
"#,
    )?;

    std::env::set_var("PLAYERBRIDGE_PROGRESS_INTERVAL_MS", "100");
    std::env::set_var("PLAYERBRIDGE_LOG_LEVEL", "debug");
    let config = Config::load_from(file.path());
    clear_env();
    let config = config?;

    assert_eq!(config.playback.volume, 0.5);
    assert_eq!(config.playback.resize_mode, ResizeMode::Stretch);
    assert_eq!(config.progress.interval_ms, 100);
    assert_eq!(config.general.log_level, "debug");

    Ok(())
}

#[test]
#[serial]
fn test_invalid_env_value_is_config_error() -> Result<()> {
    clear_env();
    let file = config_file("")?;

    std::env::set_var("PLAYERBRIDGE_HARDWARE_DECODING", "sometimes");
    let result = Config::load_from(file.path());
    clear_env();

    assert!(matches!(result, Err(BridgeError::Config(_))));
    Ok(())
}

#[test]
#[serial]
fn test_out_of_range_file_value_fails_validation() -> Result<()> {
    clear_env();
    let file = config_file("[playback]\nvolume = 3.0\n")?;

    let result = Config::load_from(file.path());
    assert!(matches!(result, Err(BridgeError::Config(_))));
    Ok(())
}

#[test]
#[serial]
fn test_saved_config_drives_a_view() -> Result<()> {
    clear_env();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("playerbridge").join("config.toml");

    let mut config = Config::default();
    config.playback.hardware_decoding = false;
    config.playback.max_buffer_size = Some(2 * 1024 * 1024);
    config.save_to(&path)?;

    let loaded = Config::load_from(&path)?;
    assert_eq!(loaded, config);

    let factory = std::sync::Arc::new(RecordingFactory::new());
    let mut view = PlayerView::new(factory.clone(), loaded);
    view.set_source(LIVE_URL);

    let probe = factory.last().expect("handle created");
    let settings = probe.settings();
    assert_eq!(
        settings.options.get(OptionCategory::Player, "max-buffer-size"),
        Some(&OptionValue::Int(2 * 1024 * 1024))
    );
    assert_eq!(settings.hardware_decoding, Some(false));

    Ok(())
}
