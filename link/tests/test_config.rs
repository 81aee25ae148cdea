//! Loading engine configuration from TOML files.
//!
//! Run with:
//!   cargo test --test test_config

use shell_link::{EngineConfig, ShellLinkError};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[engine]
page_size = 250
streaming_updates = true

[timeouts]
wait_threshold_ms = 100
"#
    )
    .unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.options.page_size, 250);
    assert!(config.options.streaming_updates);
    assert_eq!(config.timeouts.wait_threshold, Duration::from_millis(100));
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::load(dir.path().join("shell-link.toml")).unwrap_err();
    assert!(matches!(err, ShellLinkError::ConfigurationError(_)));
}

#[test]
fn test_load_rejects_unknown_keys() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[engine]\npage_sise = 10").unwrap();

    let err = EngineConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ShellLinkError::ConfigurationError(_)));
}
