// tests/config_loading.rs

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use runner_bridge::config::{load_and_validate, load_or_default, resolve_base_dir};
use runner_bridge::errors::BridgeError;
use runner_bridge::exec::RunnerSettings;
use runner_bridge_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn demo_config_is_parsed_correctly() -> TestResult {
    init_tracing();

    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let path = manifest.join("demos/RunnerBridge.toml");
    let cfg = load_and_validate(&path)?;

    assert_eq!(cfg.bridge.listen, "127.0.0.1:8080");
    assert_eq!(cfg.bridge.max_body_bytes, 2 * 1024 * 1024);
    assert_eq!(cfg.runner.interpreters, vec!["python3", "python"]);
    assert_eq!(cfg.runner.script, PathBuf::from("runner.py"));
    assert_eq!(cfg.runner.timeout.as_duration(), Duration::from_secs(120));
    assert_eq!(cfg.runner.probe_timeout.as_duration(), Duration::from_secs(5));
    assert_eq!(cfg.packs.root, Some(PathBuf::from("custom-nodes")));
    assert_eq!(cfg.packs.install_timeout.as_duration(), Duration::from_secs(180));
    assert_eq!(cfg.packs.install_args.last().map(String::as_str), Some("{requirements}"));

    assert_eq!(resolve_base_dir(&path, &cfg)?, manifest.join("demos"));
    assert!(manifest.join("demos/runner.py").is_file());
    Ok(())
}

#[test]
fn empty_file_yields_defaults() -> TestResult {
    init_tracing();

    let file = config_file("");
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.bridge.listen, "127.0.0.1:8080");
    assert_eq!(cfg.runner.script, PathBuf::from("runner.py"));
    assert_eq!(cfg.runner.probe_args, vec!["-V"]);
    assert_eq!(cfg.runner.timeout.as_duration(), Duration::from_secs(120));
    assert_eq!(cfg.runner.max_output_bytes, 16 * 1024 * 1024);
    assert!(cfg.packs.root.is_none());

    let settings = RunnerSettings::from_config(&cfg.runner);
    assert!(!settings.interpreters.is_empty());
    Ok(())
}

#[test]
fn timeout_accepts_integer_seconds_and_suffixed_strings() -> TestResult {
    init_tracing();

    let secs = load_and_validate(config_file("[runner]\ntimeout = 30\n").path())?;
    assert_eq!(secs.runner.timeout.as_duration(), Duration::from_secs(30));

    let millis = load_and_validate(config_file("[runner]\ntimeout = \"750ms\"\n").path())?;
    assert_eq!(millis.runner.timeout.as_duration(), Duration::from_millis(750));
    Ok(())
}

#[test]
fn zero_timeout_returns_config_error() {
    init_tracing();

    let file = config_file("[runner]\ntimeout = \"0s\"\n");
    match load_and_validate(file.path()) {
        Err(BridgeError::ConfigError(msg)) => assert!(msg.contains("timeout")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn empty_interpreter_list_returns_config_error() {
    init_tracing();

    let file = config_file("[runner]\ninterpreters = []\n");
    match load_and_validate(file.path()) {
        Err(BridgeError::ConfigError(msg)) => assert!(msg.contains("interpreters")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_keys_and_bad_units_are_toml_errors() {
    init_tracing();

    let typo = config_file("[runner]\ntimout = \"5s\"\n");
    assert!(matches!(
        load_and_validate(typo.path()),
        Err(BridgeError::TomlError(_))
    ));

    let unit = config_file("[runner]\ntimeout = \"5 days\"\n");
    assert!(matches!(
        load_and_validate(unit.path()),
        Err(BridgeError::TomlError(_))
    ));
}

#[test]
fn explicit_missing_config_is_an_io_error() {
    init_tracing();

    let missing = std::env::temp_dir().join("runner-bridge-does-not-exist.toml");
    assert!(matches!(
        load_or_default(Some(&missing)),
        Err(BridgeError::IoError(_))
    ));
}
