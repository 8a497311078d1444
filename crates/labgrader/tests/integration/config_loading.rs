use labgrader::config::Config;
use labgrader::{ConfigError, GraderKind};

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.toolchains.contains_key("c"));
    assert!(config.toolchains.contains_key("python3"));
    assert_eq!(config.worker_count(), 4);
    assert!(config.sandbox_profile().is_some());

    let (name, course) = config.get_course("CS101").unwrap();
    assert_eq!(name, "cs101");
    assert_eq!(course.grader, GraderKind::Stdout);
    let lab = config.get_lab("cs101", "Lab1").unwrap();
    assert_eq!(lab.runtime_limit, 3);
    assert!(lab.disable_internet);
    assert_eq!(lab.public_test_cases, vec!["1", "2"]);

    let limits = config.limits_for(lab);
    assert_eq!(limits.timeout_seconds, 3);
    assert!(limits.network_disabled);
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.toolchains.contains_key("sh"));
    assert!(config.course_names().is_empty());
    assert_eq!(config.compile_timeout, 30);
}

#[test]
fn test_environment_overrides_file() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file_with_env(
        &path,
        [
            ("LABGRADER_SANDBOX__ENABLED", "false"),
            ("LABGRADER_WORKERS", "7"),
            ("LABGRADER_COMPILE_TIMEOUT", "5"),
            ("UNRELATED_WORKERS", "99"),
        ],
    )
    .expect("Failed to load config");

    assert!(config.sandbox_profile().is_none());
    assert_eq!(config.workers, Some(7));
    assert_eq!(config.worker_count(), 7);
    assert_eq!(config.compile_timeout, 5);
    // untouched file settings survive
    assert_eq!(config.max_output, 65536);
    assert!(config.toolchains.contains_key("c"));
}

#[test]
fn test_environment_enables_sandbox() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file_with_env(&path, [("LABGRADER_SANDBOX__ENABLED", "true")]);
    // a sandbox without a wrapper command is rejected
    assert!(matches!(config, Err(ConfigError::Invalid(_))));

    let config = Config::from_file_with_env(&path, std::iter::empty::<(String, String)>())
        .expect("Failed to load config");
    assert!(config.sandbox_profile().is_none());
}

#[test]
fn test_load_invalid_runtime_limit() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_runtime_limit.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::InvalidLab { .. })
    ));
}

#[test]
fn test_load_invalid_lab_name() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_lab_name.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::InvalidLab { .. })
    ));
}

#[test]
fn test_load_invalid_unknown_toolchain() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_unknown_toolchain.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_invalid_empty_run_command() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_run_command.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_load_missing_file() {
    let path = format!("{FIXTURES_PATH}/configs/does_not_exist.toml");
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_embedded_example_config() {
    let config = Config::default();
    assert_eq!(config.course_names(), vec!["cc451", "test_course"]);
}
