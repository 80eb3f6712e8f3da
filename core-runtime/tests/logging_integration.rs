//! Integration tests for the logging configuration.

use core_runtime::logging::{redact_if_sensitive, strip_path, LogFormat, LogLevel, LoggingConfig};

#[test]
fn test_config_builder() {
    // We can only install a subscriber once per process, so these tests
    // exercise the configuration surface rather than init itself.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
}

#[test]
fn test_secret_redaction() {
    assert_eq!(
        redact_if_sensitive("access_token", "sensitive_access_token"),
        "[REDACTED]"
    );
    assert_eq!(
        redact_if_sensitive("authorization_code", "4/abc123"),
        "[REDACTED]"
    );
    assert_eq!(redact_if_sensitive("service", "docs"), "docs");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/creds/key.json"), "key.json");
    assert_eq!(strip_path("C:\\Users\\John\\key.json"), "key.json");
    assert_eq!(strip_path("key.json"), "key.json");
    assert_eq!(strip_path("/var/run/"), "");
}

#[test]
fn test_filter_configuration() {
    let config = LoggingConfig::default().with_filter("core_auth=debug,core_service=trace");

    assert_eq!(
        config.filter,
        Some("core_auth=debug,core_service=trace".to_string())
    );
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
