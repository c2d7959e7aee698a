// Config loading and validation tests

use pimon::config::{AppConfig, AuthMode, ServiceTarget};
use pimon::registry::ServiceCheck;
use pimon::remote::AuthStrategy;

const VALID_CONFIG: &str = r#"
[server]
port = 8090
host = "0.0.0.0"

[monitoring]
sample_interval_ms = 5000
broadcast_capacity = 16
stats_log_interval_secs = 300

[remote]
host = "10.0.0.2"
user = "pi"
auth = "key"
identity_file = "/home/pi/.ssh/id_ed25519"
"#;

#[test]
fn test_config_loads_from_str_with_defaults() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8090);
    assert_eq!(config.monitoring.sample_interval_ms, 5000);
    assert_eq!(config.monitoring.cpu_sample_interval_ms, 200);
    assert_eq!(config.monitoring.service_query_timeout_ms, 2000);
    assert_eq!(config.monitoring.refresh_delay_ms, 1000);
    assert_eq!(config.remote.auth, AuthMode::Key);
    assert_eq!(config.remote.ssh_port, 22);
    assert_eq!(config.remote.web_port, 8080);
    assert_eq!(config.remote.cast_port, 8008);
    assert_eq!(config.remote.probe_timeout_ms, 3000);
    assert_eq!(config.remote.command_timeout_ms, 30_000);
    assert_eq!(config.remote.dashboard_process, "raspberry-pi-gui");
    assert!(config.actions.use_sudo);
    assert_eq!(config.actions.action_timeout_ms, 5000);
    assert_eq!(config.services.target, ServiceTarget::Local);
    assert_eq!(config.registry().len(), 7);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8090", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_sample_interval_zero() {
    let bad = VALID_CONFIG.replace("sample_interval_ms = 5000", "sample_interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sample_interval_ms"));
}

#[test]
fn test_config_validation_rejects_service_query_timeout_above_bound() {
    let bad = VALID_CONFIG.replace(
        "sample_interval_ms = 5000",
        "sample_interval_ms = 5000\nservice_query_timeout_ms = 2500",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("monitoring.service_query_timeout_ms"));
}

#[test]
fn test_config_validation_rejects_cpu_interval_not_below_sample_interval() {
    let bad = VALID_CONFIG.replace(
        "sample_interval_ms = 5000",
        "sample_interval_ms = 5000\ncpu_sample_interval_ms = 5000",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("cpu_sample_interval_ms"));
}

#[test]
fn test_config_validation_rejects_broadcast_capacity_zero() {
    let bad = VALID_CONFIG.replace("broadcast_capacity = 16", "broadcast_capacity = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("broadcast_capacity"));
}

#[test]
fn test_config_validation_rejects_empty_remote_host() {
    let bad = VALID_CONFIG.replace("host = \"10.0.0.2\"", "host = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("remote.host"));
}

#[test]
fn test_config_validation_requires_identity_file_for_key_auth() {
    let bad = VALID_CONFIG.replace("identity_file = \"/home/pi/.ssh/id_ed25519\"\n", "");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("remote.identity_file"));
}

#[test]
fn test_config_validation_rejects_unknown_auth_mode() {
    let bad = VALID_CONFIG.replace("auth = \"key\"", "auth = \"kerberos\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_custom_service_entries_replace_registry() {
    let with_services = format!(
        "{VALID_CONFIG}\n[services]\ntarget = \"remote\"\n\n\
         [[services.entries]]\nname = \"Printing\"\nunit = \"cups\"\n\n\
         [[services.entries]]\nname = \"Kiosk\"\nprocess = \"chromium --kiosk\"\n"
    );
    let config = AppConfig::load_from_str(&with_services).expect("valid");
    assert_eq!(config.services.target, ServiceTarget::Remote);
    let registry = config.registry();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.entries()[0].check, ServiceCheck::Unit("cups".into()));
    assert_eq!(
        registry.entries()[1].check,
        ServiceCheck::Process("chromium --kiosk".into())
    );
}

#[test]
fn test_config_validation_rejects_entry_with_unit_and_process() {
    let bad = format!(
        "{VALID_CONFIG}\n[[services.entries]]\nname = \"Both\"\nunit = \"a\"\nprocess = \"b\"\n"
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("services.entries[0]"));
}

#[test]
fn test_password_target_prefers_env_over_config() {
    let cfg = VALID_CONFIG
        .replace("auth = \"key\"", "auth = \"password\"\npassword_env = \"PIMON_TEST_PW_PREFERRED\"\npassword = \"from-config\"");
    let config = AppConfig::load_from_str(&cfg).expect("valid");

    let target = config.remote.target().expect("config fallback");
    assert_eq!(
        target.auth,
        AuthStrategy::Password {
            password: "from-config".into()
        }
    );

    unsafe { std::env::set_var("PIMON_TEST_PW_PREFERRED", "from-env") };
    let target = config.remote.target();
    unsafe { std::env::remove_var("PIMON_TEST_PW_PREFERRED") };
    assert_eq!(
        target.expect("env secret").auth,
        AuthStrategy::Password {
            password: "from-env".into()
        }
    );
}

#[test]
fn test_password_target_without_secret_fails() {
    let cfg = VALID_CONFIG.replace(
        "auth = \"key\"",
        "auth = \"password\"\npassword_env = \"PIMON_TEST_PW_UNSET\"",
    );
    let config = AppConfig::load_from_str(&cfg).expect("valid");
    let err = config.remote.target().unwrap_err();
    assert!(err.to_string().contains("PIMON_TEST_PW_UNSET"));
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.server.port, 8090);
    assert_eq!(config.remote.host, "10.0.0.2");
}
