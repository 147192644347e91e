use std::time::Duration;
use std::{env, fs};

use portal_auth::SameSitePolicy;
use portal_bff::config::loader::load_config;

const VALID_TOML: &str = r#"
[server]
host = "127.0.0.1"
port = 8081
cors_allowed_origins = ["https://portal.example.com"]

[logging]
level = "debug"

[auth.idp]
token_url = "https://idp.example.com/oauth2/token"
userinfo_url = "https://idp.example.com/oauth2/userinfo"
client_id = "member-portal"
client_secret = "file-secret"

[auth.session]
timeout = "45m"
refresh_threshold = "2m"

[auth.cookie]
same_site = "Strict"

[auth.biometric]
token_url = "https://us.example.com/oauth2/token"
resource_url = "https://us.example.com/v1/biometric"
client_id = "portal-bff"
cache_ttl = "10m"

[auth.biometric.resilience]
max_attempts = 4
cooldown = "1m"

[auth.relationships]
token_url = "https://psn.example.com/oauth2/token"
resource_url = "https://psn.example.com/v1/access-level"
client_id = "portal-bff"
"#;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("portal.toml");
    fs::write(&path, VALID_TOML).expect("write toml");

    // 1) Valid config parses; unset keys keep their defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.server.cors_allowed_origins, vec!["https://portal.example.com"]);
    assert_eq!(cfg.logging.level, "debug");
    assert!(!cfg.redis.enabled);
    assert_eq!(cfg.auth.idp.revoke_endpoint(), "https://idp.example.com/oauth2/revoke");
    assert_eq!(cfg.auth.session.timeout, Duration::from_secs(45 * 60));
    assert_eq!(cfg.auth.session.refresh_threshold, Duration::from_secs(120));
    assert_eq!(cfg.auth.session.key_prefix, "session:");
    assert_eq!(cfg.auth.cookie.same_site, SameSitePolicy::Strict);
    assert_eq!(cfg.auth.cookie.name, "SESSION_ID");
    assert_eq!(cfg.auth.biometric.scope, "us.biometric.read");
    assert_eq!(cfg.auth.biometric.cache_ttl, Duration::from_secs(600));
    assert_eq!(cfg.auth.biometric.resilience.max_attempts, 4);
    assert_eq!(cfg.auth.biometric.resilience.failure_threshold, 5);
    assert_eq!(cfg.auth.relationships.scope, "psn.access_level.read");
    assert_eq!(cfg.auth.relationships.cache_ttl, Duration::from_secs(30 * 60));

    // 2) Env override should win over file
    unsafe {
        env::set_var("PORTAL__SERVER__PORT", "9191");
        env::set_var("PORTAL__AUTH__IDP__CLIENT_SECRET", "env-secret");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9191);
    assert_eq!(cfg_env.auth.idp.client_secret, "env-secret");
    unsafe {
        env::remove_var("PORTAL__SERVER__PORT");
        env::remove_var("PORTAL__AUTH__IDP__CLIENT_SECRET");
    }

    // 3) Refresh threshold not shorter than the session timeout is rejected
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml =
        VALID_TOML.replace(r#"refresh_threshold = "2m""#, r#"refresh_threshold = "45m""#);
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("refresh_threshold"));

    // 4) Missing gateway endpoint is reported by its key
    let missing_path = dir.path().join("missing.toml");
    let missing_toml = VALID_TOML.replace(
        r#"resource_url = "https://psn.example.com/v1/access-level""#,
        "",
    );
    fs::write(&missing_path, missing_toml).expect("write missing toml");
    let err = load_config(missing_path.to_str()).expect_err("expected missing key error");
    assert!(err.contains("relationships.resource_url"));

    // 5) Malformed durations fail deserialization
    let bad_path = dir.path().join("bad.toml");
    let bad_toml = VALID_TOML.replace(r#"timeout = "45m""#, r#"timeout = "soon""#);
    fs::write(&bad_path, bad_toml).expect("write bad toml");
    let err = load_config(bad_path.to_str()).expect_err("expected deserialize error");
    assert!(err.starts_with("config deserialize error"));
}
