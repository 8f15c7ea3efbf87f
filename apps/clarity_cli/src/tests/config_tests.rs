use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_point_at_local_service() {
    let settings = resolve_settings(None, no_env).expect("settings");
    assert_eq!(settings.api_base_url, "http://localhost:8000/api");
    assert_eq!(settings.log_filter, "info");
    assert!(settings.session_file.ends_with("session.json"));
}

#[test]
fn file_values_override_defaults() {
    let raw = r#"
api_base_url = "https://clarity.example.com/api"
session_file = "/tmp/clarity/session.json"
log_filter = "debug"
"#;
    let settings = resolve_settings(Some(raw), no_env).expect("settings");
    assert_eq!(settings.api_base_url, "https://clarity.example.com/api");
    assert_eq!(settings.session_file, PathBuf::from("/tmp/clarity/session.json"));
    assert_eq!(settings.log_filter, "debug");
}

#[test]
fn environment_overrides_file_and_app_prefix_wins() {
    let raw = r#"api_base_url = "https://file.example.com/api""#;
    let settings = resolve_settings(Some(raw), |name| match name {
        "CLARITY_API_URL" => Some("https://env.example.com/api".to_string()),
        "APP__API_BASE_URL" => Some("https://app.example.com/api".to_string()),
        "CLARITY_SESSION_FILE" => Some("/var/lib/clarity/session.json".to_string()),
        "CLARITY_LOG" => Some("client_core=debug".to_string()),
        _ => None,
    })
    .expect("settings");
    assert_eq!(settings.api_base_url, "https://app.example.com/api");
    assert_eq!(
        settings.session_file,
        PathBuf::from("/var/lib/clarity/session.json")
    );
    assert_eq!(settings.log_filter, "client_core=debug");
}

#[test]
fn blank_environment_values_are_ignored() {
    let settings = resolve_settings(None, |name| {
        (name == "CLARITY_API_URL").then(|| "   ".to_string())
    })
    .expect("settings");
    assert_eq!(settings.api_base_url, "http://localhost:8000/api");
}

#[test]
fn malformed_file_is_reported() {
    let err = resolve_settings(Some("api_base_url = ["), no_env).expect_err("must fail");
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn rejects_non_http_api_urls() {
    assert!(matches!(
        validate_api_url("ftp://example.com/api"),
        Err(ConfigError::UnsupportedScheme(_))
    ));
    assert!(matches!(
        validate_api_url("not a url"),
        Err(ConfigError::InvalidApiUrl { .. })
    ));
}

#[test]
fn cli_flags_win_over_everything() {
    let settings = resolve_settings(None, no_env)
        .expect("settings")
        .with_overrides(
            Some("http://127.0.0.1:9000/api".to_string()),
            Some(PathBuf::from("session-override.json")),
        )
        .expect("overrides");
    assert_eq!(settings.api_base_url, "http://127.0.0.1:9000/api");
    assert_eq!(settings.session_file, PathBuf::from("session-override.json"));
}
