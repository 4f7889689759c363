use super::*;

fn with_token(transport: TransportConfig) -> Config {
    Config {
        bot: BotConfig {
            token: "123:abc".into(),
            ..Default::default()
        },
        transport,
        ..Default::default()
    }
}

#[test]
fn test_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.herald.log_level, "info");
    assert_eq!(cfg.bot.base_api_url, "https://api.telegram.org");
    assert_eq!(cfg.bot.request_timeout_secs, 10);
    assert!(!cfg.bot.test_mode);
    match cfg.transport {
        TransportConfig::Polling(p) => {
            assert_eq!(p.timeout, 1);
            assert_eq!(p.limit, 100);
            assert_eq!(p.retry_delay_ms, 2000);
        }
        other => panic!("expected polling, got {}", other.mode()),
    }
}

#[test]
fn test_polling_from_toml() {
    let toml_str = r#"
        [bot]
        token = "123:abc"
        allowed_updates = ["message", "callback_query"]

        [transport]
        mode = "polling"
        timeout = 30
        limit = 50
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.bot.allowed_updates.len(), 2);
    let TransportConfig::Polling(p) = cfg.transport else {
        panic!("expected polling");
    };
    assert_eq!(p.timeout, 30);
    assert_eq!(p.limit, 50);
    assert_eq!(p.retry_delay_ms, 2000, "unset field keeps its default");
}

#[test]
fn test_webhook_from_toml() {
    let toml_str = r#"
        [bot]
        token = "123:abc"

        [transport]
        mode = "webhook"
        domain = "https://bot.example.com"
        port = 8443
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    let TransportConfig::Webhook(ref w) = cfg.transport else {
        panic!("expected webhook");
    };
    assert_eq!(w.domain, "https://bot.example.com");
    assert_eq!(w.host, "0.0.0.0");
    assert_eq!(w.port, 8443);
    assert!(w.path.is_none());
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_unknown_mode_rejected() {
    let toml_str = r#"
        [transport]
        mode = "carrier-pigeon"
    "#;
    assert!(toml::from_str::<Config>(toml_str).is_err());
}

#[test]
fn test_transport_without_mode_is_polling() {
    let toml_str = r#"
        [transport]
        timeout = 25
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    let TransportConfig::Polling(p) = cfg.transport else {
        panic!("expected polling");
    };
    assert_eq!(p.timeout, 25);
    assert_eq!(p.limit, 100);
}

#[test]
fn test_transport_field_type_errors_surface() {
    let toml_str = r#"
        [transport]
        mode = "webhook"
        port = "eighty"
    "#;
    let err = toml::from_str::<Config>(toml_str).unwrap_err();
    assert!(err.to_string().contains("invalid type"), "{err}");
}

#[test]
fn test_validate_blank_token() {
    let cfg = Config {
        bot: BotConfig {
            token: "   ".into(),
            ..Default::default()
        },
        ..Default::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(matches!(err, HeraldError::Config(_)));
    assert!(err.to_string().contains(TOKEN_ENV));
}

#[test]
fn test_validate_polling_limit() {
    let cfg = with_token(TransportConfig::Polling(PollingConfig {
        limit: 0,
        ..Default::default()
    }));
    assert!(cfg.validate().is_err());

    let cfg = with_token(TransportConfig::Polling(PollingConfig {
        limit: 101,
        ..Default::default()
    }));
    assert!(cfg.validate().is_err());

    let cfg = with_token(TransportConfig::default());
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_validate_webhook_domain() {
    for domain in ["", "bot.example.com", "https://", "ftp://bot.example.com"] {
        let cfg = with_token(TransportConfig::Webhook(WebhookConfig {
            domain: domain.into(),
            ..Default::default()
        }));
        assert!(cfg.validate().is_err(), "domain '{domain}' should be rejected");
    }
}

#[test]
fn test_validate_webhook_path() {
    let cfg = with_token(TransportConfig::Webhook(WebhookConfig {
        domain: "https://bot.example.com".into(),
        path: Some("hook".into()),
        ..Default::default()
    }));
    assert!(cfg.validate().is_err());

    let cfg = with_token(TransportConfig::Webhook(WebhookConfig {
        domain: "http://localhost:8080".into(),
        path: Some("/hook".into()),
        ..Default::default()
    }));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/__herald_config__.toml").unwrap();
    assert_eq!(cfg.transport.mode(), "polling");
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        [herald]
        log_level = "debug"

        [transport]
        mode = "webhook"
        domain = "https://bot.example.com"
        path = "/hook"
        "#,
    )
    .unwrap();
    let cfg = load(path.to_str().unwrap()).unwrap();
    assert_eq!(cfg.herald.log_level, "debug");
    assert_eq!(cfg.transport.mode(), "webhook");
}

#[test]
fn test_load_invalid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[bot\ntoken = ").unwrap();
    let err = load(path.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config"));
}
