use std::collections::HashMap;

use super::*;

fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
    let vars: HashMap<String, String> =
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    AppConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn database_url_is_required() {
    assert_eq!(config_from(&[]), Err(ConfigError::Missing("DATABASE_URL")));
    assert_eq!(config_from(&[("DATABASE_URL", "   ")]), Err(ConfigError::Missing("DATABASE_URL")));
}

#[test]
fn defaults_suit_local_development() {
    let config = config_from(&[("DATABASE_URL", "postgres://localhost/proofboard")]).unwrap();
    assert_eq!(config.port, 3000);
    assert_eq!(config.db_max_connections, 5);
    assert_eq!(
        config.blob,
        BlobConfig::Local { dir: PathBuf::from("uploads"), public_base: "/uploads".into() }
    );
    assert!(!config.cookie_secure);
    assert_eq!(config.session_ttl_hours, 720);
    assert_eq!(config.admin_bootstrap, None);
    assert_eq!(config.verify_limit, 10);
    assert_eq!(config.verify_window, Duration::from_secs(60));
}

#[test]
fn overrides_are_parsed() {
    let config = config_from(&[
        ("DATABASE_URL", "postgres://db/proofboard"),
        ("PORT", "8080"),
        ("DB_MAX_CONNECTIONS", "12"),
        ("COOKIE_SECURE", "yes"),
        ("SESSION_TTL_HOURS", "2"),
        ("ADMIN_USERNAME", "studio"),
        ("ADMIN_PASSWORD", "hunter2"),
        ("RATE_LIMIT_VERIFY", "3"),
        ("RATE_LIMIT_VERIFY_WINDOW_SECS", "30"),
    ])
    .unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.db_max_connections, 12);
    assert!(config.cookie_secure);
    assert_eq!(config.session_ttl_hours, 2);
    assert_eq!(
        config.admin_bootstrap,
        Some(AdminBootstrap { username: "studio".into(), password: "hunter2".into() })
    );
    assert_eq!(config.verify_limit, 3);
    assert_eq!(config.verify_window, Duration::from_secs(30));
}

#[test]
fn admin_bootstrap_needs_both_halves() {
    let config =
        config_from(&[("DATABASE_URL", "postgres://db"), ("ADMIN_USERNAME", "studio")]).unwrap();
    assert_eq!(config.admin_bootstrap, None);
}

#[test]
fn invalid_numbers_are_reported_with_key() {
    let err = config_from(&[("DATABASE_URL", "postgres://db"), ("PORT", "eighty")]).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { key: "PORT", value: "eighty".into() });
}

#[test]
fn invalid_bool_is_reported() {
    let err =
        config_from(&[("DATABASE_URL", "postgres://db"), ("COOKIE_SECURE", "maybe")]).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { key: "COOKIE_SECURE", value: "maybe".into() });
}

#[test]
fn bool_values_accept_common_spellings() {
    for raw in ["1", "true", "YES", " On "] {
        assert_eq!(parse_bool_value(raw), Some(true), "{raw:?}");
    }
    for raw in ["0", "false", "No", "off"] {
        assert_eq!(parse_bool_value(raw), Some(false), "{raw:?}");
    }
    assert_eq!(parse_bool_value(""), None);
}

#[test]
fn s3_backend_requires_bucket_and_public_base() {
    let err = config_from(&[("DATABASE_URL", "postgres://db"), ("BLOB_BACKEND", "s3")]).unwrap_err();
    assert_eq!(err, ConfigError::Missing("S3_BUCKET"));

    let err = config_from(&[
        ("DATABASE_URL", "postgres://db"),
        ("BLOB_BACKEND", "s3"),
        ("S3_BUCKET", "proofs"),
    ])
    .unwrap_err();
    assert_eq!(err, ConfigError::Missing("PUBLIC_UPLOAD_BASE"));
}

#[test]
fn s3_backend_is_configured() {
    let config = config_from(&[
        ("DATABASE_URL", "postgres://db"),
        ("BLOB_BACKEND", "s3"),
        ("S3_BUCKET", "proofs"),
        ("S3_REGION", "eu-west-1"),
        ("S3_FORCE_PATH_STYLE", "true"),
        ("PUBLIC_UPLOAD_BASE", "https://cdn.example.com"),
    ])
    .unwrap();
    let BlobConfig::S3(s3) = config.blob else {
        panic!("expected s3 backend");
    };
    assert_eq!(s3.bucket, "proofs");
    assert_eq!(s3.region.as_deref(), Some("eu-west-1"));
    assert!(s3.force_path_style);
    assert_eq!(s3.public_base, "https://cdn.example.com");
    assert_eq!(s3.endpoint_url, None);
}

#[test]
fn unknown_backend_is_rejected() {
    let err = config_from(&[("DATABASE_URL", "postgres://db"), ("BLOB_BACKEND", "ftp")]).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { key: "BLOB_BACKEND", value: "ftp".into() });
}
