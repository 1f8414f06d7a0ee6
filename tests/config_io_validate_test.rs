use oersted::config::Config;
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.api.access_token = "secret-token".to_string();
    cfg.api.price_code = "DK_NORDPOOL_SPOT_DK2".to_string();
    cfg.api.mpid = "571313180000000001".to_string();
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.api.access_token, "secret-token");
    assert_eq!(loaded.api.mpid, "571313180000000001");
    assert!(loaded.is_configured());
}

#[test]
fn partial_yaml_falls_back_to_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        b"api:\n  access_token: \"tok\"\n  price_code: \"DK_NORDPOOL_SPOT_DK2\"\n  mpid: \"571313180000000001\"\n",
    )
    .unwrap();

    let cfg = Config::from_file(tmp.path()).unwrap();
    assert!(cfg.is_configured());
    assert_eq!(cfg.api.timeout_secs, 15);
    assert_eq!(cfg.refresh.daily_hour, 13);
    assert_eq!(cfg.timezone, "Europe/Copenhagen");
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();

    // Empty endpoint
    cfg.api.endpoint.clear();
    assert!(cfg.validate().is_err());

    // Zero timeout
    cfg = Config::default();
    cfg.api.timeout_secs = 0;
    assert!(cfg.validate().is_err());

    // Daily hour out of range
    cfg = Config::default();
    cfg.refresh.daily_hour = 24;
    assert!(cfg.validate().is_err());

    // Jitter bound out of range
    cfg = Config::default();
    cfg.refresh.daily_jitter_minutes = 60;
    assert!(cfg.validate().is_err());

    // Unknown timezones
    cfg = Config::default();
    cfg.timezone = "Not/AZone".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.refresh.reference_timezone = "Not/AZone".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}

#[test]
fn timezones_resolve_to_chrono_tz() {
    let cfg = Config::default();
    assert_eq!(cfg.display_timezone().unwrap(), chrono_tz::Europe::Copenhagen);
    assert_eq!(
        cfg.reference_timezone().unwrap(),
        chrono_tz::Europe::Stockholm
    );
}
