use super::*;

#[test]
fn defaults_apply_when_every_field_is_absent() {
    let config = Config::from_raw(RawConfig::default()).unwrap();
    assert_eq!(config.port_range, (31000, 32000));
    assert_eq!(config.health_interval, Duration::from_secs(5));
    assert_eq!(config.consecutive_failures, 3);
    assert_eq!(config.admin_instance_id, "admin");
    assert_eq!(config.poll_interval, Duration::from_millis(1000));
    assert!(config.static_instances.is_empty());
}

#[test]
fn inverted_port_range_is_rejected() {
    let raw = RawConfig {
        port_range_min: Some(32000),
        port_range_max: Some(31000),
        ..RawConfig::default()
    };
    assert!(matches!(Config::from_raw(raw), Err(ConfigError::InvalidPortRange { .. })));
}

#[test]
fn static_instances_are_converted_to_app_instances() {
    let raw = RawConfig {
        static_instances: vec![RawInstance {
            instance_id: "admin".to_string(),
            package_path: PathBuf::from("/var/lib/nexushub/pkgs/admin"),
        }],
        ..RawConfig::default()
    };
    let config = Config::from_raw(raw).unwrap();
    assert_eq!(config.static_instances.len(), 1);
    assert_eq!(config.static_instances[0].instance_id.as_str(), "admin");
}

#[test]
fn derived_paths_live_under_state_dir() {
    let raw = RawConfig {
        state_dir: Some(PathBuf::from("/tmp/nexushub-test-state")),
        ..RawConfig::default()
    };
    let config = Config::from_raw(raw).unwrap();
    assert_eq!(config.log_path, PathBuf::from("/tmp/nexushub-test-state/daemon.log"));
    assert_eq!(config.wal_path, PathBuf::from("/tmp/nexushub-test-state/events.wal"));
    assert_eq!(
        config.package_store_dir,
        PathBuf::from("/tmp/nexushub-test-state/packages")
    );
}

#[test]
fn full_toml_document_parses() {
    let text = r#"
        listen_addr = "0.0.0.0:9443"
        internal_secret = "s3cr3t"
        admin_instance_id = "admin"

        [[static_instances]]
        instance_id = "admin"
        package_path = "/var/lib/nexushub/pkgs/admin"
    "#;
    let raw: RawConfig = toml::from_str(text).unwrap();
    let config = Config::from_raw(raw).unwrap();
    assert_eq!(config.listen_addr, "0.0.0.0:9443".parse::<SocketAddr>().unwrap());
    assert_eq!(config.internal_secret, "s3cr3t");
    assert_eq!(config.static_instances.len(), 1);
}
