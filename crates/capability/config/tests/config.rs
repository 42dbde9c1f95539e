use envbridge_config::{BridgeConfig, ConfigError};

// 环境变量为进程级共享状态，全部断言放在同一个测试中顺序执行。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var/remove_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::remove_var("INFLUX_URL");
        std::env::set_var("INFLUX_TOKEN", "token-1");
        std::env::set_var("INFLUX_ORG", "org-1");
        std::env::set_var("INFLUX_BUCKET", "bucket-1");
    }
    let err = BridgeConfig::from_env().expect_err("missing url");
    assert!(matches!(err, ConfigError::Missing(ref key) if key == "INFLUX_URL"));

    unsafe {
        std::env::set_var("INFLUX_URL", "http://localhost:8086");
        std::env::set_var("MQTT_CLIENT_ID", "bridge-test");
        std::env::set_var("BRIDGE_BATCH_SIZE", "5");
    }
    let config = BridgeConfig::from_env().expect("config");
    assert_eq!(config.influx.url, "http://localhost:8086");
    assert_eq!(config.influx.bucket, "bucket-1");
    assert_eq!(config.mqtt.host, "broker.hivemq.com");
    assert_eq!(config.mqtt.port, 1883);
    assert_eq!(config.mqtt.topic, "sensors/data");
    assert_eq!(config.mqtt.client_id, "bridge-test");
    assert_eq!(config.mqtt.qos, 0);
    assert_eq!(config.device_tag, "sensor-01");
    assert_eq!(config.measurement, "sensor_data");
    assert_eq!(config.batch_size, 5);
    assert_eq!(config.write_max_attempts, 3);
    assert_eq!(config.max_auth_failures, 3);

    unsafe {
        std::env::set_var("BRIDGE_BATCH_SIZE", "0");
    }
    let err = BridgeConfig::from_env().expect_err("zero batch");
    assert!(matches!(err, ConfigError::Invalid(ref key, _) if key == "BRIDGE_BATCH_SIZE"));

    unsafe {
        std::env::remove_var("BRIDGE_BATCH_SIZE");
        std::env::set_var("MQTT_QOS", "3");
    }
    let err = BridgeConfig::from_env().expect_err("qos out of range");
    assert_eq!(err.to_string(), "invalid value for MQTT_QOS: 3");

    unsafe {
        std::env::set_var("MQTT_QOS", "1");
        std::env::set_var("MQTT_PORT", "not-a-port");
    }
    let err = BridgeConfig::from_env().expect_err("bad port");
    assert!(matches!(err, ConfigError::Invalid(ref key, _) if key == "MQTT_PORT"));

    unsafe {
        std::env::remove_var("MQTT_PORT");
        std::env::set_var("BRIDGE_DEVICE_TAG", "");
    }
    let err = BridgeConfig::from_env().expect_err("empty device tag");
    assert!(matches!(err, ConfigError::Invalid(ref key, _) if key == "BRIDGE_DEVICE_TAG"));

    unsafe {
        std::env::set_var("BRIDGE_DEVICE_TAG", "sensor-07");
        std::env::set_var("BRIDGE_MEASUREMENT", "  ");
    }
    let err = BridgeConfig::from_env().expect_err("blank measurement");
    assert!(matches!(err, ConfigError::Invalid(ref key, _) if key == "BRIDGE_MEASUREMENT"));

    unsafe {
        std::env::remove_var("BRIDGE_MEASUREMENT");
    }
    let config = BridgeConfig::from_env().expect("config");
    assert_eq!(config.device_tag, "sensor-07");
    assert_eq!(config.measurement, "sensor_data");
}
