//! 桥接运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// InfluxDB 写入目标配置。
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub timeout_ms: u64,
}

impl InfluxConfig {
    /// 从环境变量读取（`INFLUX_URL`/`INFLUX_TOKEN`/`INFLUX_ORG`/`INFLUX_BUCKET` 必填）。
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: read_required("INFLUX_URL")?,
            token: read_required("INFLUX_TOKEN")?,
            org: read_required("INFLUX_ORG")?,
            bucket: read_required("INFLUX_BUCKET")?,
            timeout_ms: read_u64_with_default("INFLUX_TIMEOUT_MS", 10_000)?,
        })
    }
}

/// MQTT Broker 连接配置（桥接与模拟器共用）。
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub qos: u8,
    pub keep_alive_seconds: u64,
    pub connect_timeout_ms: u64,
}

impl MqttConfig {
    /// 从环境变量读取，`client_id_prefix` 用于未显式配置 `MQTT_CLIENT_ID` 时生成唯一 ID。
    pub fn from_env(client_id_prefix: &str) -> Result<Self, ConfigError> {
        let host = env::var("MQTT_HOST").unwrap_or_else(|_| "broker.hivemq.com".to_string());
        let port = read_u16_with_default("MQTT_PORT", 1883)?;
        let topic = env::var("MQTT_TOPIC").unwrap_or_else(|_| "sensors/data".to_string());
        if topic.trim().is_empty() {
            return Err(ConfigError::Invalid("MQTT_TOPIC".to_string(), topic));
        }
        let username = read_optional("MQTT_USERNAME");
        let password = read_optional("MQTT_PASSWORD");
        let client_id = read_optional("MQTT_CLIENT_ID")
            .unwrap_or_else(|| format!("{}-{}", client_id_prefix, uuid::Uuid::new_v4()));
        let qos = read_u8_with_default("MQTT_QOS", 0)?;
        if qos > 2 {
            return Err(ConfigError::Invalid("MQTT_QOS".to_string(), qos.to_string()));
        }
        let keep_alive_seconds = read_u64_with_default("MQTT_KEEP_ALIVE_SECONDS", 60)?;
        let connect_timeout_ms = read_u64_with_default("MQTT_CONNECT_TIMEOUT_MS", 10_000)?;

        Ok(Self {
            host,
            port,
            topic,
            username,
            password,
            client_id,
            qos,
            keep_alive_seconds,
            connect_timeout_ms,
        })
    }
}

/// 桥接守护进程配置。
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub influx: InfluxConfig,
    pub mqtt: MqttConfig,
    pub device_tag: String,
    pub measurement: String,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub queue_capacity: usize,
    pub write_max_attempts: u32,
    pub write_backoff_ms: u64,
    pub write_backoff_max_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub reconnect_backoff_max_ms: u64,
    pub max_auth_failures: u32,
    pub shutdown_timeout_ms: u64,
}

impl BridgeConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let influx = InfluxConfig::from_env()?;
        let mqtt = MqttConfig::from_env("envbridge")?;
        let device_tag = read_non_empty_with_default("BRIDGE_DEVICE_TAG", "sensor-01")?;
        let measurement = read_non_empty_with_default("BRIDGE_MEASUREMENT", "sensor_data")?;
        let batch_size = read_positive_usize_with_default("BRIDGE_BATCH_SIZE", 1)?;
        let flush_interval_ms = read_u64_with_default("BRIDGE_FLUSH_INTERVAL_MS", 1_000)?;
        let queue_capacity = read_positive_usize_with_default("BRIDGE_QUEUE_CAPACITY", 64)?;
        let write_max_attempts = read_u32_with_default("BRIDGE_WRITE_MAX_ATTEMPTS", 3)?.max(1);
        let write_backoff_ms = read_u64_with_default("BRIDGE_WRITE_BACKOFF_MS", 200)?;
        let write_backoff_max_ms = read_u64_with_default("BRIDGE_WRITE_BACKOFF_MAX_MS", 5_000)?;
        let reconnect_backoff_ms = read_u64_with_default("BRIDGE_RECONNECT_BACKOFF_MS", 1_000)?;
        let reconnect_backoff_max_ms =
            read_u64_with_default("BRIDGE_RECONNECT_BACKOFF_MAX_MS", 30_000)?;
        let max_auth_failures = read_u32_with_default("BRIDGE_MAX_AUTH_FAILURES", 3)?.max(1);
        let shutdown_timeout_ms = read_u64_with_default("BRIDGE_SHUTDOWN_TIMEOUT_MS", 5_000)?;

        Ok(Self {
            influx,
            mqtt,
            device_tag,
            measurement,
            batch_size,
            flush_interval_ms,
            queue_capacity,
            write_max_attempts,
            write_backoff_ms,
            write_backoff_max_ms,
            reconnect_backoff_ms,
            reconnect_backoff_max_ms,
            max_auth_failures,
            shutdown_timeout_ms,
        })
    }
}

/// 模拟发布器配置。
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub mqtt: MqttConfig,
    pub interval_ms: u64,
}

impl SimulatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mqtt = MqttConfig::from_env("envbridge-sim")?;
        let interval_ms = read_u64_with_default("SIM_INTERVAL_MS", 5_000)?;
        Ok(Self { mqtt, interval_ms })
    }
}

fn read_required(key: &str) -> Result<String, ConfigError> {
    read_optional(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_positive_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}

/// 未设置时取默认值；显式设置为空白则视为非法（行协议不接受空的标签值与 measurement）。
fn read_non_empty_with_default(key: &str, default: &str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::Invalid(key.to_string(), value)),
        Ok(value) => Ok(value),
        Err(_) => Ok(default.to_string()),
    }
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
