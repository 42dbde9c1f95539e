use std::collections::BTreeMap;
use std::fmt;

/// 默认 measurement 名称。
pub const DEFAULT_MEASUREMENT: &str = "sensor_data";
/// 默认设备标识（`device` 标签值）。
pub const DEFAULT_DEVICE_TAG: &str = "sensor-01";
/// 设备标签键。
pub const DEVICE_TAG_KEY: &str = "device";
/// 温度字段名。
pub const FIELD_TEMPERATURE: &str = "temperature";
/// 湿度字段名。
pub const FIELD_HUMIDITY: &str = "humidity";

/// 传输层投递的原始消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub channel: String,
    pub payload: Vec<u8>,
    pub received_at_ms: i64,
}

impl RawMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<Vec<u8>>, received_at_ms: i64) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
            received_at_ms,
        }
    }

    /// 报文的可读形式（非 UTF-8 字节按替换字符显示），用于日志上报。
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// 解码后的温湿度读数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    pub observed_at_ms: i64,
}

/// 时序存储点位：measurement + 标签 + 数值字段 + 时间戳（毫秒）。
///
/// 构建完成后不可修改；`with_*` 方法按值消费并返回新实例。
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: Vec<(String, f64)>,
    timestamp_ms: i64,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: Vec::new(),
            timestamp_ms,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// 追加字段；同名字段覆盖原值并保持原位置。
    pub fn with_field(mut self, key: impl Into<String>, value: f64) -> Self {
        let key = key.into();
        match self.fields.iter_mut().find(|(name, _)| *name == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &[(String, f64)] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| *value)
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.measurement)?;
        for (key, value) in &self.tags {
            write!(f, ",{}={}", key, value)?;
        }
        write!(f, "@{}", self.timestamp_ms)
    }
}

/// 桥接连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    /// 不可恢复的配置错误（如凭据被拒），需人工介入。
    Faulted,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Faulted => "faulted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Faulted)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
