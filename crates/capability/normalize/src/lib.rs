use domain::{
    DEFAULT_DEVICE_TAG, DEFAULT_MEASUREMENT, DEVICE_TAG_KEY, FIELD_HUMIDITY, FIELD_TEMPERATURE,
    Point, RawMessage, Reading, now_epoch_ms,
};
use serde::Deserialize;

/// 解码错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

impl DecodeError {
    /// 用于日志与指标的错误类别。
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::MalformedPayload(_) => "malformed_payload",
            DecodeError::MissingField(_) => "missing_field",
        }
    }
}

/// 传感器报文：`{"temperature": <number>, "humidity": <number>}`。
///
/// 缺失与 `null` 都解析为 `None`；非数值类型在反序列化阶段即报错。
#[derive(Debug, Deserialize)]
struct SensorPayload {
    temperature: Option<f64>,
    humidity: Option<f64>,
}

/// RawMessage -> Reading。
///
/// 纯函数：不做数值范围校验，多余字段忽略。
pub fn decode(message: &RawMessage) -> Result<Reading, DecodeError> {
    let text = std::str::from_utf8(&message.payload)
        .map_err(|err| DecodeError::MalformedPayload(err.to_string()))?;
    let value: serde_json::Value = serde_json::from_str(text.trim())
        .map_err(|err| DecodeError::MalformedPayload(err.to_string()))?;
    // 结构体反序列化也接受 JSON 数组，这里只允许对象。
    if !value.is_object() {
        return Err(DecodeError::MalformedPayload(
            "expected a JSON object".to_string(),
        ));
    }
    let payload: SensorPayload = serde_json::from_value(value)
        .map_err(|err| DecodeError::MalformedPayload(err.to_string()))?;
    let temperature = payload
        .temperature
        .ok_or(DecodeError::MissingField(FIELD_TEMPERATURE))?;
    let humidity = payload
        .humidity
        .ok_or(DecodeError::MissingField(FIELD_HUMIDITY))?;
    Ok(Reading {
        temperature,
        humidity,
        observed_at_ms: message.received_at_ms,
    })
}

/// Reading -> Point，measurement 与设备标签为固定配置值。
#[derive(Debug, Clone)]
pub struct PointBuilder {
    measurement: String,
    device_tag: String,
}

impl PointBuilder {
    pub fn new(measurement: impl Into<String>, device_tag: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            device_tag: device_tag.into(),
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn device_tag(&self) -> &str {
        &self.device_tag
    }

    /// 以当前时间（入库时间）为时间戳构建点位。
    pub fn build(&self, reading: Reading) -> Point {
        self.build_at(reading, now_epoch_ms())
    }

    pub fn build_at(&self, reading: Reading, timestamp_ms: i64) -> Point {
        Point::new(self.measurement.clone(), timestamp_ms)
            .with_tag(DEVICE_TAG_KEY, self.device_tag.clone())
            .with_field(FIELD_TEMPERATURE, reading.temperature)
            .with_field(FIELD_HUMIDITY, reading.humidity)
    }
}

impl Default for PointBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MEASUREMENT, DEFAULT_DEVICE_TAG)
    }
}
