pub mod backoff;
pub mod data;

pub use backoff::{Backoff, BackoffPolicy};
pub use data::{
    ConnectionState, DEFAULT_DEVICE_TAG, DEFAULT_MEASUREMENT, DEVICE_TAG_KEY, FIELD_HUMIDITY,
    FIELD_TEMPERATURE, Point, RawMessage, Reading,
};

/// 当前 Unix 时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
