//! 日志初始化与桥接计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub decode_malformed: u64,
    pub decode_missing_field: u64,
    pub points_built: u64,
    pub points_written: u64,
    pub points_dropped: u64,
    pub write_retries: u64,
    pub batches_flushed: u64,
    pub backpressure_waits: u64,
    pub reconnects: u64,
    pub write_latency_ms_total: u64,
    pub write_latency_ms_count: u64,
}

impl MetricsSnapshot {
    /// 解码失败总数。
    pub fn decode_failures(&self) -> u64 {
        self.decode_malformed + self.decode_missing_field
    }
}

/// 桥接计数指标。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    decode_malformed: AtomicU64,
    decode_missing_field: AtomicU64,
    points_built: AtomicU64,
    points_written: AtomicU64,
    points_dropped: AtomicU64,
    write_retries: AtomicU64,
    batches_flushed: AtomicU64,
    backpressure_waits: AtomicU64,
    reconnects: AtomicU64,
    write_latency_ms_total: AtomicU64,
    write_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            decode_malformed: AtomicU64::new(0),
            decode_missing_field: AtomicU64::new(0),
            points_built: AtomicU64::new(0),
            points_written: AtomicU64::new(0),
            points_dropped: AtomicU64::new(0),
            write_retries: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            backpressure_waits: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            write_latency_ms_total: AtomicU64::new(0),
            write_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_malformed: self.decode_malformed.load(Ordering::Relaxed),
            decode_missing_field: self.decode_missing_field.load(Ordering::Relaxed),
            points_built: self.points_built.load(Ordering::Relaxed),
            points_written: self.points_written.load(Ordering::Relaxed),
            points_dropped: self.points_dropped.load(Ordering::Relaxed),
            write_retries: self.write_retries.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            backpressure_waits: self.backpressure_waits.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            write_latency_ms_total: self.write_latency_ms_total.load(Ordering::Relaxed),
            write_latency_ms_count: self.write_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录消息接收次数。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录报文格式错误次数。
pub fn record_decode_malformed() {
    metrics().decode_malformed.fetch_add(1, Ordering::Relaxed);
}

/// 记录字段缺失次数。
pub fn record_decode_missing_field() {
    metrics()
        .decode_missing_field
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录点位构建次数。
pub fn record_point_built() {
    metrics().points_built.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入成功的点位数。
pub fn record_points_written(count: u64) {
    metrics().points_written.fetch_add(count, Ordering::Relaxed);
}

/// 记录被丢弃的点位数（重试耗尽或永久失败）。
pub fn record_points_dropped(count: u64) {
    metrics().points_dropped.fetch_add(count, Ordering::Relaxed);
}

/// 记录写入重试次数。
pub fn record_write_retry() {
    metrics().write_retries.fetch_add(1, Ordering::Relaxed);
}

/// 记录批次刷写次数。
pub fn record_batch_flushed() {
    metrics().batches_flushed.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入队列满导致的等待次数。
pub fn record_backpressure_wait() {
    metrics()
        .backpressure_waits
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录断线重连次数。
pub fn record_reconnect() {
    metrics().reconnects.fetch_add(1, Ordering::Relaxed);
}

/// 记录单批写入延迟（毫秒）。
pub fn record_write_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .write_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .write_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
