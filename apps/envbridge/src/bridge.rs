//! 桥接链路装配
//!
//! 将传输客户端（MQTT）、点位构建器、写入任务（InfluxDB）与控制器
//! 按运行配置组装为一个可运行的 [`BridgeController`]。

use domain::BackoffPolicy;
use envbridge_config::BridgeConfig;
use envbridge_control::{BridgeController, ControllerConfig};
use envbridge_ingest::{MqttTransport, MqttTransportConfig, Qos};
use envbridge_normalize::PointBuilder;
use envbridge_pipeline::{PipelineConfig, spawn_writer};
use envbridge_storage::{InfluxPointStore, InfluxStoreConfig, WriteError};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 按配置装配控制器（写入任务随之启动）。
pub fn build_controller(config: &BridgeConfig) -> Result<BridgeController, WriteError> {
    let store = Arc::new(InfluxPointStore::new(influx_store_config(config))?);
    let transport = Arc::new(MqttTransport::new(transport_config(config)));
    let builder = PointBuilder::new(config.measurement.clone(), config.device_tag.clone());
    let writer = spawn_writer(store, pipeline_config(config));

    info!(
        target: "envbridge.control",
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        topic = %config.mqtt.topic,
        influx_url = %config.influx.url,
        bucket = %config.influx.bucket,
        measurement = %config.measurement,
        device = %config.device_tag,
        batch_size = config.batch_size,
        "bridge_assembled"
    );

    Ok(BridgeController::new(
        transport,
        builder,
        writer,
        controller_config(config),
    ))
}

fn influx_store_config(config: &BridgeConfig) -> InfluxStoreConfig {
    InfluxStoreConfig {
        url: config.influx.url.clone(),
        token: config.influx.token.clone(),
        org: config.influx.org.clone(),
        bucket: config.influx.bucket.clone(),
        timeout: Duration::from_millis(config.influx.timeout_ms),
    }
}

fn transport_config(config: &BridgeConfig) -> MqttTransportConfig {
    MqttTransportConfig {
        host: config.mqtt.host.clone(),
        port: config.mqtt.port,
        client_id: config.mqtt.client_id.clone(),
        username: config.mqtt.username.clone(),
        password: config.mqtt.password.clone(),
        keep_alive_seconds: config.mqtt.keep_alive_seconds,
    }
}

fn pipeline_config(config: &BridgeConfig) -> PipelineConfig {
    PipelineConfig {
        batch_size: config.batch_size,
        max_attempts: config.write_max_attempts,
        backoff: BackoffPolicy::from_millis(config.write_backoff_ms, config.write_backoff_max_ms),
        flush_interval: Duration::from_millis(config.flush_interval_ms),
        queue_capacity: config.queue_capacity,
    }
}

fn controller_config(config: &BridgeConfig) -> ControllerConfig {
    ControllerConfig {
        channel: config.mqtt.topic.clone(),
        qos: Qos::from_u8(config.mqtt.qos),
        connect_timeout: Duration::from_millis(config.mqtt.connect_timeout_ms),
        reconnect_backoff: BackoffPolicy::from_millis(
            config.reconnect_backoff_ms,
            config.reconnect_backoff_max_ms,
        ),
        max_auth_failures: config.max_auth_failures,
        shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
    }
}
