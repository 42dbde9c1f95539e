//! 桥接控制器：连接监督、订阅、消息分发与关停。
//!
//! 状态机：`Disconnected → Connecting → Subscribed → (Faulted | Disconnected)`。
//! 每个连接周期内消息依次经过解码、构建点位、入队写入任务；
//! 写入队列满时控制器停止读取传输层（背压）。

use domain::{Backoff, BackoffPolicy, ConnectionState, RawMessage};
use envbridge_ingest::{Connection, Delivery, Qos, Transport};
use envbridge_normalize::{DecodeError, PointBuilder, decode};
use envbridge_pipeline::{PipelineError, WriterHandle, report_dropped};
use envbridge_telemetry::{
    record_decode_malformed, record_decode_missing_field, record_message_received,
    record_point_built, record_reconnect,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const DISCARDED_ON_SHUTDOWN: &str = "discarded_on_shutdown";

/// 控制器参数。
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// 订阅的 topic。
    pub channel: String,
    pub qos: Qos,
    pub connect_timeout: Duration,
    pub reconnect_backoff: BackoffPolicy,
    /// 连续鉴权失败达到该次数后进入 Faulted。
    pub max_auth_failures: u32,
    /// 断线/关停时刷写缓冲批次的等待上限。
    pub shutdown_timeout: Duration,
}

/// 控制器对外广播的事件。
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    StateChanged(ConnectionState),
    MessageRejected {
        channel: String,
        payload: String,
        error: DecodeError,
    },
}

/// 控制器终止错误。
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge faulted: {0}")]
    Faulted(String),
    #[error("writer closed")]
    WriterClosed,
}

/// 一个连接周期的结束原因。
enum EpochEnd {
    Shutdown,
    Lost(String),
    WriterClosed,
}

/// 建立连接周期失败。
struct EpochFailure {
    reason: String,
    auth: bool,
}

pub struct BridgeController {
    transport: Arc<dyn Transport>,
    builder: PointBuilder,
    writer: WriterHandle,
    config: ControllerConfig,
    state: ConnectionState,
    events: broadcast::Sender<BridgeEvent>,
}

impl BridgeController {
    pub fn new(
        transport: Arc<dyn Transport>,
        builder: PointBuilder,
        writer: WriterHandle,
        config: ControllerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            builder,
            writer,
            config,
            state: ConnectionState::Disconnected,
            events,
        }
    }

    /// 订阅控制器事件（状态变更、被拒消息）。
    pub fn events(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// 运行直到收到关停信号或进入终止状态。
    ///
    /// 无论以何种方式退出，连接都已关闭，写入任务已排空并释放存储客户端。
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), BridgeError> {
        info!(
            target: "envbridge.control",
            address = %self.transport.address(),
            channel = %self.config.channel,
            "bridge_started"
        );
        let result = self.supervise(&shutdown).await;

        let BridgeController { writer, config, .. } = self;
        writer.shutdown(config.shutdown_timeout).await;
        match &result {
            Ok(()) => info!(target: "envbridge.control", "bridge_stopped"),
            Err(err) => error!(target: "envbridge.control", error = %err, "bridge_stopped"),
        }
        result
    }

    async fn supervise(&mut self, shutdown: &CancellationToken) -> Result<(), BridgeError> {
        let mut backoff = Backoff::new(self.config.reconnect_backoff);
        let mut auth_failures = 0u32;

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }
            self.transition(ConnectionState::Connecting);

            match self.open_epoch(shutdown).await {
                Ok(Some(mut connection)) => {
                    auth_failures = 0;
                    backoff.reset();
                    self.transition(ConnectionState::Subscribed);

                    let end = self.consume(connection.as_mut(), shutdown).await;
                    match end {
                        EpochEnd::Shutdown => {
                            self.flush_writer("shutdown").await;
                            connection.close().await;
                            self.transition(ConnectionState::Disconnected);
                            return Ok(());
                        }
                        EpochEnd::Lost(reason) => {
                            warn!(
                                target: "envbridge.control",
                                reason = %reason,
                                "connection_lost"
                            );
                            self.flush_writer("disconnect").await;
                            connection.close().await;
                            record_reconnect();
                            self.transition(ConnectionState::Disconnected);
                        }
                        EpochEnd::WriterClosed => {
                            connection.close().await;
                            self.transition(ConnectionState::Disconnected);
                            return Err(BridgeError::WriterClosed);
                        }
                    }
                }
                Ok(None) => {
                    self.transition(ConnectionState::Disconnected);
                    return Ok(());
                }
                Err(failure) => {
                    if failure.auth {
                        auth_failures += 1;
                        if auth_failures >= self.config.max_auth_failures {
                            error!(
                                target: "envbridge.control",
                                auth_failures = auth_failures,
                                reason = %failure.reason,
                                "bridge_faulted"
                            );
                            self.transition(ConnectionState::Faulted);
                            return Err(BridgeError::Faulted(failure.reason));
                        }
                    } else {
                        auth_failures = 0;
                    }
                    self.transition(ConnectionState::Disconnected);
                }
            }

            let delay = backoff.next_delay();
            info!(
                target: "envbridge.control",
                attempt = backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "reconnect_scheduled"
            );
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// 连接并订阅；收到关停信号时返回 `Ok(None)`。
    async fn open_epoch(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<Option<Box<dyn Connection>>, EpochFailure> {
        let connected = tokio::select! {
            _ = shutdown.cancelled() => return Ok(None),
            result = self.transport.connect(self.config.connect_timeout) => result,
        };
        let mut connection = match connected {
            Ok(connection) => connection,
            Err(err) => {
                warn!(
                    target: "envbridge.control",
                    address = %self.transport.address(),
                    error = %err,
                    "connect_failed"
                );
                return Err(EpochFailure {
                    reason: err.to_string(),
                    auth: err.is_auth_failure(),
                });
            }
        };

        let subscribed = tokio::select! {
            _ = shutdown.cancelled() => None,
            result = connection.subscribe(&self.config.channel, self.config.qos) => Some(result),
        };
        match subscribed {
            Some(Ok(())) => Ok(Some(connection)),
            Some(Err(err)) => {
                warn!(
                    target: "envbridge.control",
                    channel = %self.config.channel,
                    error = %err,
                    "subscribe_failed"
                );
                connection.close().await;
                Err(EpochFailure {
                    reason: err.to_string(),
                    auth: err.is_auth_failure(),
                })
            }
            None => {
                connection.close().await;
                Ok(None)
            }
        }
    }

    async fn consume(
        &self,
        connection: &mut dyn Connection,
        shutdown: &CancellationToken,
    ) -> EpochEnd {
        loop {
            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return EpochEnd::Shutdown,
                delivery = connection.recv() => delivery,
            };
            match delivery {
                Delivery::Message(message) => {
                    if let Err(end) = self.dispatch(message, shutdown).await {
                        return end;
                    }
                }
                Delivery::Disconnected(reason) => return EpochEnd::Lost(reason),
            }
        }
    }

    /// 解码、构建并入队一条消息；被拒消息上报后返回 `Ok`。
    async fn dispatch(
        &self,
        message: RawMessage,
        shutdown: &CancellationToken,
    ) -> Result<(), EpochEnd> {
        record_message_received();
        debug!(
            target: "envbridge.ingest",
            channel = %message.channel,
            payload_size = message.payload.len(),
            received_at_ms = message.received_at_ms,
            "message_received"
        );

        let reading = match decode(&message) {
            Ok(reading) => reading,
            Err(err) => {
                self.reject(&message, err);
                return Ok(());
            }
        };

        let point = self.builder.build(reading);
        record_point_built();

        tokio::select! {
            _ = shutdown.cancelled() => {
                // 写入队列已满且收到关停信号，该点位不再入队。
                report_dropped(std::slice::from_ref(&point), DISCARDED_ON_SHUTDOWN);
                Err(EpochEnd::Shutdown)
            }
            result = self.writer.submit(point.clone()) => result.map_err(|err| {
                error!(target: "envbridge.control", error = %err, "writer_unavailable");
                EpochEnd::WriterClosed
            }),
        }
    }

    fn reject(&self, message: &RawMessage, err: DecodeError) {
        match err {
            DecodeError::MalformedPayload(_) => record_decode_malformed(),
            DecodeError::MissingField(_) => record_decode_missing_field(),
        }
        let payload = message.payload_lossy();
        warn!(
            target: "envbridge.ingest",
            channel = %message.channel,
            payload = %payload,
            error_kind = err.kind(),
            error = %err,
            "decode_failed"
        );
        let _ = self.events.send(BridgeEvent::MessageRejected {
            channel: message.channel.clone(),
            payload,
            error: err,
        });
    }

    /// 尽力刷写写入任务中的缓冲批次。
    async fn flush_writer(&self, reason: &'static str) {
        match self.writer.flush(self.config.shutdown_timeout).await {
            Ok(points) => debug!(
                target: "envbridge.control",
                reason = reason,
                points = points,
                "writer_flushed"
            ),
            // 丢弃的点位已由写入任务逐条上报。
            Err(PipelineError::Dropped { .. }) => {}
            Err(err) => warn!(
                target: "envbridge.control",
                reason = reason,
                error = %err,
                "writer_flush_failed"
            ),
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        info!(
            target: "envbridge.control",
            from = %self.state,
            to = %next,
            "state_changed"
        );
        self.state = next;
        let _ = self.events.send(BridgeEvent::StateChanged(next));
    }
}
