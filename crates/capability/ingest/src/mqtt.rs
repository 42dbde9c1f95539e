//! 基于 rumqttc 的 MQTT 传输实现。

use crate::error::{ConnectError, SubscribeError};
use crate::{Connection, Delivery, Qos, Transport};
use async_trait::async_trait;
use domain::{RawMessage, now_epoch_ms};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet,
    Publish, QoS, SubscribeReasonCode,
};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{info, warn};

/// rumqttc 要求 keep-alive 不小于 5 秒。
const MIN_KEEP_ALIVE_SECS: u64 = 5;
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// MQTT 传输配置。
#[derive(Debug, Clone)]
pub struct MqttTransportConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_seconds: u64,
}

/// MQTT 传输客户端，每次 `connect` 新建 client + eventloop。
#[derive(Debug, Clone)]
pub struct MqttTransport {
    config: MqttTransportConfig,
}

impl MqttTransport {
    pub fn new(config: MqttTransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MqttTransportConfig {
        &self.config
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(
            self.config.keep_alive_seconds.max(MIN_KEEP_ALIVE_SECS),
        ));
        options.set_clean_session(true);
        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            options.set_credentials(username, password);
        }
        options
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    async fn connect(&self, timeout: Duration) -> Result<Box<dyn Connection>, ConnectError> {
        let (client, mut eventloop) = AsyncClient::new(self.options(), 10);
        match tokio::time::timeout(timeout, wait_connack(&mut eventloop)).await {
            Ok(Ok(())) => {
                info!(
                    target: "envbridge.ingest",
                    address = %self.address(),
                    client_id = %self.config.client_id,
                    "mqtt_connected"
                );
                Ok(Box::new(MqttConnection {
                    client,
                    eventloop,
                    pending: VecDeque::new(),
                    timeout,
                    live: true,
                }))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ConnectError::Timeout(timeout)),
        }
    }
}

async fn wait_connack(eventloop: &mut EventLoop) -> Result<(), ConnectError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(classify_refusal(code)),
                };
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => return Err(classify_refusal(code)),
            Err(err) => return Err(ConnectError::Network(err.to_string())),
        }
    }
}

/// 凭据/授权类拒绝不可通过重试恢复，其余视为暂时性网络问题。
fn classify_refusal(code: ConnectReturnCode) -> ConnectError {
    match code {
        ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized => {
            ConnectError::Unauthorized(format!("{:?}", code))
        }
        other => ConnectError::Network(format!("connection refused: {:?}", other)),
    }
}

impl From<Qos> for QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => QoS::AtMostOnce,
            Qos::AtLeastOnce => QoS::AtLeastOnce,
            Qos::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

fn raw_from_publish(publish: Publish) -> RawMessage {
    RawMessage {
        channel: publish.topic,
        payload: publish.payload.to_vec(),
        received_at_ms: now_epoch_ms(),
    }
}

/// 单个 MQTT 连接周期。
pub struct MqttConnection {
    client: AsyncClient,
    eventloop: EventLoop,
    /// 等待 SUBACK 期间提前到达的消息。
    pending: VecDeque<RawMessage>,
    timeout: Duration,
    live: bool,
}

impl MqttConnection {
    async fn await_suback(&mut self, channel: &str) -> Result<(), SubscribeError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let rejected = ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure));
                    if rejected {
                        return Err(SubscribeError::Rejected(channel.to_string()));
                    }
                    return Ok(());
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.pending.push_back(raw_from_publish(publish));
                }
                Ok(_) => {}
                Err(err) => {
                    self.live = false;
                    return Err(SubscribeError::Network(err.to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl Connection for MqttConnection {
    async fn subscribe(&mut self, channel: &str, qos: Qos) -> Result<(), SubscribeError> {
        if !self.live {
            return Err(SubscribeError::NotConnected);
        }
        self.client
            .subscribe(channel, QoS::from(qos))
            .await
            .map_err(|_| SubscribeError::NotConnected)?;
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.await_suback(channel)).await {
            Ok(Ok(())) => {
                info!(target: "envbridge.ingest", channel = %channel, qos = ?qos, "mqtt_subscribed");
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(SubscribeError::Timeout(timeout)),
        }
    }

    async fn recv(&mut self) -> Delivery {
        if let Some(message) = self.pending.pop_front() {
            return Delivery::Message(message);
        }
        if !self.live {
            return Delivery::Disconnected("connection closed".to_string());
        }
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Delivery::Message(raw_from_publish(publish));
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.live = false;
                    warn!(target: "envbridge.ingest", "mqtt_broker_disconnect");
                    return Delivery::Disconnected("broker sent disconnect".to_string());
                }
                Ok(_) => {}
                Err(err) => {
                    self.live = false;
                    warn!(target: "envbridge.ingest", error = %err, "mqtt_connection_lost");
                    return Delivery::Disconnected(err.to_string());
                }
            }
        }
    }

    async fn close(&mut self) {
        self.pending.clear();
        if !self.live {
            return;
        }
        self.live = false;
        if self.client.disconnect().await.is_ok() {
            // 驱动一次 eventloop 把 DISCONNECT 报文发出去。
            let _ = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, self.eventloop.poll()).await;
        }
        info!(target: "envbridge.ingest", "mqtt_closed");
    }
}
