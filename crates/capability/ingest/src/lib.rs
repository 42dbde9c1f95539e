//! 传输接入：Broker 连接、订阅与按连接周期投递消息。
//!
//! 每次 `connect` 开启一个新的连接周期（epoch），返回的 [`Connection`]
//! 依次投递该周期内的 [`RawMessage`]；网络中断时投递一次
//! [`Delivery::Disconnected`] 后该周期结束，重连由上层控制器驱动。

pub mod error;
pub mod mqtt;

use async_trait::async_trait;
use domain::RawMessage;
use std::time::Duration;

pub use error::{ConnectError, SubscribeError};
pub use mqtt::{MqttConnection, MqttTransport, MqttTransportConfig};

/// 订阅服务质量（投递保证由传输层定义）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    /// 0/1/2 映射到对应等级，超出范围按至少一次处理。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Qos::AtMostOnce,
            1 => Qos::AtLeastOnce,
            2 => Qos::ExactlyOnce,
            _ => Qos::AtLeastOnce,
        }
    }
}

/// 连接周期内的一次投递。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Message(RawMessage),
    /// 连接已断开，本周期结束。
    Disconnected(String),
}

/// 传输客户端抽象：每次调用建立一条新连接。
#[async_trait]
pub trait Transport: Send + Sync {
    /// Broker 地址（用于日志）。
    fn address(&self) -> String;

    async fn connect(&self, timeout: Duration) -> Result<Box<dyn Connection>, ConnectError>;
}

/// 单个连接周期的句柄。
#[async_trait]
pub trait Connection: Send {
    async fn subscribe(&mut self, channel: &str, qos: Qos) -> Result<(), SubscribeError>;

    /// 等待下一条投递。断开后持续返回 `Delivery::Disconnected`。
    async fn recv(&mut self) -> Delivery;

    /// 尽力通知 Broker 断开并释放连接。
    async fn close(&mut self);
}
