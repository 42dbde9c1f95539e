//! 传输层错误类型定义

use std::time::Duration;

/// 建立连接失败。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// 在超时时间内未收到 CONNACK
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// 网络错误或 Broker 暂时拒绝
    #[error("network error: {0}")]
    Network(String),

    /// 凭据或授权被拒（重试无法恢复）
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl ConnectError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ConnectError::Unauthorized(_))
    }
}

/// 订阅失败。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    /// 连接已关闭或丢失
    #[error("not connected")]
    NotConnected,

    /// Broker 拒绝订阅（SUBACK 失败码，通常为 ACL）
    #[error("subscription rejected: {0}")]
    Rejected(String),

    /// 等待 SUBACK 期间网络错误
    #[error("network error: {0}")]
    Network(String),

    /// 在超时时间内未收到 SUBACK
    #[error("subscribe timed out after {0:?}")]
    Timeout(Duration),
}

impl SubscribeError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SubscribeError::Rejected(_))
    }
}
