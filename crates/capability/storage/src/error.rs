//! 存储层错误类型
//!
//! 写入失败分为两类：
//! - Transient：网络抖动、超时、限流、服务端 5xx，可退避重试
//! - Permanent：请求本身无效或凭据被拒，重试无意义

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("transient write failure: {0}")]
    Transient(String),
    #[error("permanent write failure: {0}")]
    Permanent(String),
}

impl WriteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, WriteError::Transient(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteError::Transient(_) => "transient",
            WriteError::Permanent(_) => "permanent",
        }
    }
}
