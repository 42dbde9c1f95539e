//! 存储接口 Trait 定义

use crate::error::WriteError;
use async_trait::async_trait;
use domain::Point;

/// 时序点位写入接口
///
/// 成功返回即表示存储端已确认写入（一致性由存储自身保证）。
#[async_trait]
pub trait PointStore: Send + Sync {
    /// 写入一批点位，批内同成同败
    async fn write_points(&self, points: &[Point]) -> Result<(), WriteError>;

    /// 释放底层客户端资源
    async fn close(&self) {}
}
