//! # envbridge Storage 模块
//!
//! 时序存储写入抽象层，桥接流水线只通过 [`PointStore`] 写入点位。
//!
//! ## 模块说明
//!
//! - [`traits`]：写入接口定义（`PointStore`）
//! - [`error`]：写入错误（暂时性 / 永久性），决定上层是否重试
//! - [`line_protocol`]：InfluxDB 行协议编码
//! - [`influx`]：InfluxDB v2 HTTP 写入实现（生产环境使用）
//! - [`in_memory`]：内存实现（用于单元测试、集成测试和演示）
//!
//! ## 写入语义
//!
//! - 一次 `write_points` 调用对应一次 HTTP 请求，批内点位同成同败
//! - 网络错误、超时、429、5xx 归类为暂时性错误，可重试
//! - 其余 4xx（行协议错误、鉴权失败、bucket 不存在）归类为永久性错误
//! - 时间戳精度为毫秒（`precision=ms`）
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use envbridge_storage::{InfluxPointStore, InfluxStoreConfig, PointStore};
//!
//! let store = InfluxPointStore::new(InfluxStoreConfig {
//!     url: "http://localhost:8086".to_string(),
//!     token: "token".to_string(),
//!     org: "org".to_string(),
//!     bucket: "bucket".to_string(),
//!     timeout: std::time::Duration::from_secs(10),
//! })?;
//! store.write_points(&points).await?;
//! ```

pub mod error;
pub mod in_memory;
pub mod influx;
pub mod line_protocol;
pub mod traits;

pub use error::*;
pub use in_memory::InMemoryPointStore;
pub use influx::{InfluxPointStore, InfluxStoreConfig};
pub use line_protocol::{encode_batch, encode_point};
pub use traits::*;
