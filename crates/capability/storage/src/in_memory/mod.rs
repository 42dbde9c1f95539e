//! 内存存储实现
//!
//! 仅用于本地测试和演示。

pub mod point;

pub use point::InMemoryPointStore;
