//! 点位写入内存实现

use crate::error::WriteError;
use crate::traits::PointStore;
use domain::Point;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 点位内存存储
pub struct InMemoryPointStore {
    points: RwLock<Vec<Point>>,
    write_calls: AtomicUsize,
    closed: AtomicBool,
}

impl InMemoryPointStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self {
            points: RwLock::new(Vec::new()),
            write_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// 已写入的点位数量
    pub fn len(&self) -> usize {
        self.points.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 已写入点位的副本（按写入顺序）
    pub fn points(&self) -> Vec<Point> {
        self.points.read().map(|v| v.clone()).unwrap_or_default()
    }

    /// `write_points` 调用次数（即批次数）
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::Relaxed)
    }

    /// 是否已被 `close` 释放
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryPointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PointStore for InMemoryPointStore {
    async fn write_points(&self, points: &[Point]) -> Result<(), WriteError> {
        if self.is_closed() {
            return Err(WriteError::Permanent("store closed".to_string()));
        }
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        let mut store = self
            .points
            .write()
            .map_err(|_| WriteError::Permanent("lock failed".to_string()))?;
        store.extend(points.iter().cloned());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
