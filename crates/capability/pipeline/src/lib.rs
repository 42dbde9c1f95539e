use domain::{Backoff, BackoffPolicy, DEVICE_TAG_KEY, Point};
use envbridge_storage::{PointStore, WriteError};
use envbridge_telemetry::{
    record_backpressure_wait, record_batch_flushed, record_points_dropped, record_points_written,
    record_write_latency_ms, record_write_retry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Pipeline 处理错误。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("dropped {points} point(s) after {attempts} attempt(s): {source}")]
    Dropped {
        points: usize,
        attempts: u32,
        #[source]
        source: WriteError,
    },
    #[error("flush timed out after {0:?}")]
    FlushTimeout(Duration),
    #[error("writer closed")]
    Closed,
}

/// 写入参数。
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    /// 单批最多尝试次数（含首次）。
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    /// 未满批次的最长滞留时间。
    pub flush_interval: Duration,
    /// 控制器与写入任务之间的有界队列容量。
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            flush_interval: Duration::from_secs(1),
            queue_capacity: 64,
        }
    }
}

impl PipelineConfig {
    fn sanitized(mut self) -> Self {
        if self.batch_size == 0 {
            self.batch_size = 1;
        }
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        if self.flush_interval.is_zero() {
            self.flush_interval = Duration::from_millis(1);
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = 1;
        }
        self
    }
}

/// 关停超时后放弃的点位使用的丢弃原因。
pub const SHUTDOWN_TIMEOUT_REASON: &str = "shutdown_timeout";

/// 写入任务在关停期限之后用于上报的额外等待。
const ABANDON_GRACE: Duration = Duration::from_millis(500);

/// 点位写入器：按批缓冲，暂时性失败有界退避重试，耗尽后丢弃并上报。
///
/// 缓冲区最多容纳 `batch_size` 个点位，存储长时间不可用时不会无限增长。
/// `flush` 可被取消：写入完成前批次保留在缓冲区中。
pub struct StoreWriter {
    store: Arc<dyn PointStore>,
    config: PipelineConfig,
    buffer: Vec<Point>,
    first_buffered_at: Option<Instant>,
}

impl StoreWriter {
    pub fn new(store: Arc<dyn PointStore>, config: PipelineConfig) -> Self {
        let config = config.sanitized();
        Self {
            store,
            buffer: Vec::with_capacity(config.batch_size),
            config,
            first_buffered_at: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 当前缓冲中的点位数。
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// 缓冲一个点位；缓冲满一批时立即刷写。
    pub async fn write(&mut self, point: Point) -> Result<(), PipelineError> {
        if self.buffer.is_empty() {
            self.first_buffered_at = Some(Instant::now());
        }
        self.buffer.push(point);
        if self.buffer.len() >= self.config.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// 刷写缓冲区，返回写入成功的点位数。
    pub async fn flush(&mut self) -> Result<usize, PipelineError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let outcome = self.write_batch_with_retry(&self.buffer).await;
        let batch = std::mem::take(&mut self.buffer);
        self.first_buffered_at = None;

        match outcome {
            Ok(attempts) => {
                record_batch_flushed();
                record_points_written(batch.len() as u64);
                for point in &batch {
                    info!(
                        target: "envbridge.writer",
                        measurement = %point.measurement(),
                        device = point.tag(DEVICE_TAG_KEY).unwrap_or(""),
                        fields = %fields_summary(point),
                        ts_ms = point.timestamp_ms(),
                        attempts = attempts,
                        "point_written"
                    );
                }
                Ok(batch.len())
            }
            Err((source, attempts)) => {
                record_points_dropped(batch.len() as u64);
                for point in &batch {
                    warn!(
                        target: "envbridge.writer",
                        measurement = %point.measurement(),
                        device = point.tag(DEVICE_TAG_KEY).unwrap_or(""),
                        fields = %fields_summary(point),
                        ts_ms = point.timestamp_ms(),
                        attempts = attempts,
                        error_kind = source.kind(),
                        error = %source,
                        "point_dropped"
                    );
                }
                Err(PipelineError::Dropped {
                    points: batch.len(),
                    attempts,
                    source,
                })
            }
        }
    }

    /// 最早缓冲的点位是否已滞留超过 `flush_interval`。
    pub fn flush_due(&self) -> bool {
        self.first_buffered_at
            .is_some_and(|since| since.elapsed() >= self.config.flush_interval)
    }

    /// 放弃缓冲批次并逐点上报，返回放弃的点位数。
    pub fn abandon(&mut self, reason: &str) -> usize {
        let batch = std::mem::take(&mut self.buffer);
        self.first_buffered_at = None;
        report_dropped(&batch, reason);
        batch.len()
    }

    async fn write_batch_with_retry(&self, batch: &[Point]) -> Result<u32, (WriteError, u32)> {
        let mut backoff = Backoff::new(self.config.backoff);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let started_at = Instant::now();
            match self.store.write_points(batch).await {
                Ok(()) => {
                    record_write_latency_ms(started_at.elapsed().as_millis() as u64);
                    return Ok(attempt);
                }
                Err(err) => {
                    if !err.is_transient() || attempt >= self.config.max_attempts {
                        return Err((err, attempt));
                    }
                    let delay = backoff.next_delay();
                    record_write_retry();
                    warn!(
                        target: "envbridge.writer",
                        points = batch.len(),
                        attempt = attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "write_retry_scheduled"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// 上报未经存储写入即被丢弃的点位（计数 + 逐点日志）。
pub fn report_dropped(points: &[Point], reason: &str) {
    if points.is_empty() {
        return;
    }
    record_points_dropped(points.len() as u64);
    for point in points {
        warn!(
            target: "envbridge.writer",
            measurement = %point.measurement(),
            device = point.tag(DEVICE_TAG_KEY).unwrap_or(""),
            fields = %fields_summary(point),
            ts_ms = point.timestamp_ms(),
            reason = reason,
            "point_dropped"
        );
    }
}

fn fields_summary(point: &Point) -> String {
    point
        .fields()
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

enum WriterCommand {
    Point(Point),
    Flush(oneshot::Sender<Result<usize, PipelineError>>),
}

/// 写入任务句柄：控制器经有界队列提交点位。
///
/// 队列满时 `submit` 挂起，调用方随之停止读取上游消息（背压）。
pub struct WriterHandle {
    tx: mpsc::Sender<WriterCommand>,
    stop: oneshot::Sender<Duration>,
    task: tokio::task::JoinHandle<()>,
    store: Arc<dyn PointStore>,
}

/// 启动写入任务。
pub fn spawn_writer(store: Arc<dyn PointStore>, config: PipelineConfig) -> WriterHandle {
    let writer = StoreWriter::new(store.clone(), config);
    let (tx, rx) = mpsc::channel(writer.config().queue_capacity);
    let (stop, stop_rx) = oneshot::channel();
    let task = tokio::spawn(run_writer(writer, rx, stop_rx));
    WriterHandle {
        tx,
        stop,
        task,
        store,
    }
}

async fn run_writer(
    mut writer: StoreWriter,
    mut rx: mpsc::Receiver<WriterCommand>,
    mut stop: oneshot::Receiver<Duration>,
) {
    let grace = tokio::select! {
        biased;
        grace = &mut stop => grace.ok(),
        _ = serve(&mut writer, &mut rx) => None,
    };
    match grace {
        Some(grace) => finish_within(&mut writer, &mut rx, grace).await,
        None => {
            // 句柄被直接丢弃：排空队列后做最后一次刷写。
            serve(&mut writer, &mut rx).await;
            let _ = writer.flush().await;
        }
    }
    debug!(target: "envbridge.writer", "writer_task_stopped");
}

/// 处理队列命令与按时刷写，直到队列关闭。
async fn serve(writer: &mut StoreWriter, rx: &mut mpsc::Receiver<WriterCommand>) {
    let mut ticker = tokio::time::interval(writer.config().flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(command) => handle_command(writer, command).await,
                None => return,
            },
            _ = ticker.tick() => {
                if writer.flush_due() {
                    let _ = writer.flush().await;
                }
            }
        }
    }
}

async fn handle_command(writer: &mut StoreWriter, command: WriterCommand) {
    match command {
        WriterCommand::Point(point) => {
            // 丢弃已在 flush 内逐点上报。
            let _ = writer.write(point).await;
        }
        WriterCommand::Flush(ack) => {
            let _ = ack.send(writer.flush().await);
        }
    }
}

/// 关停：在 `grace` 内排空队列并刷写；超时则放弃剩余点位并逐点上报。
async fn finish_within(
    writer: &mut StoreWriter,
    rx: &mut mpsc::Receiver<WriterCommand>,
    grace: Duration,
) {
    let drained = tokio::time::timeout(grace, async {
        while let Some(command) = rx.recv().await {
            handle_command(writer, command).await;
        }
        let _ = writer.flush().await;
    })
    .await;
    if drained.is_ok() {
        return;
    }

    let mut abandoned = writer.abandon(SHUTDOWN_TIMEOUT_REASON);
    while let Ok(command) = rx.try_recv() {
        match command {
            WriterCommand::Point(point) => {
                report_dropped(std::slice::from_ref(&point), SHUTDOWN_TIMEOUT_REASON);
                abandoned += 1;
            }
            WriterCommand::Flush(ack) => {
                let _ = ack.send(Err(PipelineError::FlushTimeout(grace)));
            }
        }
    }
    warn!(
        target: "envbridge.writer",
        timeout_ms = grace.as_millis() as u64,
        abandoned = abandoned,
        "writer_shutdown_timed_out"
    );
}

impl WriterHandle {
    /// 提交一个点位；队列满时等待。
    pub async fn submit(&self, point: Point) -> Result<(), PipelineError> {
        match self.tx.try_send(WriterCommand::Point(point)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(command)) => {
                record_backpressure_wait();
                debug!(target: "envbridge.writer", "writer_queue_full");
                self.tx
                    .send(command)
                    .await
                    .map_err(|_| PipelineError::Closed)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PipelineError::Closed),
        }
    }

    /// 请求写入任务刷写已缓冲批次，最多等待 `timeout`。
    pub async fn flush(&self, timeout: Duration) -> Result<usize, PipelineError> {
        let request = async {
            let (ack_tx, ack_rx) = oneshot::channel();
            self.tx
                .send(WriterCommand::Flush(ack_tx))
                .await
                .map_err(|_| PipelineError::Closed)?;
            ack_rx.await.map_err(|_| PipelineError::Closed)?
        };
        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| PipelineError::FlushTimeout(timeout))?
    }

    /// 队列中尚未被写入任务取走的命令数。
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// 关闭队列，由写入任务在 `timeout` 内排空并刷写，超时未写出的点位逐点上报；
    /// 随后释放存储客户端。
    pub async fn shutdown(self, timeout: Duration) {
        let WriterHandle {
            tx,
            stop,
            mut task,
            store,
        } = self;
        let _ = stop.send(timeout);
        drop(tx);
        if tokio::time::timeout(timeout + ABANDON_GRACE, &mut task)
            .await
            .is_err()
        {
            warn!(
                target: "envbridge.writer",
                timeout_ms = timeout.as_millis() as u64,
                "writer_task_aborted"
            );
            task.abort();
        }
        store.close().await;
    }
}
