//! 采集桥接守护进程：订阅 MQTT 传感器报文并写入 InfluxDB。

mod bridge;

use envbridge_config::BridgeConfig;
use envbridge_telemetry::{MetricsSnapshot, init_tracing, metrics};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const USAGE: &str = "usage: envbridge [run]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    parse_command(std::env::args().skip(1))?;
    // 从环境变量加载运行配置
    let config = BridgeConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let controller = bridge::build_controller(&config)?;

    // Ctrl-C 触发协作式关停
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "envbridge.control", "shutdown_requested");
        } else {
            warn!(target: "envbridge.control", "ctrl_c_listener_failed");
        }
        signal_token.cancel();
    });

    let result = controller.run(shutdown).await;
    log_metrics_summary(&metrics().snapshot());
    result?;
    Ok(())
}

/// 仅接受无参数或 `run` 子命令。
fn parse_command(mut args: impl Iterator<Item = String>) -> Result<(), String> {
    match (args.next(), args.next()) {
        (None, _) => Ok(()),
        (Some(command), None) if command == "run" => Ok(()),
        _ => Err(USAGE.to_string()),
    }
}

fn log_metrics_summary(snapshot: &MetricsSnapshot) {
    let avg_write_latency_ms = if snapshot.write_latency_ms_count == 0 {
        0
    } else {
        snapshot.write_latency_ms_total / snapshot.write_latency_ms_count
    };
    info!(
        target: "envbridge.control",
        messages_received = snapshot.messages_received,
        decode_failures = snapshot.decode_failures(),
        points_built = snapshot.points_built,
        points_written = snapshot.points_written,
        points_dropped = snapshot.points_dropped,
        write_retries = snapshot.write_retries,
        batches_flushed = snapshot.batches_flushed,
        backpressure_waits = snapshot.backpressure_waits,
        reconnects = snapshot.reconnects,
        avg_write_latency_ms = avg_write_latency_ms,
        "metrics_summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn accepts_no_arguments_or_run() {
        assert!(parse_command(args(&[])).is_ok());
        assert!(parse_command(args(&["run"])).is_ok());
    }

    #[test]
    fn rejects_unknown_commands() {
        assert_eq!(parse_command(args(&["serve"])), Err(USAGE.to_string()));
        assert!(parse_command(args(&["run", "--verbose"])).is_err());
    }
}
