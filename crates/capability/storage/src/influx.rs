//! InfluxDB v2 HTTP 写入实现
//!
//! `POST {url}/api/v2/write?org=..&bucket=..&precision=ms`，
//! 请求头 `Authorization: Token <token>`，请求体为行协议文本。

use crate::error::WriteError;
use crate::line_protocol::encode_batch;
use crate::traits::PointStore;
use async_trait::async_trait;
use domain::Point;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, info};

/// 错误响应体最多保留的字符数。
const MAX_ERROR_BODY_CHARS: usize = 256;

/// InfluxDB 写入配置
#[derive(Debug, Clone)]
pub struct InfluxStoreConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub timeout: Duration,
}

/// InfluxDB v2 点位存储
#[derive(Clone)]
pub struct InfluxPointStore {
    client: reqwest::Client,
    write_url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxPointStore {
    /// 创建写入客户端（不发起网络请求）
    pub fn new(config: InfluxStoreConfig) -> Result<Self, WriteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| WriteError::Permanent(err.to_string()))?;
        Ok(Self {
            client,
            write_url: write_url(&config.url),
            token: config.token,
            org: config.org,
            bucket: config.bucket,
        })
    }

    pub fn write_url(&self) -> &str {
        &self.write_url
    }
}

#[async_trait]
impl PointStore for InfluxPointStore {
    async fn write_points(&self, points: &[Point]) -> Result<(), WriteError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = encode_batch(points);
        debug!(
            target: "envbridge.writer",
            points = points.len(),
            bytes = body.len(),
            bucket = %self.bucket,
            "influx_write_request"
        );
        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &detail))
    }

    async fn close(&self) {
        info!(target: "envbridge.writer", bucket = %self.bucket, "influx_client_released");
    }
}

fn write_url(base: &str) -> String {
    format!("{}/api/v2/write", base.trim_end_matches('/'))
}

fn classify_request_error(err: reqwest::Error) -> WriteError {
    if err.is_builder() {
        WriteError::Permanent(err.to_string())
    } else {
        WriteError::Transient(err.to_string())
    }
}

/// 按 HTTP 状态码区分可重试与不可重试
fn classify_status(status: u16, body: &str) -> WriteError {
    let detail: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    let message = if detail.is_empty() {
        format!("status {}", status)
    } else {
        format!("status {}: {}", status, detail)
    };
    match status {
        408 | 429 | 500..=599 => WriteError::Transient(message),
        _ => WriteError::Permanent(message),
    }
}
