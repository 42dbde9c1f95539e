use domain::Point;
use envbridge_storage::{InfluxPointStore, InfluxStoreConfig, PointStore, WriteError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn sample_point() -> Point {
    Point::new("sensor_data", 1_700_000_000_000)
        .with_tag("device", "sensor-01")
        .with_field("temperature", 23.5)
        .with_field("humidity", 61.2)
}

fn store_for(url: String) -> InfluxPointStore {
    InfluxPointStore::new(InfluxStoreConfig {
        url,
        token: "secret-token".to_string(),
        org: "my-org".to_string(),
        bucket: "sensors".to_string(),
        timeout: Duration::from_secs(5),
    })
    .expect("client")
}

/// 单次 HTTP 应答器：读取完整请求后回写给定状态行，返回原始请求文本。
async fn spawn_responder(
    status_line: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.expect("read");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }
        let response = format!(
            "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write");
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&buf).into_owned()
    });
    (format!("http://{}", addr), handle)
}

fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    buf.len() >= header_end + 4 + content_length
}

#[tokio::test]
async fn write_posts_line_protocol_with_token() {
    let (url, server) = spawn_responder("HTTP/1.1 204 No Content", "").await;
    let store = store_for(url);
    store
        .write_points(&[sample_point()])
        .await
        .expect("write");

    let request = server.await.expect("server");
    let request_line = request.lines().next().expect("request line");
    assert!(request_line.starts_with("POST /api/v2/write?"));
    assert!(request_line.contains("org=my-org"));
    assert!(request_line.contains("bucket=sensors"));
    assert!(request_line.contains("precision=ms"));
    assert!(
        request
            .to_ascii_lowercase()
            .contains("authorization: token secret-token")
    );
    assert!(request.ends_with(
        "sensor_data,device=sensor-01 temperature=23.5,humidity=61.2 1700000000000"
    ));
}

#[tokio::test]
async fn service_unavailable_is_transient() {
    let (url, server) = spawn_responder("HTTP/1.1 503 Service Unavailable", "overloaded").await;
    let store = store_for(url);
    let err = store
        .write_points(&[sample_point()])
        .await
        .expect_err("503");
    let _ = server.await;
    assert!(err.is_transient());
    assert!(err.to_string().contains("overloaded"));
}

#[tokio::test]
async fn unauthorized_is_permanent() {
    let (url, server) = spawn_responder(
        "HTTP/1.1 401 Unauthorized",
        r#"{"code":"unauthorized","message":"unauthorized access"}"#,
    )
    .await;
    let store = store_for(url);
    let err = store
        .write_points(&[sample_point()])
        .await
        .expect_err("401");
    let _ = server.await;
    assert!(matches!(err, WriteError::Permanent(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_transient() {
    // 绑定后立即释放端口，连接将被拒绝。
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let store = store_for(format!("http://{}", addr));
    let err = store
        .write_points(&[sample_point()])
        .await
        .expect_err("refused");
    assert!(err.is_transient());
}

#[tokio::test]
async fn empty_batch_skips_request() {
    let store = store_for("http://127.0.0.1:9".to_string());
    store.write_points(&[]).await.expect("noop");
}
