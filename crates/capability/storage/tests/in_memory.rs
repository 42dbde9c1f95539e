use domain::Point;
use envbridge_storage::{InMemoryPointStore, PointStore, WriteError};

fn sample_point(ts_ms: i64) -> Point {
    Point::new("sensor_data", ts_ms)
        .with_tag("device", "sensor-01")
        .with_field("temperature", 23.5)
        .with_field("humidity", 61.2)
}

#[tokio::test]
async fn writes_accumulate_in_order() {
    let store = InMemoryPointStore::new();
    store
        .write_points(&[sample_point(1), sample_point(2)])
        .await
        .expect("write");
    store.write_points(&[sample_point(3)]).await.expect("write");

    let points = store.points();
    assert_eq!(store.len(), 3);
    assert_eq!(store.write_calls(), 2);
    assert_eq!(
        points.iter().map(Point::timestamp_ms).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn closed_store_rejects_writes() {
    let store = InMemoryPointStore::new();
    store.close().await;
    assert!(store.is_closed());
    let err = store
        .write_points(&[sample_point(1)])
        .await
        .expect_err("closed");
    assert_eq!(err, WriteError::Permanent("store closed".to_string()));
    assert!(store.is_empty());
}
