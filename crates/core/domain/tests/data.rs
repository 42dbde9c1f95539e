use domain::{ConnectionState, DEVICE_TAG_KEY, Point, RawMessage};

#[test]
fn point_builds_with_tags_and_fields() {
    let point = Point::new("sensor_data", 1_700_000_000_000)
        .with_tag(DEVICE_TAG_KEY, "sensor-01")
        .with_field("temperature", 23.5)
        .with_field("humidity", 61.2);

    assert_eq!(point.measurement(), "sensor_data");
    assert_eq!(point.tag("device"), Some("sensor-01"));
    assert_eq!(point.field("temperature"), Some(23.5));
    assert_eq!(point.field("humidity"), Some(61.2));
    assert_eq!(point.fields().len(), 2);
    assert_eq!(point.fields()[0].0, "temperature");
    assert_eq!(point.timestamp_ms(), 1_700_000_000_000);
}

#[test]
fn point_field_overwrite_keeps_position() {
    let point = Point::new("m", 1)
        .with_field("a", 1.0)
        .with_field("b", 2.0)
        .with_field("a", 3.0);
    assert_eq!(point.fields(), &[("a".to_string(), 3.0), ("b".to_string(), 2.0)]);
}

#[test]
fn raw_message_lossy_payload() {
    let raw = RawMessage::new("sensors/data", vec![b'{', 0xff, b'}'], 1);
    assert_eq!(raw.payload_lossy(), "{\u{fffd}}");
}

#[test]
fn connection_state_labels() {
    assert_eq!(ConnectionState::Subscribed.to_string(), "subscribed");
    assert!(ConnectionState::Faulted.is_terminal());
    assert!(!ConnectionState::Disconnected.is_terminal());
}
