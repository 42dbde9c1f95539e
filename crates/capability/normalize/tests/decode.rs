use domain::RawMessage;
use envbridge_normalize::{DecodeError, PointBuilder, decode};

fn raw(payload: &str) -> RawMessage {
    RawMessage::new("sensors/data", payload.as_bytes().to_vec(), 1_000)
}

#[test]
fn valid_payloads_round_trip_into_points() {
    let builder = PointBuilder::new("sensor_data", "sensor-01");
    let samples = [(23.5, 61.2), (20.0, 40.0), (44.99, 89.01), (-1.5, 0.0)];
    for (t, h) in samples {
        let payload = format!(r#"{{"temperature": {}, "humidity": {}}}"#, t, h);
        let reading = decode(&raw(&payload)).expect("reading");
        let point = builder.build_at(reading, 42);
        assert_eq!(point.measurement(), "sensor_data");
        assert_eq!(point.tag("device"), Some("sensor-01"));
        assert_eq!(point.field("temperature"), Some(t));
        assert_eq!(point.field("humidity"), Some(h));
        assert_eq!(point.timestamp_ms(), 42);
    }
}

#[test]
fn missing_fields_are_reported_by_name() {
    assert_eq!(
        decode(&raw(r#"{"temperature": 23.5}"#)),
        Err(DecodeError::MissingField("humidity"))
    );
    assert_eq!(
        decode(&raw(r#"{"humidity": 61.2}"#)),
        Err(DecodeError::MissingField("temperature"))
    );
    assert_eq!(
        decode(&raw("{}")),
        Err(DecodeError::MissingField("temperature"))
    );
}

#[test]
fn unparseable_payloads_are_malformed() {
    let cases = [
        r#"{"temperature": 23.5, "humidity": 6"#,
        r#"{"temperature": "hot", "humidity": 61.2}"#,
        "[23.5, 61.2]",
        "23.5",
        "",
        "not json",
    ];
    for payload in cases {
        let err = decode(&raw(payload)).expect_err(payload);
        assert!(
            matches!(err, DecodeError::MalformedPayload(_)),
            "{payload:?} -> {err:?}"
        );
    }
}

#[test]
fn invalid_utf8_is_malformed() {
    let message = RawMessage::new("sensors/data", vec![0xff, 0xfe, 0xfd], 1);
    assert!(matches!(
        decode(&message),
        Err(DecodeError::MalformedPayload(_))
    ));
}

#[test]
fn decode_is_idempotent() {
    let message = raw(r#"{"temperature": 31.25, "humidity": 70.5, "extra": true}"#);
    let first = decode(&message).expect("first");
    let second = decode(&message).expect("second");
    assert_eq!(first, second);
}

#[test]
fn build_stamps_ingestion_time() {
    let builder = PointBuilder::default();
    let reading = decode(&raw(r#"{"temperature": 1, "humidity": 2}"#)).expect("reading");
    let before = domain::now_epoch_ms();
    let point = builder.build(reading);
    let after = domain::now_epoch_ms();
    assert!(point.timestamp_ms() >= before && point.timestamp_ms() <= after);
}
