use domain::Point;
use envbridge_storage::{encode_batch, encode_point};

#[test]
fn sensor_point_encodes_to_line_protocol() {
    let point = Point::new("sensor_data", 1_700_000_000_000)
        .with_tag("device", "sensor-01")
        .with_field("temperature", 23.5)
        .with_field("humidity", 61.2);
    assert_eq!(
        encode_point(&point),
        "sensor_data,device=sensor-01 temperature=23.5,humidity=61.2 1700000000000"
    );
}

#[test]
fn tags_are_sorted_by_key() {
    let point = Point::new("m", 1)
        .with_tag("site", "lab")
        .with_tag("device", "d1")
        .with_field("v", 1.5);
    assert_eq!(encode_point(&point), "m,device=d1,site=lab v=1.5 1");
}

#[test]
fn batch_is_newline_separated() {
    let points = vec![
        Point::new("m", 1).with_field("v", 1.0),
        Point::new("m", 2).with_field("v", 2.5),
    ];
    assert_eq!(encode_batch(&points), "m v=1 1\nm v=2.5 2");
    assert_eq!(encode_batch(&[]), "");
}
