//! InfluxDB 行协议编码
//!
//! ```text
//! measurement,tag1=val1 field1=1.5,field2=2 timestamp_ms
//! ```
//!
//! 标签按键排序（Point 内部为 BTreeMap），字段保持构建顺序。
//! 时间戳单位为毫秒，写入时需携带 `precision=ms`。

use domain::Point;

/// 编码单个点位。
pub fn encode_point(point: &Point) -> String {
    let mut line = escape_measurement(point.measurement());

    for (key, value) in point.tags() {
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    line.push(' ');
    for (i, (key, value)) in point.fields().iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&value.to_string());
    }

    line.push(' ');
    line.push_str(&point.timestamp_ms().to_string());
    line
}

/// 编码一批点位，每行一个点。
pub fn encode_batch(points: &[Point]) -> String {
    points
        .iter()
        .map(encode_point)
        .collect::<Vec<_>>()
        .join("\n")
}

// measurement 中需转义逗号与空格。
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

// 标签键、标签值、字段键需转义逗号、等号与空格。
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_float_has_no_suffix() {
        let point = Point::new("m", 5).with_field("v", 20.0);
        assert_eq!(encode_point(&point), "m v=20 5");
    }

    #[test]
    fn escapes_special_characters() {
        let point = Point::new("my measurement", 3)
            .with_tag("tag key", "a,b=c")
            .with_field("field=key", 1.25);
        assert_eq!(
            encode_point(&point),
            "my\\ measurement,tag\\ key=a\\,b\\=c field\\=key=1.25 3"
        );
    }
}
