//! 传感器模拟发布器：按固定间隔向 MQTT 发布随机温湿度读数（联调用）。

use envbridge_config::SimulatorConfig;
use envbridge_ingest::Qos;
use envbridge_telemetry::init_tracing;
use rand::Rng;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use tracing::{info, warn};

const TEMPERATURE_RANGE: (f64, f64) = (20.0, 45.0);
const HUMIDITY_RANGE: (f64, f64) = (40.0, 90.0);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = SimulatorConfig::from_env()?;
    init_tracing();

    let mut options = MqttOptions::new(
        config.mqtt.client_id.clone(),
        config.mqtt.host.clone(),
        config.mqtt.port,
    );
    options.set_keep_alive(Duration::from_secs(config.mqtt.keep_alive_seconds.max(5)));
    if let (Some(username), Some(password)) = (config.mqtt.username, config.mqtt.password) {
        options.set_credentials(username, password);
    }
    let (client, mut eventloop) = AsyncClient::new(options, 10);
    let poller = tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!(target: "envbridge.sim", error = %err, "mqtt_eventloop_error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    info!(
        target: "envbridge.sim",
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        topic = %config.mqtt.topic,
        interval_ms = config.interval_ms,
        "simulator_started"
    );

    let qos = QoS::from(Qos::from_u8(config.mqtt.qos));
    let mut ticker = tokio::time::interval(Duration::from_millis(config.interval_ms.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let payload = {
                    let mut rng = rand::thread_rng();
                    sample_payload(&mut rng)
                };
                match client
                    .publish(config.mqtt.topic.as_str(), qos, false, payload.clone())
                    .await
                {
                    Ok(()) => info!(target: "envbridge.sim", payload = %payload, "reading_published"),
                    Err(err) => warn!(target: "envbridge.sim", error = %err, "publish_failed"),
                }
            }
        }
    }

    let _ = client.disconnect().await;
    poller.abort();
    info!(target: "envbridge.sim", "simulator_stopped");
    Ok(())
}

/// 生成一条 `{"temperature": .., "humidity": ..}` 报文，数值保留两位小数。
fn sample_payload(rng: &mut impl Rng) -> String {
    let temperature = round2(rng.gen_range(TEMPERATURE_RANGE.0..=TEMPERATURE_RANGE.1));
    let humidity = round2(rng.gen_range(HUMIDITY_RANGE.0..=HUMIDITY_RANGE.1));
    serde_json::json!({
        "temperature": temperature,
        "humidity": humidity,
    })
    .to_string()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn sample_payload_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let payload = sample_payload(&mut rng);
            let value: serde_json::Value = serde_json::from_str(&payload).expect("json");
            let temperature = value["temperature"].as_f64().expect("temperature");
            let humidity = value["humidity"].as_f64().expect("humidity");
            assert!((20.0..=45.0).contains(&temperature));
            assert!((40.0..=90.0).contains(&humidity));
            assert_eq!(round2(temperature), temperature);
        }
    }

    #[test]
    fn configured_qos_levels_map_to_mqtt() {
        assert_eq!(QoS::from(Qos::from_u8(0)), QoS::AtMostOnce);
        assert_eq!(QoS::from(Qos::from_u8(1)), QoS::AtLeastOnce);
        assert_eq!(QoS::from(Qos::from_u8(2)), QoS::ExactlyOnce);
    }
}
