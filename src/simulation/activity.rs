//! Device activity simulation for the demo binary.
//!
//! Periodically drifts sensor readings so that subscribed entities receive
//! attribute updates without a real bridge.

use super::node::SimulatedBridge;
use crate::matter::clusters::{ClusterClient, ClusterKind, MeasurementAttribute, RawValue};
use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};

/// Step applied to measured values on every tick, in hundredths.
const DRIFT_STEP: i64 = 25;

/// Spawn a task that moves every measured value up and down by a small step.
///
/// # Returns
///
/// A `JoinHandle` that can be used to abort the simulation task.
pub fn run_sensor_simulation(bridge: SimulatedBridge, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(period);
        let mut rising = true;
        loop {
            interval.tick().await;
            let step = if rising { DRIFT_STEP } else { -DRIFT_STEP };
            rising = !rising;

            for endpoint in bridge.endpoints() {
                for kind in [
                    ClusterKind::TemperatureMeasurement,
                    ClusterKind::RelativeHumidityMeasurement,
                ] {
                    let Some(cluster) = endpoint.cluster(kind) else {
                        continue;
                    };
                    let attribute = MeasurementAttribute::MeasuredValue as u32;
                    let current = cluster.cached_attribute(attribute).as_int().unwrap_or(0);
                    debug!("[Sim] {:?} drifts to {}", kind, current + step);
                    cluster.report(attribute, RawValue::Int(current + step));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulatedEndpoint;

    #[tokio::test(start_paused = true)]
    async fn test_sensor_values_drift() {
        let sim = SimulatedBridge::new(1, "Acme", "Hub", "Hub");
        let sensor = SimulatedEndpoint::temperature_sensor(2);
        let cluster = sensor.cluster(ClusterKind::TemperatureMeasurement).unwrap();
        cluster.set_cached(MeasurementAttribute::MeasuredValue as u32, RawValue::Int(2000));
        sim.add_endpoint(sensor);

        let task = run_sensor_simulation(sim, Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(
            cluster.cached_attribute(MeasurementAttribute::MeasuredValue as u32),
            RawValue::Int(2000 + DRIFT_STEP)
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            cluster.cached_attribute(MeasurementAttribute::MeasuredValue as u32),
            RawValue::Int(2000)
        );
        task.abort();
    }
}
