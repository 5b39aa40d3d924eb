use clap::Parser;
use log::{error, info, warn};
use matter_entity_bridge::config::{self, DriverConfig, load_dotenv};
use matter_entity_bridge::driver::{Driver, DriverEvent, wait_until_ready};
use matter_entity_bridge::entity::capabilities;
use matter_entity_bridge::entity::device_info::ENTITY_ID_SEPARATOR;
use matter_entity_bridge::matter::clusters::{
    ClusterKind, MeasurementAttribute, RawValue, WindowCoveringAttribute,
};
use matter_entity_bridge::matter::device_types::MatterDeviceType;
use matter_entity_bridge::matter::node::{Endpoint, Node};
use matter_entity_bridge::simulation::{
    RecordingRegistry, SimulatedBridge, SimulatedEndpoint, run_sensor_simulation,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(name = "matter-entity-bridge")]
#[command(about = "Expose the devices of a Matter bridge as controller entities")]
struct Args {
    /// Directory holding driver_config.json
    #[arg(long, env = "UC_DATA_HOME")]
    data_dir: Option<PathBuf>,

    /// Directory checked for a reset marker on start
    #[arg(long, env = "UC_CONFIG_HOME")]
    config_dir: Option<PathBuf>,

    /// env_logger filter, overrides the configured driver log level
    #[arg(long)]
    log_level: Option<String>,

    /// Seconds between simulated sensor readings
    #[arg(long, default_value_t = 10)]
    sensor_period: u64,
}

fn init_logger(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

/// A bridge with one device of every supported kind.
fn demo_bridge() -> SimulatedBridge {
    let sim = SimulatedBridge::new(0x1234, "Acme", "Demo Hub", "Demo Hub");

    let plug = SimulatedEndpoint::on_off_plug(2).with_basic_info(None, Some("Desk Plug"), None);
    let light = SimulatedEndpoint::light(3, MatterDeviceType::ExtendedColorLight.id(), true, true)
        .with_basic_info(None, Some("Ceiling Light"), None);
    let sensor = SimulatedEndpoint::temperature_sensor(4)
        .with_basic_info(None, Some("Hallway Thermometer"), None);
    let cover = SimulatedEndpoint::window_covering(5, 0x05)
        .with_basic_info(None, Some("Living Room Blind"), None);

    if let Some(cluster) = sensor.cluster(ClusterKind::TemperatureMeasurement) {
        cluster.set_cached(MeasurementAttribute::MeasuredValue as u32, RawValue::Int(2150));
    }
    if let Some(cluster) = cover.cluster(ClusterKind::WindowCovering) {
        for attribute in [
            WindowCoveringAttribute::CurrentPositionLiftPercent100ths,
            WindowCoveringAttribute::TargetPositionLiftPercent100ths,
        ] {
            cluster.set_cached(attribute as u32, RawValue::Int(10_000));
        }
    }

    for endpoint in [plug, light, sensor, cover] {
        for cluster in endpoint.clusters() {
            cluster.apply_commands(true);
        }
        sim.add_endpoint(endpoint);
    }
    sim
}

fn main() {
    // Must run before the runtime starts its worker threads
    load_dotenv();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start the tokio runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run());
}

async fn run() {
    let args = Args::parse();

    let data_dir = args.data_dir.unwrap_or_else(DriverConfig::default_data_dir);
    if let Some(config_dir) = &args.config_dir
        && let Err(e) = config::check_config_reset(config_dir, &data_dir)
    {
        eprintln!("Configuration reset failed: {}", e);
    }

    let config = DriverConfig::load(&data_dir);
    let mut settings = config.get().clone();
    let env_result = settings.apply_env();

    init_logger(args.log_level.as_deref().unwrap_or(settings.log_filter()));
    info!("Starting Matter entity bridge");
    info!("[Config] Loaded from {:?}", config.path());
    if let Err(e) = env_result {
        warn!("[Config] Ignoring environment overrides: {}", e);
    }

    if let Err(e) = capabilities::validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    let sim = demo_bridge();
    let node_sim = sim.clone();
    if let Err(e) = wait_until_ready(
        move || node_sim.node().is_connected(),
        settings.start_poll_interval(),
        settings.start_timeout(),
    )
    .await
    {
        error!("{}", e);
        std::process::exit(1);
    }

    let bridge = match sim.bridge().await {
        Ok(bridge) => bridge,
        Err(e) => {
            error!("Failed to discover bridge: {}", e);
            std::process::exit(1);
        }
    };

    let registry = Arc::new(RecordingRegistry::new());
    let (handle, driver_task) = Driver::new(registry, &settings).spawn();

    let entity_ids: Vec<String> = sim
        .endpoints()
        .iter()
        .map(|endpoint| {
            format!(
                "{}{}{}",
                bridge.identifier,
                ENTITY_ID_SEPARATOR,
                endpoint.number()
            )
        })
        .collect();
    if let Err(e) = handle.send(DriverEvent::BridgeAdded(bridge)).await {
        error!("{}", e);
    }
    if let Err(e) = handle.send(DriverEvent::Subscribe(entity_ids.clone())).await {
        error!("{}", e);
    }
    info!("Subscribed to {} entities", entity_ids.len());

    let activity = run_sensor_simulation(sim, Duration::from_secs(args.sensor_period));

    info!("Matter entity bridge is running");
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    activity.abort();
    let _ = handle.send(DriverEvent::BridgeRemoved(None)).await;
    drop(handle);
    if let Err(e) = driver_task.await {
        error!("Driver task failed: {}", e);
    }

    info!("Matter entity bridge stopped");
}
