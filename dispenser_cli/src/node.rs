//! Node assembly: config mapping, hardware selection and the three commands.

use std::sync::atomic::AtomicBool;

use dispenser_config::Config;
use dispenser_core::{
    Calibration, DispenseController, DispenseSummary, Dispenser, EventsCfg, LoadCellAdapter,
    LogSink, RunnerStats, SafetyCfg, SamplingMode, ScheduleCfg, SensorCfg,
};
use dispenser_traits::{EventSink, Gate, RequestSource, Scale};
use eyre::{Result, WrapErr};

use crate::backend::{RestClient, RestRequests, RestSink};
use crate::cli::MAX_DISPENSE_MS;

pub type BoxScale = Box<dyn Scale + Send>;
pub type BoxGate = Box<dyn Gate>;
pub type BoxSink = Box<dyn EventSink + Send>;

/// Scale, gate and optional manual trigger for this node.
pub struct Hardware {
    pub scale: BoxScale,
    pub gate: BoxGate,
    pub button: Option<Box<dyn RequestSource>>,
}

#[cfg(feature = "hardware")]
pub fn make_hardware(cfg: &Config) -> Result<Hardware> {
    use dispenser_hardware::{ButtonTrigger, HardwareScale, ServoGate};

    let scale = HardwareScale::new(cfg.pins.hx711_dt, cfg.pins.hx711_sck)
        .wrap_err("open hx711")?;
    let gate = ServoGate::new(
        cfg.pins.servo,
        cfg.gate.open_angle_deg,
        cfg.gate.closed_angle_deg,
    )
    .wrap_err("open servo gate")?;
    let button = match cfg.pins.button {
        Some(pin) => {
            let b = ButtonTrigger::new(pin, cfg.manual.button_grams, cfg.manual.debounce_n)
                .wrap_err("open button")?;
            Some(Box::new(b) as Box<dyn RequestSource>)
        }
        None => None,
    };
    tracing::info!(
        dt = cfg.pins.hx711_dt,
        sck = cfg.pins.hx711_sck,
        servo = cfg.pins.servo,
        button = ?cfg.pins.button,
        "hardware initialized"
    );
    Ok(Hardware {
        scale: Box::new(scale),
        gate: Box::new(gate),
        button,
    })
}

#[cfg(not(feature = "hardware"))]
pub fn make_hardware(cfg: &Config) -> Result<Hardware> {
    use dispenser_hardware::SimulatedHopper;

    let mass_g = env_f32("DISPENSER_TEST_SIM_MASS").unwrap_or(1000.0);
    let flow = env_f32("DISPENSER_TEST_SIM_FLOW").unwrap_or(2.0);
    let hopper = SimulatedHopper::new(
        mass_g,
        cfg.calibration.gain_g_per_count,
        cfg.calibration.zero_counts,
    )
    .with_flow(flow);
    if env_flag("DISPENSER_TEST_SIM_STUCK") {
        hopper.set_stuck(true);
    }
    if env_flag("DISPENSER_TEST_SIM_OFFLINE") {
        hopper.set_sensor_offline(true);
    }
    tracing::info!(mass_g, flow_g_per_read = flow, "using simulated hopper");
    Ok(Hardware {
        scale: Box::new(hopper.scale()),
        gate: Box::new(hopper.gate()),
        button: None,
    })
}

#[cfg(not(feature = "hardware"))]
fn env_f32(key: &str) -> Option<f32> {
    std::env::var(key).ok().and_then(|v| v.parse::<f32>().ok())
}

#[cfg(not(feature = "hardware"))]
fn env_flag(key: &str) -> bool {
    std::env::var(key).is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}

/// Wrap the scale in the calibrated adapter, taring first when configured.
pub fn make_adapter(cfg: &Config, scale: BoxScale) -> Result<LoadCellAdapter<BoxScale>> {
    let mut adapter = LoadCellAdapter::new(
        scale,
        Calibration::from(&cfg.calibration),
        SensorCfg::from(&cfg.sensor),
    );
    if cfg.sensor.tare_on_start {
        adapter.tare().wrap_err("tare on start")?;
    }
    Ok(adapter)
}

pub fn make_controller(
    cfg: &Config,
    gate: BoxGate,
    safety: SafetyCfg,
) -> Result<DispenseController<BoxGate>> {
    DispenseController::builder()
        .with_gate(gate)
        .with_device_id(cfg.device_id.clone())
        .with_safety(safety)
        .with_events(EventsCfg::from(&cfg.events))
        .build()
}

/// REST sink when a backend is configured, otherwise the log.
pub fn make_sink(cfg: &Config) -> Result<BoxSink> {
    match &cfg.backend {
        Some(b) => {
            let client = RestClient::new(b).wrap_err("create backend client")?;
            tracing::info!(url = %b.url, table = %b.events_table, "events go to REST backend");
            Ok(Box::new(RestSink::new(client, b)))
        }
        None => {
            tracing::info!("no [backend] configured; events go to the log");
            Ok(Box::new(LogSink))
        }
    }
}

fn make_dispenser(
    cfg: &Config,
    hw: Hardware,
    safety: SafetyCfg,
) -> Result<(Dispenser<BoxScale, BoxGate>, Option<Box<dyn RequestSource>>)> {
    let adapter = make_adapter(cfg, hw.scale)?;
    let controller = make_controller(cfg, hw.gate, safety)?;
    let sink = make_sink(cfg)?;
    let _ = MAX_DISPENSE_MS.set(safety.max_dispense_ms);
    let node = Dispenser::new(
        adapter,
        controller,
        sink,
        ScheduleCfg::from(&cfg.schedule),
        SamplingMode::from(cfg.runner.mode),
    );
    Ok((node, hw.button))
}

/// `run`: serve button and backend requests until `shutdown` is raised.
pub fn run_node(cfg: &Config, shutdown: &AtomicBool) -> Result<RunnerStats> {
    let hw = make_hardware(cfg)?;
    let (mut node, button) = make_dispenser(cfg, hw, SafetyCfg::from(&cfg.safety))?;

    if let Some(button) = button {
        // Button presses need fast polling for debouncing.
        node.add_request_source("button", button, cfg.schedule.loop_ms.max(1));
    }
    if let Some(b) = &cfg.backend {
        let client = RestClient::new(b).wrap_err("create backend client")?;
        node.add_request_source(
            "backend",
            RestRequests::new(client, b),
            cfg.schedule.request_poll_ms,
        );
    }
    Ok(node.run(shutdown))
}

/// `dispense`: one session, returned whatever its outcome.
pub fn dispense_once(
    cfg: &Config,
    grams: f32,
    max_dispense_ms: Option<u64>,
    shutdown: &AtomicBool,
) -> Result<DispenseSummary> {
    let mut safety = SafetyCfg::from(&cfg.safety);
    if let Some(ms) = max_dispense_ms {
        safety.max_dispense_ms = ms;
    }
    let hw = make_hardware(cfg)?;
    let (mut node, _button) = make_dispenser(cfg, hw, safety)?;
    tracing::info!(target_g = grams, max_dispense_ms = safety.max_dispense_ms, "dispense start");
    node.dispense(grams, shutdown)
}

/// `self-check`: one calibrated sample.
pub fn self_check(cfg: &Config) -> Result<f32> {
    let hw = make_hardware(cfg)?;
    let mut adapter = make_adapter(cfg, hw.scale)?;
    let grams = adapter.read_mass()?;
    Ok(grams)
}
