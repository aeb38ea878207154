#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the dispenser node.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section except `[pins]` has defaults matching the reference
//!   firmware cadence (1 s sampling, 5 s telemetry, 50 g button dispense).
use serde::Deserialize;

/// Environment variable consulted when `backend.api_key` is absent.
pub const API_KEY_ENV: &str = "DISPENSER_API_KEY";

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub servo: u8,
    /// Manual dispense push-button (active low, pulled up)
    pub button: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SensorCfg {
    /// Raw reads averaged into one mass sample
    pub average_samples: usize,
    /// Max time to wait for HX711 data-ready per raw read
    pub read_timeout_ms: u64,
    /// Tare the scale at startup. Only safe with an empty hopper: the
    /// controller measures delivery as the drop in hopper weight.
    pub tare_on_start: bool,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            average_samples: 5,
            read_timeout_ms: 150,
            tare_on_start: false,
        }
    }
}

/// Linear raw→grams model: grams = gain_g_per_count * (raw - zero_counts) + offset_g
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CalibrationCfg {
    pub gain_g_per_count: f32,
    pub zero_counts: i32,
    pub offset_g: f32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            // Reference load cell: -7050 counts per unit
            gain_g_per_count: -1.0 / 7050.0,
            zero_counts: 0,
            offset_g: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GateCfg {
    pub open_angle_deg: u8,
    pub closed_angle_deg: u8,
}

impl Default for GateCfg {
    fn default() -> Self {
        Self {
            open_angle_deg: 90,
            closed_angle_deg: 0,
        }
    }
}

/// Independent cadences of the node loop, all in milliseconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleCfg {
    pub sample_ms: u64,
    pub tick_ms: u64,
    pub flush_ms: u64,
    /// Weight telemetry push; 0 disables
    pub telemetry_ms: u64,
    /// Remote/button request polling; 0 disables
    pub request_poll_ms: u64,
    /// Sleep between loop cycles
    pub loop_ms: u64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            sample_ms: 1000,
            tick_ms: 100,
            flush_ms: 1000,
            telemetry_ms: 5000,
            request_poll_ms: 5000,
            loop_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Safety {
    /// Force the gate closed after this long in one session (0 disables)
    pub max_dispense_ms: u64,
    /// Largest target accepted by the controller
    pub max_target_g: f32,
}

impl Default for Safety {
    fn default() -> Self {
        Self {
            max_dispense_ms: 60_000,
            max_target_g: 5000.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsCfg {
    /// Events kept between flushes; oldest are dropped beyond this
    pub max_pending: usize,
}

impl Default for EventsCfg {
    fn default() -> Self {
        Self { max_pending: 32 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ManualCfg {
    /// Grams dispensed per button press
    pub button_grams: f32,
    /// Consecutive pressed polls required before a press counts
    pub debounce_n: u8,
}

impl Default for ManualCfg {
    fn default() -> Self {
        Self {
            button_grams: 50.0,
            debounce_n: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Backend {
    /// Base URL of the REST backend, e.g. https://xyz.supabase.co
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_events_table")]
    pub events_table: String,
    #[serde(default = "default_weights_table")]
    pub weights_table: String,
    #[serde(default = "default_requests_table")]
    pub requests_table: String,
    #[serde(default = "default_backend_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_events_table() -> String {
    "dispense_history".into()
}
fn default_weights_table() -> String {
    "rice_weights".into()
}
fn default_requests_table() -> String {
    "dispense_requests".into()
}
fn default_backend_timeout_ms() -> u64 {
    3000
}

impl Backend {
    /// API key from the config, falling back to `DISPENSER_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Read the scale inside the node loop
    #[default]
    Direct,
    /// Read the scale on a background thread
    Threaded,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RunnerCfg {
    pub mode: RunMode,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_device_id")]
    pub device_id: String,
    pub pins: Pins,
    #[serde(default)]
    pub sensor: SensorCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub gate: GateCfg,
    #[serde(default)]
    pub schedule: ScheduleCfg,
    #[serde(default)]
    pub safety: Safety,
    #[serde(default)]
    pub events: EventsCfg,
    #[serde(default)]
    pub manual: ManualCfg,
    #[serde(default)]
    pub backend: Option<Backend>,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub runner: RunnerCfg,
}

fn default_device_id() -> String {
    "ESP32_001".into()
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()
        .map_err(|e| eyre::eyre!("invalid configuration in {}: {}", path.display(), e))?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.device_id.trim().is_empty() {
            eyre::bail!("device_id must not be empty");
        }

        // Sensor
        if self.sensor.average_samples == 0 {
            eyre::bail!("sensor.average_samples must be >= 1");
        }
        if self.sensor.average_samples > 64 {
            eyre::bail!("sensor.average_samples is unreasonably large (>64)");
        }
        if self.sensor.read_timeout_ms == 0 {
            eyre::bail!("sensor.read_timeout_ms must be >= 1");
        }

        // Calibration
        if !self.calibration.gain_g_per_count.is_finite()
            || self.calibration.gain_g_per_count == 0.0
        {
            eyre::bail!("calibration.gain_g_per_count must be finite and non-zero");
        }
        if !self.calibration.offset_g.is_finite() {
            eyre::bail!("calibration.offset_g must be finite");
        }

        // Gate
        if self.gate.open_angle_deg > 180 || self.gate.closed_angle_deg > 180 {
            eyre::bail!("gate angles must be in [0, 180]");
        }
        if self.gate.open_angle_deg == self.gate.closed_angle_deg {
            eyre::bail!("gate.open_angle_deg must differ from gate.closed_angle_deg");
        }

        // Schedule
        if self.schedule.sample_ms == 0 {
            eyre::bail!("schedule.sample_ms must be >= 1");
        }
        if self.schedule.tick_ms == 0 {
            eyre::bail!("schedule.tick_ms must be >= 1");
        }
        if self.schedule.flush_ms == 0 {
            eyre::bail!("schedule.flush_ms must be >= 1");
        }
        if self.schedule.loop_ms > self.schedule.tick_ms {
            eyre::bail!("schedule.loop_ms must not exceed schedule.tick_ms");
        }

        // Safety
        if !(self.safety.max_target_g.is_finite() && self.safety.max_target_g > 0.0) {
            eyre::bail!("safety.max_target_g must be > 0");
        }
        if self.safety.max_dispense_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("safety.max_dispense_ms is unreasonably large (>24h)");
        }

        // Events
        if self.events.max_pending == 0 {
            eyre::bail!("events.max_pending must be >= 1");
        }

        // Manual trigger
        if !(self.manual.button_grams > 0.0 && self.manual.button_grams <= self.safety.max_target_g)
        {
            eyre::bail!("manual.button_grams must be in (0, safety.max_target_g]");
        }
        if self.manual.debounce_n == 0 {
            eyre::bail!("manual.debounce_n must be >= 1");
        }

        // Backend
        if let Some(b) = &self.backend {
            if !(b.url.starts_with("http://") || b.url.starts_with("https://")) {
                eyre::bail!("backend.url must start with http:// or https://");
            }
            if b.timeout_ms == 0 {
                eyre::bail!("backend.timeout_ms must be >= 1");
            }
            for (name, table) in [
                ("backend.events_table", &b.events_table),
                ("backend.weights_table", &b.weights_table),
                ("backend.requests_table", &b.requests_table),
            ] {
                if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    eyre::bail!("{name} must be a non-empty identifier");
                }
            }
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
