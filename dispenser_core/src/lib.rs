#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core dispensing logic (hardware-agnostic).
//!
//! All hardware goes through the `dispenser_traits` seams: `Scale` for raw
//! load-cell counts, `Gate` for the actuator, `EventSink` for durable events
//! and `RequestSource` for incoming dispense requests.
//!
//! ## Architecture
//!
//! - **Sensor** (`sensor`): averaged, calibrated, non-negative mass samples
//! - **Controller** (`controller`): Idle/Dispensing state machine; delivered
//!   mass is the drop in hopper weight since the session started
//! - **Runner** (`runner`): cyclic scheduler with independent timers for
//!   sampling, request polling, ticking, flushing and telemetry
//! - **Sampler** (`sampler`): optional background acquisition thread
//! - **Delivery** (`delivery`): sink worker thread fed by a bounded queue
//!
//! ## Example
//!
//! ```
//! use dispenser_core::mocks::RecordingGate;
//! use dispenser_core::{DispenseController, DispenseState, StartOutcome, TickOutcome};
//!
//! let gate = RecordingGate::new();
//! let mut ctl = DispenseController::builder()
//!     .with_gate(gate.clone())
//!     .build()
//!     .unwrap();
//! ctl.on_weight_sample(200.0);
//! assert_eq!(ctl.start_dispensing(50.0), StartOutcome::Started);
//! ctl.on_weight_sample(150.0);
//! assert_eq!(ctl.on_tick(), TickOutcome::Complete { delivered_g: 50.0 });
//! assert_eq!(ctl.state(), DispenseState::Idle);
//! assert_eq!(gate.commands(), vec![true, false]);
//! ```

pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod delivery;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod runner;
pub mod sampler;
pub mod schedule;
pub mod sensor;
pub mod session;
pub mod sink;
pub mod status;

pub use builder::{DispenseControllerBuilder, Missing};
pub use calibration::Calibration;
pub use config::{EventsCfg, SafetyCfg, ScheduleCfg, SensorCfg};
pub use controller::DispenseController;
pub use delivery::DeliveryStats;
pub use error::{BuildError, DispenseError, RejectReason, Result};
pub use runner::{DispenseOutcome, DispenseSummary, Dispenser, RunnerStats, SamplingMode};
pub use sensor::LoadCellAdapter;
pub use session::DispenseSession;
pub use sink::LogSink;
pub use status::{DispenseState, StartOutcome, TickOutcome};
