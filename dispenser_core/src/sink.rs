//! Event sink that writes to the tracing log.

use dispenser_traits::{DispenseEvent, EventSink, WeightReport};

/// Records events and weight reports as structured log lines under the
/// `dispense_events` target. Used when no backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(
        &mut self,
        event: &DispenseEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            target: "dispense_events",
            action = %event.action,
            weight = event.weight,
            timestamp = %event.timestamp,
            device_id = %event.device_id,
            "dispense event"
        );
        Ok(())
    }

    fn report_weight(
        &mut self,
        report: &WeightReport,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            target: "dispense_events",
            weight = report.weight,
            timestamp = %report.timestamp,
            device_id = %report.device_id,
            "weight report"
        );
        Ok(())
    }
}
