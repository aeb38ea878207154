pub mod clock;
pub mod records;

pub use clock::{Clock, MonotonicClock};
pub use records::{DispenseAction, DispenseEvent, DispenseRequest, WeightReport};

/// Raw load-cell source. Returns ADC counts; conversion to grams happens in the core.
pub trait Scale {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Dispenser gate actuator. Commanding the current position again must be harmless.
pub trait Gate {
    fn set_gate(&mut self, open: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Durable destination for dispense events and weight telemetry.
pub trait EventSink {
    fn record(
        &mut self,
        event: &DispenseEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Periodic weight telemetry. Sinks that only keep events can ignore it.
    fn report_weight(
        &mut self,
        _report: &WeightReport,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// Where dispense requests come from: a button, a backend table, a test script.
pub trait RequestSource {
    fn poll(&mut self) -> Result<Option<DispenseRequest>, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn record(
        &mut self,
        event: &DispenseEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).record(event)
    }

    fn report_weight(
        &mut self,
        report: &WeightReport,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).report_weight(report)
    }
}

impl<T: Gate + ?Sized> Gate for Box<T> {
    fn set_gate(&mut self, open: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_gate(open)
    }
}

impl<T: Scale + ?Sized> Scale for Box<T> {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(timeout)
    }
}

impl<T: RequestSource + ?Sized> RequestSource for Box<T> {
    fn poll(&mut self) -> Result<Option<DispenseRequest>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).poll()
    }
}
