//! Metrics emission backends
//!
//! The binder computes a name, a value and a merged attribute set; a
//! [`MetricsSink`] turns that into a measurement. [`OtelMetricsSink`] records
//! through an OpenTelemetry meter, [`InMemorySink`] keeps every emission for
//! inspection.

mod memory;
mod otel;

pub use memory::{InMemorySink, InstrumentKind, MeasurementValue, RecordedMeasurement};
pub use otel::{to_key_values, OtelMetricsSink, METER_NAME};

use crate::attributes::Attributes;
use opentelemetry::Context;

pub trait MetricsSink: Send + Sync {
    /// Monotonic counter
    fn add_counter(
        &self,
        name: &'static str,
        delta: u64,
        attributes: &Attributes,
        context: Option<&Context>,
    );

    /// Counter that may go down
    fn add_up_down_counter(
        &self,
        name: &'static str,
        delta: i64,
        attributes: &Attributes,
        context: Option<&Context>,
    );

    fn record_histogram(
        &self,
        name: &'static str,
        value: f64,
        unit: &'static str,
        attributes: &Attributes,
        context: Option<&Context>,
    );
}
