use super::MetricsSink;
use crate::attributes::{AttributeValue, Attributes};
use dashmap::DashMap;
use opentelemetry::metrics::{Counter, Histogram, Meter, Unit, UpDownCounter};
use opentelemetry::{global, Context, KeyValue};

/// Instrumentation scope name of the meter
pub const METER_NAME: &str = "io.opentelemetry.metrics.db";

/// Records through an OpenTelemetry meter
///
/// Instruments are created on first use and cached by name.
pub struct OtelMetricsSink {
    meter: Meter,
    counters: DashMap<&'static str, Counter<u64>>,
    up_down_counters: DashMap<&'static str, UpDownCounter<i64>>,
    histograms: DashMap<&'static str, Histogram<f64>>,
}

impl OtelMetricsSink {
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            counters: DashMap::new(),
            up_down_counters: DashMap::new(),
            histograms: DashMap::new(),
        }
    }

    /// Sink on the globally installed meter provider
    pub fn global() -> Self {
        Self::new(global::meter(METER_NAME))
    }
}

impl MetricsSink for OtelMetricsSink {
    fn add_counter(
        &self,
        name: &'static str,
        delta: u64,
        attributes: &Attributes,
        context: Option<&Context>,
    ) {
        let _guard = context.map(|cx| cx.clone().attach());
        let counter = self
            .counters
            .entry(name)
            .or_insert_with(|| self.meter.u64_counter(name).init())
            .clone();
        counter.add(delta, &to_key_values(attributes));
    }

    fn add_up_down_counter(
        &self,
        name: &'static str,
        delta: i64,
        attributes: &Attributes,
        context: Option<&Context>,
    ) {
        let _guard = context.map(|cx| cx.clone().attach());
        let counter = self
            .up_down_counters
            .entry(name)
            .or_insert_with(|| self.meter.i64_up_down_counter(name).init())
            .clone();
        counter.add(delta, &to_key_values(attributes));
    }

    fn record_histogram(
        &self,
        name: &'static str,
        value: f64,
        unit: &'static str,
        attributes: &Attributes,
        context: Option<&Context>,
    ) {
        let _guard = context.map(|cx| cx.clone().attach());
        let histogram = self
            .histograms
            .entry(name)
            .or_insert_with(|| {
                self.meter
                    .f64_histogram(name)
                    .with_unit(Unit::new(unit))
                    .init()
            })
            .clone();
        histogram.record(value, &to_key_values(attributes));
    }
}

/// Convert attributes to OpenTelemetry key-values, dropping tombstones
pub fn to_key_values(attributes: &Attributes) -> Vec<KeyValue> {
    attributes
        .iter()
        .filter_map(|(key, value)| {
            let key = key.clone();
            match value {
                AttributeValue::String(s) => Some(KeyValue::new(key, s.clone())),
                AttributeValue::Int(v) => Some(KeyValue::new(key, *v)),
                AttributeValue::Float(v) => Some(KeyValue::new(key, *v)),
                AttributeValue::Null => None,
            }
        })
        .collect()
}
