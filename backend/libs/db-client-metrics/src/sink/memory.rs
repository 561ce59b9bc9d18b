use super::MetricsSink;
use crate::attributes::Attributes;
use opentelemetry::Context;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Counter,
    UpDownCounter,
    Histogram,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementValue {
    U64(u64),
    I64(i64),
    F64(f64),
}

impl MeasurementValue {
    pub fn as_f64(self) -> f64 {
        match self {
            MeasurementValue::U64(v) => v as f64,
            MeasurementValue::I64(v) => v as f64,
            MeasurementValue::F64(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMeasurement {
    pub name: &'static str,
    pub kind: InstrumentKind,
    pub value: MeasurementValue,
    pub unit: Option<&'static str>,
    pub attributes: Attributes,
    pub with_context: bool,
}

/// Keeps every emission in memory, in order
#[derive(Default)]
pub struct InMemorySink {
    records: Mutex<Vec<RecordedMeasurement>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RecordedMeasurement> {
        self.records.lock().clone()
    }

    /// Emissions for one metric name
    pub fn by_name(&self, name: &str) -> Vec<RecordedMeasurement> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.name == name)
            .cloned()
            .collect()
    }

    /// Sum of all values emitted under `name`
    pub fn sum(&self, name: &str) -> f64 {
        self.by_name(name)
            .iter()
            .map(|record| record.value.as_f64())
            .sum()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    fn push(&self, record: RecordedMeasurement) {
        self.records.lock().push(record);
    }
}

impl MetricsSink for InMemorySink {
    fn add_counter(
        &self,
        name: &'static str,
        delta: u64,
        attributes: &Attributes,
        context: Option<&Context>,
    ) {
        self.push(RecordedMeasurement {
            name,
            kind: InstrumentKind::Counter,
            value: MeasurementValue::U64(delta),
            unit: None,
            attributes: attributes.clone(),
            with_context: context.is_some(),
        });
    }

    fn add_up_down_counter(
        &self,
        name: &'static str,
        delta: i64,
        attributes: &Attributes,
        context: Option<&Context>,
    ) {
        self.push(RecordedMeasurement {
            name,
            kind: InstrumentKind::UpDownCounter,
            value: MeasurementValue::I64(delta),
            unit: None,
            attributes: attributes.clone(),
            with_context: context.is_some(),
        });
    }

    fn record_histogram(
        &self,
        name: &'static str,
        value: f64,
        unit: &'static str,
        attributes: &Attributes,
        context: Option<&Context>,
    ) {
        self.push(RecordedMeasurement {
            name,
            kind: InstrumentKind::Histogram,
            value: MeasurementValue::F64(value),
            unit: Some(unit),
            attributes: attributes.clone(),
            with_context: context.is_some(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let sink = InMemorySink::new();
        let attributes = Attributes::new();

        sink.add_up_down_counter("count", 1, &attributes, None);
        sink.add_up_down_counter("count", -1, &attributes, Some(&Context::current()));
        sink.record_histogram("duration", 2.5, "ms", &attributes, None);

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].value, MeasurementValue::I64(-1));
        assert!(records[1].with_context);
        assert_eq!(records[2].unit, Some("ms"));
        assert_eq!(sink.sum("count"), 0.0);

        sink.clear();
        assert!(sink.records().is_empty());
    }
}
