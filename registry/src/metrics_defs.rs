use shared::metrics_defs::{MetricDef, MetricType};

pub const CLIENTS_VALIDATED: MetricDef = MetricDef {
    name: "registry.clients.validated",
    metric_type: MetricType::Counter,
    description: "Number of client records run through the validator",
};

pub const DUPLICATE_CLAVES: MetricDef = MetricDef {
    name: "registry.claves.duplicates",
    metric_type: MetricType::Counter,
    description: "Number of records flagged by the duplicate-clave reconciliation pass",
};

pub const BATCH_DURATION: MetricDef = MetricDef {
    name: "registry.batch.duration",
    metric_type: MetricType::Histogram,
    description: "Batch validation duration in seconds, including reconciliation",
};

pub const ALL_METRICS: &[MetricDef] = &[CLIENTS_VALIDATED, DUPLICATE_CLAVES, BATCH_DURATION];
