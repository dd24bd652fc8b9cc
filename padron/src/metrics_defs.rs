use shared::metrics_defs::{MetricDef, MetricType};

pub const UPLOADS: MetricDef = MetricDef {
    name: "server.uploads",
    metric_type: MetricType::Counter,
    description: "Number of roster sheets ingested successfully",
};

pub const EXPORTS: MetricDef = MetricDef {
    name: "server.exports",
    metric_type: MetricType::Counter,
    description: "Number of roster sheets exported",
};

pub const ALL_METRICS: &[MetricDef] = &[UPLOADS, EXPORTS];
