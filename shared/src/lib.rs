pub mod admin;
pub mod metrics_defs;
