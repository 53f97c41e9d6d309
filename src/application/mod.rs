// Application layer - Generation, alerting, and scheduling use cases
pub mod alert_evaluator;
pub mod alert_injector;
pub mod alert_store;
pub mod dashboard_sink;
pub mod monitoring_service;
pub mod random;
pub mod scheduler;
pub mod signal_generator;
pub mod telemetry_source;
