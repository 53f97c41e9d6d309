// Microgrid telemetry simulator - layered the same way as the service binary
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
