// Domain layer - Plain data types shared by every other layer
pub mod alert;
pub mod telemetry;
