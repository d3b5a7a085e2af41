// Domain layer - Plain telemetry data types
pub mod chart;
pub mod connection;
pub mod range;
pub mod tag;
pub mod telemetry;
pub mod unit;
