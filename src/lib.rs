// Template engine
pub mod batch;
pub mod template;

// Supporting modules
pub mod config;
pub mod error;
pub mod telemetry;
