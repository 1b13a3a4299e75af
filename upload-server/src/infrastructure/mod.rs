mod body;
mod config;
pub mod service;
mod service_provider;
mod telemetry;

#[rustfmt::skip]
pub use {
    body::BodyForwarder,
    config::*,
    service_provider::ServiceProvider,
    telemetry::{initialize_telemetry, TelemetryConfig},
};
