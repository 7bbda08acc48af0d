// Common library for shared code across the monitor binary and tests

pub mod artifact;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod notify;
pub mod output;
pub mod overview;
pub mod runner;
pub mod schedule;
pub mod status;
pub mod storage;
pub mod telemetry;
pub mod trigger;
