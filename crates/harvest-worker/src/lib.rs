// Harvest worker: activity and workflow libraries over the durable engine.

pub mod activities;
pub mod config;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod trace;
pub mod urlutil;
pub mod workflows;
