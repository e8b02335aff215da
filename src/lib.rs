pub mod commands;
pub mod compress;
pub mod config;
pub mod delivery;
pub mod download;
pub mod error;
pub mod gate;
pub mod media;
pub mod relay;
pub mod router;
pub mod telemetry;
pub mod validate;
