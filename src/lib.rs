pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod exporter;
pub mod hashing;
pub mod importer;
pub mod logging;
pub mod metrics;
pub mod presets;
pub mod qa;
pub mod review;
pub mod server;
pub mod types;
