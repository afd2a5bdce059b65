//! Configuration loading and bootstrap wiring for the rouge retrieval engine.

pub mod bootstrap;
pub mod config;

pub use bootstrap::AppBuilder;
pub use config::Config;
