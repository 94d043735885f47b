// Serde schemas for ubersetup's YAML configuration.
pub mod bootstrap_config;
