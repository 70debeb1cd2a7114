//! Shared domain types and configuration for the Foresight backend.
//!
//! Holds the vocabulary the other crates agree on: forecast type/domain/status
//! enums, the loosely-typed model-parameter map with its per-type defaults,
//! sentiment and mismatch enums, and env-driven application config.

mod app_config;
mod config;
pub mod feedback;
pub mod forecast;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use feedback::{domain_keywords, FeedbackDomain, MismatchSeverity, Sentiment};
pub use forecast::{
    default_parameters, ForecastDomain, ForecastStatus, ForecastType, ModelParameters,
    ParameterSignature, SeasonalityMode,
};
