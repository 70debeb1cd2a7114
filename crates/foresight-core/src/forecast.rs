//! Forecast domain vocabulary: type/domain/status enums, the open
//! model-parameter map, per-type defaults, and the grouping signature
//! used by the parameter optimizer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// What quantity a forecast predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastType {
    Sales,
    Quantity,
    Stock,
    CashFlow,
}

impl ForecastType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastType::Sales => "sales",
            ForecastType::Quantity => "quantity",
            ForecastType::Stock => "stock",
            ForecastType::CashFlow => "cash_flow",
        }
    }

    /// Parse a forecast type, falling back to `Sales` for unrecognized
    /// values. Used where a strict parse would be wrong: the parameter
    /// defaults table treats unknown types as sales.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "quantity" => ForecastType::Quantity,
            "stock" => ForecastType::Stock,
            "cash_flow" => ForecastType::CashFlow,
            _ => ForecastType::Sales,
        }
    }
}

impl fmt::Display for ForecastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business category a forecast belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastDomain {
    Sales,
    Inventory,
    Finance,
    Product,
}

impl ForecastDomain {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastDomain::Sales => "sales",
            ForecastDomain::Inventory => "inventory",
            ForecastDomain::Finance => "finance",
            ForecastDomain::Product => "product",
        }
    }
}

impl fmt::Display for ForecastDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a forecast record.
///
/// `Pending` is the only mutable state: a record either completes when the
/// owner submits the actual outcome, or expires via the periodic sweep.
/// `Completed` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Pending,
    Completed,
    Expired,
}

impl ForecastStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastStatus::Pending => "pending",
            ForecastStatus::Completed => "completed",
            ForecastStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ForecastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How seasonal effects combine with trend in the forecasting model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    Additive,
    Multiplicative,
}

impl SeasonalityMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SeasonalityMode::Additive => "additive",
            SeasonalityMode::Multiplicative => "multiplicative",
        }
    }
}

/// Parameters the external forecaster ran with, as recorded on a forecast.
///
/// The forecaster owns this vocabulary, so the known tuning knobs are all
/// optional and anything else it sends is preserved verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changepoint_prior_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasonality_prior_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasonality_mode: Option<SeasonalityMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly_seasonality: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_seasonality: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_seasonality: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holidays_prior_scale: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ModelParameters {
    /// Returns a copy with every missing known field filled from the
    /// defaults for `forecast_type`. `extra` is carried through untouched.
    #[must_use]
    pub fn with_defaults(&self, forecast_type: ForecastType) -> Self {
        let defaults = default_parameters(forecast_type);
        Self {
            changepoint_prior_scale: self
                .changepoint_prior_scale
                .or(defaults.changepoint_prior_scale),
            seasonality_prior_scale: self
                .seasonality_prior_scale
                .or(defaults.seasonality_prior_scale),
            seasonality_mode: self.seasonality_mode.or(defaults.seasonality_mode),
            yearly_seasonality: self.yearly_seasonality.or(defaults.yearly_seasonality),
            weekly_seasonality: self.weekly_seasonality.or(defaults.weekly_seasonality),
            daily_seasonality: self.daily_seasonality.or(defaults.daily_seasonality),
            holidays_prior_scale: self.holidays_prior_scale.or(defaults.holidays_prior_scale),
            extra: self.extra.clone(),
        }
    }
}

/// Baseline parameters for a forecast type.
///
/// All types share the same priors; only `seasonality_mode` differs —
/// multiplicative for value-like series (sales, stock), additive for
/// count-like series (quantity, cash flow).
#[must_use]
pub fn default_parameters(forecast_type: ForecastType) -> ModelParameters {
    let seasonality_mode = match forecast_type {
        ForecastType::Sales | ForecastType::Stock => SeasonalityMode::Multiplicative,
        ForecastType::Quantity | ForecastType::CashFlow => SeasonalityMode::Additive,
    };
    ModelParameters {
        changepoint_prior_scale: Some(0.05),
        seasonality_prior_scale: Some(10.0),
        seasonality_mode: Some(seasonality_mode),
        yearly_seasonality: Some(true),
        weekly_seasonality: Some(true),
        daily_seasonality: Some(false),
        holidays_prior_scale: Some(10.0),
        extra: BTreeMap::new(),
    }
}

/// Grouping key for historical forecasts with equivalent tuning.
///
/// Derived, never persisted. Floats are keyed by a fixed-precision rendering
/// so the signature can be hashed and compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterSignature {
    changepoint_prior_scale: Option<String>,
    seasonality_mode: Option<SeasonalityMode>,
    yearly_seasonality: Option<bool>,
    weekly_seasonality: Option<bool>,
}

impl ParameterSignature {
    #[must_use]
    pub fn of(params: &ModelParameters) -> Self {
        Self {
            changepoint_prior_scale: params.changepoint_prior_scale.map(|v| format!("{v:.4}")),
            seasonality_mode: params.seasonality_mode,
            yearly_seasonality: params.yearly_seasonality,
            weekly_seasonality: params.weekly_seasonality,
        }
    }
}
