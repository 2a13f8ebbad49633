use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OwmError;

/// One formatted output row: flattened, cast, in column order.
pub type Row = Map<String, Value>;

/// Column holding the whole row when output parsing is disabled.
pub const UNPARSED_COLUMN: &str = "weather_data";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// WKT point, longitude first.
    pub fn geopoint(&self) -> String {
        format!("POINT({} {})", self.lon, self.lat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Historical,
    Forecast,
    All,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Historical => "historical",
            Category::Forecast => "forecast",
            Category::All => "all",
        }
    }

    /// Label written to the `data_type` column.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Historical => "Historical",
            Category::Forecast => "Forecast",
            Category::All => "All",
        }
    }

    pub fn includes_historical(&self) -> bool {
        matches!(self, Category::Historical | Category::All)
    }

    pub fn includes_forecast(&self) -> bool {
        matches!(self, Category::Forecast | Category::All)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = OwmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "historical" => Ok(Category::Historical),
            "forecast" => Ok(Category::Forecast),
            "all" => Ok(Category::All),
            _ => Err(OwmError::InvalidInput(format!(
                "Unknown data category '{s}'. Supported categories: historical, forecast, all."
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Daily,
    Hourly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Hourly => "hourly",
        }
    }

    pub fn time_unit(&self) -> crate::time::TimeUnit {
        match self {
            Granularity::Daily => crate::time::TimeUnit::Day,
            Granularity::Hourly => crate::time::TimeUnit::Hour,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = OwmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Granularity::Daily),
            "hourly" => Ok(Granularity::Hourly),
            _ => Err(OwmError::InvalidGranularity(s.to_string())),
        }
    }
}

/// Unit system understood by the provider's `units` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Standard,
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Standard => "standard",
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Standard, Units::Metric, Units::Imperial]
    }

    pub fn temperature_label(&self) -> &'static str {
        match self {
            Units::Standard => "K",
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed_label(&self) -> &'static str {
        match self {
            Units::Standard | Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = OwmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Units::Standard),
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(OwmError::InvalidInput(format!(
                "Unknown unit system '{s}'. Supported units: standard, metric, imperial."
            ))),
        }
    }
}

/// Per-query provider options, resolved once and shared by reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryParams {
    pub units: Units,
    pub lang: Option<String>,
}

impl QueryParams {
    pub fn new(units: Units, lang: Option<String>) -> Self {
        Self { units, lang }
    }

    pub fn lang_label(&self) -> &str {
        self.lang.as_deref().unwrap_or("en")
    }

    /// Query-string pairs, credentials excluded.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![("units".to_string(), self.units.as_str().to_string())];
        if let Some(lang) = &self.lang {
            query.push(("lang".to_string(), lang.clone()));
        }
        query
    }
}

/// Whether rows are emitted in the fixed schema or wrapped whole under
/// [`UNPARSED_COLUMN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Parsed,
    Raw,
}

impl OutputMode {
    pub fn from_parse_flag(parse_output: bool) -> Self {
        if parse_output {
            OutputMode::Parsed
        } else {
            OutputMode::Raw
        }
    }

    pub fn apply(&self, row: Row) -> Row {
        match self {
            OutputMode::Parsed => row,
            OutputMode::Raw => {
                let mut wrapped = Map::new();
                wrapped.insert(UNPARSED_COLUMN.to_string(), Value::Object(row));
                wrapped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn geopoint_is_lon_lat() {
        assert_eq!(Location::new(48.85, 2.35).geopoint(), "POINT(2.35 48.85)");
    }

    #[test]
    fn unknown_granularity_is_rejected() {
        let err = "weekly".parse::<Granularity>().unwrap_err();
        assert!(matches!(err, OwmError::InvalidGranularity(_)));
    }

    #[test]
    fn units_roundtrip() {
        for units in Units::all() {
            assert_eq!(units.as_str().parse::<Units>().unwrap(), *units);
        }
    }

    #[test]
    fn raw_mode_wraps_row() {
        let mut row = Row::new();
        row.insert("temp".into(), json!(280.0));
        let wrapped = OutputMode::Raw.apply(row.clone());
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[UNPARSED_COLUMN], json!({"temp": 280.0}));
        assert_eq!(OutputMode::Parsed.apply(row.clone()), row);
    }

    #[test]
    fn query_skips_missing_lang() {
        let params = QueryParams::new(Units::Metric, None);
        assert_eq!(
            params.to_query(),
            vec![("units".to_string(), "metric".to_string())]
        );
    }
}
