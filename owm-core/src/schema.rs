//! Static column registry for every (category, granularity) pair.

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    cast::ColumnType::{self, Date, Float, String as Str},
    model::{Category, Granularity, QueryParams},
};

pub type Columns = IndexMap<&'static str, ColumnType>;

/// Present in every row regardless of category or granularity.
const UNIVERSAL: &[(&str, ColumnType)] = &[
    ("dt", Date),
    ("pressure", Float),
    ("humidity", Float),
    ("dew_point", Float),
    ("clouds", Float),
    ("visibility", Float),
    ("wind_speed", Float),
    ("wind_gust", Float),
    ("wind_deg", Float),
    ("output_geopoint", Str),
    ("data_type", Str),
    ("granularity", Str),
    ("error", Str),
];

const FORECAST_ALL: &[(&str, ColumnType)] = &[];

const FORECAST_DAILY: &[(&str, ColumnType)] = &[
    ("sunrise", Date),
    ("sunset", Date),
    ("temp.morn", Float),
    ("temp.day", Float),
    ("temp.eve", Float),
    ("temp.night", Float),
    ("temp.min", Float),
    ("temp.max", Float),
    ("feels_like.morn", Float),
    ("feels_like.day", Float),
    ("feels_like.eve", Float),
    ("feels_like.night", Float),
    ("uvi", Float),
    ("rain", Float),
    ("snow", Float),
];

const FORECAST_HOURLY: &[(&str, ColumnType)] = &[
    ("feels_like", Float),
    ("temp", Float),
    ("rain.1h", Float),
    ("rain.3h", Float),
    ("snow.1h", Float),
    ("snow.3h", Float),
];

const HISTORICAL_ALL: &[(&str, ColumnType)] = &[
    ("feels_like", Float),
    ("temp", Float),
    ("sunrise", Date),
    ("sunset", Date),
];

const HISTORICAL_DAILY: &[(&str, ColumnType)] = &[("uvi", Float), ("rain", Float), ("snow", Float)];

const HISTORICAL_HOURLY: &[(&str, ColumnType)] = &[
    ("rain.1h", Float),
    ("rain.3h", Float),
    ("snow.1h", Float),
    ("snow.3h", Float),
];

fn category_tables(
    category: Category,
    granularity: Granularity,
) -> [&'static [(&'static str, ColumnType)]; 2] {
    match (category, granularity) {
        (Category::Forecast, Granularity::Daily) => [FORECAST_ALL, FORECAST_DAILY],
        (Category::Forecast, Granularity::Hourly) => [FORECAST_ALL, FORECAST_HOURLY],
        (_, Granularity::Daily) => [HISTORICAL_ALL, HISTORICAL_DAILY],
        (_, Granularity::Hourly) => [HISTORICAL_ALL, HISTORICAL_HOURLY],
    }
}

fn merge(columns: &mut Columns, table: &[(&'static str, ColumnType)]) {
    for (name, ty) in table {
        columns.insert(*name, *ty);
    }
}

/// Columns and declared types for a request, from least to most specific.
/// On a name collision the later (more specific) table wins.
pub fn resolve_columns(category: Category, granularity: Granularity) -> Columns {
    let mut columns = Columns::new();
    merge(&mut columns, UNIVERSAL);

    let branches: &[Category] = match category {
        Category::All => &[Category::Historical, Category::Forecast],
        Category::Historical => &[Category::Historical],
        Category::Forecast => &[Category::Forecast],
    };
    for branch in branches {
        for table in category_tables(*branch, granularity) {
            merge(&mut columns, table);
        }
    }
    columns
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    pub columns: Vec<ColumnSpec>,
}

pub fn schema_descriptor(category: Category, granularity: Granularity) -> SchemaDescriptor {
    let columns = resolve_columns(category, granularity)
        .into_iter()
        .map(|(name, kind)| ColumnSpec {
            name: name.to_string(),
            kind,
            description: None,
        })
        .collect();
    SchemaDescriptor { columns }
}

pub fn schema_descriptor_with_descriptions(
    category: Category,
    granularity: Granularity,
    params: &QueryParams,
) -> SchemaDescriptor {
    let mut schema = schema_descriptor(category, granularity);
    for column in &mut schema.columns {
        column.description = describe_column(&column.name, params);
    }
    schema
}

const DESCRIPTIONS: &[(&str, &str)] = &[
    ("dt", "Time of the data point (UTC)"),
    ("sunrise", "Sunrise time (UTC)"),
    ("sunset", "Sunset time (UTC)"),
    ("temp", "Temperature ({temperature})"),
    ("temp.morn", "Morning temperature ({temperature})"),
    ("temp.day", "Day temperature ({temperature})"),
    ("temp.eve", "Evening temperature ({temperature})"),
    ("temp.night", "Night temperature ({temperature})"),
    ("temp.min", "Minimum daily temperature ({temperature})"),
    ("temp.max", "Maximum daily temperature ({temperature})"),
    ("feels_like", "Perceived temperature ({temperature})"),
    ("feels_like.morn", "Perceived morning temperature ({temperature})"),
    ("feels_like.day", "Perceived day temperature ({temperature})"),
    ("feels_like.eve", "Perceived evening temperature ({temperature})"),
    ("feels_like.night", "Perceived night temperature ({temperature})"),
    ("pressure", "Atmospheric pressure on the sea level (hPa)"),
    ("humidity", "Humidity (%)"),
    ("dew_point", "Dew point ({temperature})"),
    ("clouds", "Cloudiness (%)"),
    ("visibility", "Average visibility (m)"),
    ("uvi", "UV index"),
    ("wind_speed", "Wind speed ({speed})"),
    ("wind_gust", "Wind gust ({speed})"),
    ("wind_deg", "Wind direction (meteorological degrees)"),
    ("pop", "Probability of precipitation"),
    ("rain", "Precipitation volume (mm)"),
    ("rain.1h", "Rain volume for the last hour (mm)"),
    ("rain.3h", "Rain volume for the last 3 hours (mm)"),
    ("snow", "Snow volume (mm)"),
    ("snow.1h", "Snow volume for the last hour (mm)"),
    ("snow.3h", "Snow volume for the last 3 hours (mm)"),
    ("weather.id", "Weather condition id"),
    ("weather.main", "Group of weather parameters ({lang})"),
    ("weather.description", "Weather condition within the group ({lang})"),
    ("weather.icon", "Weather icon id"),
    ("output_geopoint", "Queried location as a WKT point"),
    ("data_type", "Historical or Forecast"),
    ("granularity", "Temporal bucket of the data point"),
    ("error", "Upstream error message, empty on success"),
];

/// `weather.0.description` -> `weather.description`.
pub fn base_column_name(name: &str) -> String {
    name.split('.')
        .filter(|segment| segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(".")
}

pub fn describe_column(name: &str, params: &QueryParams) -> Option<String> {
    let base = base_column_name(name);
    let template = DESCRIPTIONS
        .iter()
        .find(|(key, _)| *key == base)
        .map(|(_, t)| *t)?;
    Some(
        template
            .replace("{temperature}", params.units.temperature_label())
            .replace("{speed}", params.units.speed_label())
            .replace("{lang}", params.lang_label()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Units;

    const PAIRS: [(Category, Granularity); 6] = [
        (Category::Historical, Granularity::Daily),
        (Category::Historical, Granularity::Hourly),
        (Category::Forecast, Granularity::Daily),
        (Category::Forecast, Granularity::Hourly),
        (Category::All, Granularity::Daily),
        (Category::All, Granularity::Hourly),
    ];

    #[test]
    fn resolution_is_stable() {
        for (category, granularity) in PAIRS {
            let first = resolve_columns(category, granularity);
            let second = resolve_columns(category, granularity);
            assert_eq!(first, second);
            assert!(first.keys().eq(second.keys()));
        }
    }

    #[test]
    fn universal_columns_come_first() {
        let columns = resolve_columns(Category::Forecast, Granularity::Daily);
        let names: Vec<_> = columns.keys().take(UNIVERSAL.len()).copied().collect();
        let expected: Vec<_> = UNIVERSAL.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, expected);
        assert_eq!(columns["temp.max"], Float);
        assert!(!columns.contains_key("temp"));
    }

    #[test]
    fn all_merges_both_branches() {
        let all = resolve_columns(Category::All, Granularity::Hourly);
        let historical = resolve_columns(Category::Historical, Granularity::Hourly);
        let forecast = resolve_columns(Category::Forecast, Granularity::Hourly);
        for key in historical.keys().chain(forecast.keys()) {
            assert!(all.contains_key(key), "{key} missing");
        }
        assert_eq!(all["sunrise"], Date);
    }

    #[test]
    fn descriptor_projects_columns() {
        let schema = schema_descriptor(Category::Historical, Granularity::Daily);
        let resolved = resolve_columns(Category::Historical, Granularity::Daily);
        assert_eq!(schema.columns.len(), resolved.len());
        assert_eq!(schema.columns[0].name, "dt");
        assert_eq!(schema.columns[0].kind, Date);

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            json["columns"][0],
            serde_json::json!({"name": "dt", "type": "date"})
        );
    }

    #[test]
    fn descriptions_substitute_units() {
        let params = QueryParams::new(Units::Imperial, Some("fr".into()));
        assert_eq!(
            describe_column("temp.day", &params).unwrap(),
            "Day temperature (°F)"
        );
        assert_eq!(
            describe_column("wind_speed", &params).unwrap(),
            "Wind speed (mph)"
        );
        assert_eq!(
            describe_column("weather.0.description", &params).unwrap(),
            "Weather condition within the group (fr)"
        );
        assert_eq!(describe_column("mystery", &params), None);
    }

    #[test]
    fn described_schema_fills_every_known_column() {
        let params = QueryParams::new(Units::Metric, None);
        let schema =
            schema_descriptor_with_descriptions(Category::All, Granularity::Daily, &params);
        assert!(schema.columns.iter().all(|c| c.description.is_some()));
    }
}
