//! Batch transform: enrich each row of an input table with the weather at
//! the row's location and date.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
    client::WeatherClient,
    error::OwmError,
    model::{Location, OutputMode, QueryParams, Row},
    time::{from_epoch_seconds, parse},
};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d",
];

#[derive(Debug, Clone, PartialEq)]
pub enum DateMode {
    /// Every row is looked up at the same instant.
    Current(DateTime<Utc>),
    /// Each row carries its own date in this column.
    Column(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub latitude_column: String,
    pub longitude_column: String,
    pub date_mode: DateMode,
    pub output: OutputMode,
}

/// Suffix repeated names with `_1`, `_2`, ... in order of appearance; the
/// first occurrence keeps its name. A suffix that would collide with any
/// other name in `names` is skipped, so every name in the result is unique.
pub fn make_column_names_unique(names: &mut [String]) {
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();

    for name in names.iter_mut() {
        if seen.insert(name.clone()) {
            continue;
        }
        let suffix = next_suffix.entry(name.clone()).or_insert(1);
        let mut candidate = format!("{name}_{suffix}");
        while taken.contains(&candidate) {
            *suffix += 1;
            candidate = format!("{name}_{suffix}");
        }
        *suffix += 1;
        taken.insert(candidate.clone());
        *name = candidate;
    }
}

fn read_coordinate(row: &Map<String, Value>, column: &str) -> Result<f64, OwmError> {
    let value = row
        .get(column)
        .ok_or_else(|| OwmError::InvalidInput(format!("missing column '{column}'")))?;
    let coordinate = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    coordinate.ok_or_else(|| {
        OwmError::InvalidInput(format!("'{value}' in '{column}' is not a coordinate"))
    })
}

fn read_date(row: &Map<String, Value>, column: &str) -> Result<DateTime<Utc>, OwmError> {
    let value = row
        .get(column)
        .ok_or_else(|| OwmError::InvalidInput(format!("missing column '{column}'")))?;
    match value {
        Value::Number(n) => {
            let ts = n.as_i64().ok_or_else(|| {
                OwmError::InvalidInput(format!("'{n}' in '{column}' is not a timestamp"))
            })?;
            from_epoch_seconds(ts)
        }
        Value::String(s) => parse_date(s.trim())
            .ok_or_else(|| OwmError::InvalidInput(format!("'{s}' in '{column}' is not a date"))),
        other => Err(OwmError::InvalidInput(format!("'{other}' in '{column}' is not a date"))),
    }
}

pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    DATE_FORMATS.iter().find_map(|pattern| parse(text, pattern).ok())
}

/// Input columns followed by the weather columns, names made unique.
pub fn enrich_row(
    client: &WeatherClient,
    row: &Map<String, Value>,
    config: &BatchConfig,
    params: &QueryParams,
) -> Result<Row, OwmError> {
    let location = Location::new(
        read_coordinate(row, &config.latitude_column)?,
        read_coordinate(row, &config.longitude_column)?,
    );
    let date = match &config.date_mode {
        DateMode::Current(now) => *now,
        DateMode::Column(column) => read_date(row, column)?,
    };

    let weather = config.output.apply(client.lookup_single(location, &date, params)?);

    let mut names: Vec<String> = row.keys().chain(weather.keys()).cloned().collect();
    make_column_names_unique(&mut names);
    let values = row
        .values()
        .cloned()
        .chain(weather.into_iter().map(|(_, v)| v));

    Ok(names.into_iter().zip(values).collect())
}

/// Lazily enrich every input row. One output row per input row; the first
/// error (authentication, bad input cell) is yielded and should abort the run.
pub fn enrich_rows<'a, I>(
    client: &'a WeatherClient,
    rows: I,
    config: &'a BatchConfig,
    params: &'a QueryParams,
) -> impl Iterator<Item = Result<Row, OwmError>> + 'a
where
    I: IntoIterator<Item = Map<String, Value>>,
    I::IntoIter: 'a,
{
    rows.into_iter()
        .map(move |row| enrich_row(client, &row, config, params))
}
