//! The weather client: upstream calls, response cache, temporal routing
//! and row formatting.

use std::{cell::Cell, fmt, time::Duration};

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use serde_json::{Map, Value};

use crate::{
    bridge::{CallOutcome, Placeholder, bridge},
    cache::{Cache, CacheKey, open_cache},
    cast::{ColumnType, cast, is_falsy},
    config::Config,
    error::OwmError,
    flatten::flatten,
    model::{Category, Granularity, Location, OutputMode, QueryParams, Row},
    provider::{Endpoint, HttpTransport, Transport},
    schema::{SchemaDescriptor, resolve_columns, schema_descriptor},
    stream::{CombinedStream, ForecastStream, HistoricalStream},
    time::{DATE_PATTERN, TimeUnit, floor, format, from_epoch_seconds, to_epoch_seconds},
};

/// Targets closer than this many hours to "now" are answered from the
/// hourly forecast.
pub const HOURLY_FORECAST_HORIZON_HOURS: i64 = 47;

pub const DEFAULT_HISTORY_DAYS: u32 = 5;

/// Source of "now"; swapped out in tests.
pub type Clock = fn() -> DateTime<Utc>;

pub struct WeatherClient {
    api_key: String,
    transport: Box<dyn Transport>,
    cache: Box<dyn Cache>,
    api_calls: Cell<u64>,
    clock: Clock,
}

impl fmt::Debug for WeatherClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherClient")
            .field("api_key", &"<redacted>")
            .field("transport", &self.transport)
            .field("api_calls", &self.api_calls.get())
            .finish()
    }
}

impl WeatherClient {
    pub fn new(
        api_key: impl Into<String>,
        transport: Box<dyn Transport>,
        cache: Box<dyn Cache>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            transport,
            cache,
            api_calls: Cell::new(0),
            clock: Utc::now,
        }
    }

    /// Build a client with the HTTP transport and the cache described by
    /// `config`. `use_cache = false` forces the no-op cache.
    pub fn from_config(config: &Config, use_cache: bool) -> anyhow::Result<Self> {
        let api_key = config.require_api_key()?;
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))
            .context("Failed to build HTTP client")?;
        let cache = if use_cache {
            open_cache(&config.cache).context("Failed to open response cache")?
        } else {
            open_cache(&crate::cache::CacheConfig::disabled())?
        };
        Ok(Self::new(api_key, Box::new(transport), cache))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Upstream requests issued so far; cache hits are not counted.
    pub fn api_calls(&self) -> u64 {
        self.api_calls.get()
    }

    fn one_call(
        &self,
        location: Location,
        date: Option<&DateTime<Utc>>,
        params: &QueryParams,
    ) -> Result<Value, OwmError> {
        let mut query = vec![
            ("lat".to_string(), location.lat.to_string()),
            ("lon".to_string(), location.lon.to_string()),
        ];
        let endpoint = match date {
            Some(date) => {
                query.push(("dt".to_string(), to_epoch_seconds(date).to_string()));
                Endpoint::TimeMachine
            }
            None => Endpoint::OneCall,
        };
        query.extend(params.to_query());
        query.push(("appid".to_string(), self.api_key.clone()));

        self.api_calls.set(self.api_calls.get() + 1);
        self.transport.get(endpoint, &query)
    }

    /// Raw time-machine response for the day `date` falls on, from the
    /// cache when present.
    fn historical_weather(
        &self,
        location: Location,
        date: &DateTime<Utc>,
        params: &QueryParams,
    ) -> Result<Value, OwmError> {
        let key = CacheKey::new(location, date, Category::Historical, params);
        if self.cache.contains(&key) {
            debug!("Cache hit for {}", key.as_str());
            return Ok(self.cache.get(&key)?);
        }
        debug!("Cache miss for {}", key.as_str());

        // One request per cached day, anchored at noon so the entry does not
        // depend on the time of day of whichever query filled it.
        let noon = floor(date, TimeUnit::Day) + TimeDelta::hours(12);
        let anchor = noon.min(self.now());
        let data = self.one_call(location, Some(&anchor), params)?;
        self.cache.set(&key, &data)?;
        Ok(data)
    }

    pub(crate) fn historical_series(
        &self,
        location: Location,
        date: &DateTime<Utc>,
        granularity: Granularity,
        params: &QueryParams,
    ) -> Result<CallOutcome<Vec<Value>>, OwmError> {
        bridge(|| {
            let data = self.historical_weather(location, date, params)?;
            Ok(match granularity {
                Granularity::Daily => {
                    let current = data.get("current").cloned();
                    vec![current.unwrap_or_else(Value::placeholder)]
                }
                Granularity::Hourly => series(&data, Granularity::Hourly),
            })
        })
    }

    pub(crate) fn forecast_series(
        &self,
        location: Location,
        granularity: Granularity,
        params: &QueryParams,
    ) -> Result<CallOutcome<Vec<Value>>, OwmError> {
        bridge(|| Ok(series(&self.one_call(location, None, params)?, granularity)))
    }

    /// Flatten one data point, add the synthesized columns and cast every
    /// key to its declared type (`string` when undeclared).
    pub(crate) fn format_output(
        &self,
        item: &Value,
        location: Location,
        category: Category,
        granularity: Granularity,
        error_text: &str,
    ) -> Result<Row, OwmError> {
        let columns = resolve_columns(category, granularity);

        let mut record = match item {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        record.insert("output_geopoint".into(), location.geopoint().into());
        record.insert("data_type".into(), category.label().into());
        record.insert("granularity".into(), granularity.as_str().into());
        record.insert("error".into(), error_text.into());

        let mut row = Row::new();
        for (key, value) in flatten(&Value::Object(record)) {
            let ty = columns
                .get(key.as_str())
                .copied()
                .unwrap_or(ColumnType::String);
            let cast_value = cast(&value, ty)?;
            row.insert(key, cast_value);
        }
        Ok(row)
    }

    /// Weather at `date` for `location`: the time-machine daily point for
    /// past dates, the matching forecast bucket otherwise. Provider errors
    /// are written to the row's `error` column.
    pub fn lookup_single(
        &self,
        location: Location,
        date: &DateTime<Utc>,
        params: &QueryParams,
    ) -> Result<Row, OwmError> {
        let now = self.now();
        if *date < now {
            self.lookup_historical(location, date, params)
        } else {
            self.lookup_forecast(location, date, now, params)
        }
    }

    fn lookup_historical(
        &self,
        location: Location,
        date: &DateTime<Utc>,
        params: &QueryParams,
    ) -> Result<Row, OwmError> {
        let outcome = self.historical_series(location, date, Granularity::Daily, params)?;
        self.format_output(
            &first_or_placeholder(outcome.payload),
            location,
            Category::Historical,
            Granularity::Daily,
            &outcome.error.text,
        )
    }

    fn lookup_forecast(
        &self,
        location: Location,
        date: &DateTime<Utc>,
        now: DateTime<Utc>,
        params: &QueryParams,
    ) -> Result<Row, OwmError> {
        let granularity = if *date < now + TimeDelta::hours(HOURLY_FORECAST_HORIZON_HOURS) {
            Granularity::Hourly
        } else {
            Granularity::Daily
        };

        let forecast = self.forecast_series(location, granularity, params)?;
        let matched =
            bridge(|| find_in_window(&forecast.payload, date, granularity, Category::Forecast))?;

        let error_text = if forecast.error.is_error() {
            &forecast.error.text
        } else {
            &matched.error.text
        };
        let item = first_or_placeholder(matched.payload);
        self.format_output(&item, location, Category::Forecast, granularity, error_text)
    }

    /// One row per forecast bucket, in provider order. The request is
    /// issued on the first call to `next`.
    pub fn stream_forecast<'a>(
        &'a self,
        location: Location,
        granularity: Granularity,
        output: OutputMode,
        params: &'a QueryParams,
    ) -> ForecastStream<'a> {
        ForecastStream::new(self, location, granularity, output, params)
    }

    /// Rows for the `limit_days` days before today, most recent day first.
    /// Ends early at the first day the provider answers with a 400.
    pub fn stream_historical<'a>(
        &'a self,
        location: Location,
        granularity: Granularity,
        limit_days: u32,
        output: OutputMode,
        params: &'a QueryParams,
    ) -> HistoricalStream<'a> {
        let today_noon = floor(&self.now(), TimeUnit::Day) + TimeDelta::hours(12);
        HistoricalStream::new(
            self,
            location,
            granularity,
            today_noon,
            limit_days,
            output,
            params,
        )
    }

    /// Historical rows followed by forecast rows, as `category` selects.
    pub fn stream_combined<'a>(
        &'a self,
        location: Location,
        granularity: Granularity,
        category: Category,
        limit_days: u32,
        output: OutputMode,
        params: &'a QueryParams,
    ) -> CombinedStream<'a> {
        let historical = category
            .includes_historical()
            .then(|| self.stream_historical(location, granularity, limit_days, output, params));
        let forecast = category
            .includes_forecast()
            .then(|| self.stream_forecast(location, granularity, output, params));
        CombinedStream::new(historical, forecast)
    }

    pub fn schema_for(&self, category: Category, granularity: Granularity) -> SchemaDescriptor {
        schema_descriptor(category, granularity)
    }
}

/// The `daily`/`hourly` array of a One Call response, empty when absent.
fn series(data: &Value, granularity: Granularity) -> Vec<Value> {
    data.get(granularity.as_str())
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn first_or_placeholder(items: Vec<Value>) -> Value {
    items.into_iter().next().unwrap_or_else(Value::placeholder)
}

/// First item whose `dt`, floored to `granularity`, equals the floored
/// target. Scanning stops at the first empty item.
pub fn find_in_window(
    items: &[Value],
    target: &DateTime<Utc>,
    granularity: Granularity,
    category: Category,
) -> Result<Vec<Value>, OwmError> {
    let unit = granularity.time_unit();
    let wanted = floor(target, unit);

    for item in items {
        if is_falsy(item) {
            break;
        }
        let Some(ts) = item.get("dt").and_then(Value::as_i64) else {
            continue;
        };
        if floor(&from_epoch_seconds(ts)?, unit) == wanted {
            return Ok(vec![item.clone()]);
        }
    }

    Err(OwmError::NotFoundInWindow {
        category: category.label().to_string(),
        date: format(target, DATE_PATTERN),
    })
}
