//! Lazy row streams. Each stream issues its upstream requests only as the
//! consumer pulls rows, and ends after yielding an error.

use std::vec;

use chrono::{DateTime, TimeDelta, Utc};
use log::warn;
use serde_json::Value;

use crate::{
    bridge::NOT_FOUND_STATUS,
    client::WeatherClient,
    error::OwmError,
    model::{Category, Granularity, Location, OutputMode, QueryParams, Row},
};

/// Items of one upstream response still to be emitted, with its error text.
struct Pending {
    items: vec::IntoIter<Value>,
    error_text: String,
}

fn emit(
    client: &WeatherClient,
    item: &Value,
    location: Location,
    category: Category,
    granularity: Granularity,
    error_text: &str,
    output: OutputMode,
) -> Result<Row, OwmError> {
    client
        .format_output(item, location, category, granularity, error_text)
        .map(|row| output.apply(row))
}

pub struct ForecastStream<'a> {
    client: &'a WeatherClient,
    location: Location,
    granularity: Granularity,
    output: OutputMode,
    params: &'a QueryParams,
    pending: Option<Pending>,
    done: bool,
}

impl<'a> ForecastStream<'a> {
    pub(crate) fn new(
        client: &'a WeatherClient,
        location: Location,
        granularity: Granularity,
        output: OutputMode,
        params: &'a QueryParams,
    ) -> Self {
        Self {
            client,
            location,
            granularity,
            output,
            params,
            pending: None,
            done: false,
        }
    }
}

impl Iterator for ForecastStream<'_> {
    type Item = Result<Row, OwmError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.pending.is_none() {
            match self
                .client
                .forecast_series(self.location, self.granularity, self.params)
            {
                Ok(outcome) => {
                    self.pending = Some(Pending {
                        items: outcome.payload.into_iter(),
                        error_text: outcome.error.text,
                    })
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }

        let pending = self.pending.as_mut()?;
        let Some(item) = pending.items.next() else {
            self.done = true;
            return None;
        };

        let row = emit(
            self.client,
            &item,
            self.location,
            Category::Forecast,
            self.granularity,
            &pending.error_text,
            self.output,
        );
        self.done = row.is_err();
        Some(row)
    }
}

pub struct HistoricalStream<'a> {
    client: &'a WeatherClient,
    location: Location,
    granularity: Granularity,
    anchor: DateTime<Utc>,
    limit_days: u32,
    days_before: u32,
    output: OutputMode,
    params: &'a QueryParams,
    pending: Option<Pending>,
    done: bool,
}

impl<'a> HistoricalStream<'a> {
    pub(crate) fn new(
        client: &'a WeatherClient,
        location: Location,
        granularity: Granularity,
        anchor: DateTime<Utc>,
        limit_days: u32,
        output: OutputMode,
        params: &'a QueryParams,
    ) -> Self {
        Self {
            client,
            location,
            granularity,
            anchor,
            limit_days,
            days_before: 1,
            output,
            params,
            pending: None,
            done: false,
        }
    }
}

impl Iterator for HistoricalStream<'_> {
    type Item = Result<Row, OwmError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(pending) = self.pending.as_mut() {
                if let Some(item) = pending.items.next() {
                    let row = emit(
                        self.client,
                        &item,
                        self.location,
                        Category::Historical,
                        self.granularity,
                        &pending.error_text,
                        self.output,
                    );
                    self.done = row.is_err();
                    return Some(row);
                }
                self.pending = None;
            }

            if self.days_before > self.limit_days {
                self.done = true;
                return None;
            }

            let date = self.anchor - TimeDelta::days(i64::from(self.days_before));
            match self
                .client
                .historical_series(self.location, &date, self.granularity, self.params)
            {
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
                Ok(outcome) if outcome.error.status == NOT_FOUND_STATUS => {
                    warn!(
                        "Stopping historical stream at {} day(s) back: {}",
                        self.days_before, outcome.error.text
                    );
                    self.done = true;
                    return None;
                }
                Ok(outcome) => {
                    self.pending = Some(Pending {
                        items: outcome.payload.into_iter(),
                        error_text: outcome.error.text,
                    });
                    self.days_before += 1;
                }
            }
        }
    }
}

/// Historical rows, then forecast rows. Stops after the first error.
pub struct CombinedStream<'a> {
    historical: Option<HistoricalStream<'a>>,
    forecast: Option<ForecastStream<'a>>,
    failed: bool,
}

impl<'a> CombinedStream<'a> {
    pub(crate) fn new(
        historical: Option<HistoricalStream<'a>>,
        forecast: Option<ForecastStream<'a>>,
    ) -> Self {
        Self {
            historical,
            forecast,
            failed: false,
        }
    }
}

impl Iterator for CombinedStream<'_> {
    type Item = Result<Row, OwmError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let next = match self.historical.as_mut().and_then(Iterator::next) {
            Some(item) => Some(item),
            None => {
                self.historical = None;
                self.forecast.as_mut().and_then(Iterator::next)
            }
        };

        self.failed = matches!(next, Some(Err(_)));
        next
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::{
        cache::MemoryCache,
        model::{UNPARSED_COLUMN, Units},
        provider::{
            Endpoint,
            fake::{Call, FakeTransport, param},
        },
    };

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap()
    }

    fn here() -> Location {
        Location::new(-33.87, 151.21)
    }

    fn client_with(
        responder: impl Fn(Endpoint, &[(String, String)]) -> Result<Value, OwmError> + 'static,
    ) -> (WeatherClient, Rc<RefCell<Vec<Call>>>) {
        let (transport, calls) = FakeTransport::new(responder);
        let client = WeatherClient::new("KEY", Box::new(transport), Box::new(MemoryCache::new()))
            .with_clock(fixed_now);
        (client, calls)
    }

    fn provider(status: u16, text: &str) -> OwmError {
        OwmError::Provider {
            status,
            text: text.to_string(),
        }
    }

    fn dt_of(query: &[(String, String)]) -> i64 {
        param(query, "dt").unwrap().parse().unwrap()
    }

    /// Three hourly points per day, keyed off the requested `dt`.
    fn history(endpoint: Endpoint, query: &[(String, String)]) -> Result<Value, OwmError> {
        match endpoint {
            Endpoint::TimeMachine => {
                let dt = dt_of(query);
                Ok(json!({
                    "current": {"dt": dt, "temp": 1.0},
                    "hourly": [{"dt": dt - 7200}, {"dt": dt - 3600}, {"dt": dt}],
                }))
            }
            Endpoint::OneCall => Ok(json!({
                "hourly": [
                    {"dt": 1_710_064_800, "temp": 12.0},
                    {"dt": 1_710_068_400, "temp": 13.0},
                ],
                "daily": [{"dt": 1_710_072_000, "temp": {"day": 14.0}}],
            })),
        }
    }

    #[test]
    fn historical_stream_walks_back_from_yesterday() {
        let (client, calls) = client_with(history);
        let params = QueryParams::new(Units::Metric, None);

        let rows: Vec<Row> = client
            .stream_historical(here(), Granularity::Hourly, 5, OutputMode::Parsed, &params)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 15);
        assert_eq!(calls.borrow().len(), 5);
        assert_eq!(rows[0]["dt"], json!("2024-03-09T10:00:00Z"));
        assert_eq!(rows[2]["dt"], json!("2024-03-09T12:00:00Z"));
        assert_eq!(rows[14]["dt"], json!("2024-03-05T12:00:00Z"));
        assert!(rows.iter().all(|r| r["data_type"] == json!("Historical")));
    }

    #[test]
    fn historical_stream_stops_at_first_400() {
        let day3 = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap().timestamp();
        let (client, calls) = client_with(move |endpoint, query| {
            if dt_of(query) == day3 {
                return Err(provider(400, "requested time is out of range"));
            }
            history(endpoint, query)
        });
        let params = QueryParams::default();

        let rows: Vec<Row> = client
            .stream_historical(here(), Granularity::Daily, 5, OutputMode::Parsed, &params)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(calls.borrow().len(), 3);
    }

    #[test]
    fn historical_stream_keeps_other_errors_as_rows() {
        let (client, _) = client_with(|_, _| Err(provider(404, "nope")));
        let params = QueryParams::default();

        let rows: Vec<Row> = client
            .stream_historical(here(), Granularity::Daily, 2, OutputMode::Parsed, &params)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["error"] == json!("nope")));
    }

    #[test]
    fn historical_stream_is_lazy() {
        let (client, calls) = client_with(history);
        let params = QueryParams::default();

        let mut stream =
            client.stream_historical(here(), Granularity::Hourly, 5, OutputMode::Parsed, &params);
        assert!(calls.borrow().is_empty());
        stream.next().unwrap().unwrap();
        assert_eq!(calls.borrow().len(), 1);
        drop(stream);
        assert_eq!(client.api_calls(), 1);
    }

    #[test]
    fn forecast_stream_yields_one_row_per_item() {
        let (client, calls) = client_with(history);
        let params = QueryParams::default();

        let rows: Vec<Row> = client
            .stream_forecast(here(), Granularity::Hourly, OutputMode::Parsed, &params)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(rows[1]["temp"], json!(13.0));
        assert_eq!(rows[0]["granularity"], json!("hourly"));
        assert_eq!(rows[0]["output_geopoint"], json!("POINT(151.21 -33.87)"));
    }

    #[test]
    fn raw_output_wraps_rows() {
        let (client, _) = client_with(history);
        let params = QueryParams::default();

        let rows: Vec<Row> = client
            .stream_forecast(here(), Granularity::Daily, OutputMode::Raw, &params)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0][UNPARSED_COLUMN]["temp.day"], json!(14.0));
    }

    #[test]
    fn combined_stream_orders_historical_first() {
        let (client, calls) = client_with(history);
        let params = QueryParams::default();

        let rows: Vec<Row> = client
            .stream_combined(
                here(),
                Granularity::Daily,
                Category::All,
                2,
                OutputMode::Parsed,
                &params,
            )
            .collect::<Result<_, _>>()
            .unwrap();

        let kinds: Vec<_> = rows.iter().map(|r| r["data_type"].clone()).collect();
        assert_eq!(
            kinds,
            [json!("Historical"), json!("Historical"), json!("Forecast")]
        );
        let endpoints: Vec<_> = calls.borrow().iter().map(|(e, _)| *e).collect();
        assert_eq!(
            endpoints,
            [
                Endpoint::TimeMachine,
                Endpoint::TimeMachine,
                Endpoint::OneCall
            ]
        );
    }

    #[test]
    fn combined_stream_respects_category() {
        let (client, calls) = client_with(history);
        let params = QueryParams::default();

        let count = client
            .stream_combined(
                here(),
                Granularity::Daily,
                Category::Forecast,
                5,
                OutputMode::Parsed,
                &params,
            )
            .count();

        assert_eq!(count, 1);
        assert!(calls.borrow().iter().all(|(e, _)| *e == Endpoint::OneCall));
    }

    #[test]
    fn authentication_failure_ends_every_stream() {
        let (client, calls) = client_with(|_, _| {
            Err(OwmError::Authentication {
                text: "401".into(),
            })
        });
        let params = QueryParams::default();

        let results: Vec<_> = client
            .stream_combined(
                here(),
                Granularity::Hourly,
                Category::All,
                5,
                OutputMode::Parsed,
                &params,
            )
            .collect();

        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().unwrap_err().is_authentication());
        assert_eq!(calls.borrow().len(), 1);

        let mut forecast =
            client.stream_forecast(here(), Granularity::Daily, OutputMode::Parsed, &params);
        assert!(forecast.next().unwrap().unwrap_err().is_authentication());
        assert!(forecast.next().is_none());
    }
}
