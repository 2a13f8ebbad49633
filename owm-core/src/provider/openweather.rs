use std::time::Duration;

use log::{debug, info};
use reqwest::{StatusCode, blocking::Client};
use serde_json::Value;

use crate::error::OwmError;

use super::{Endpoint, Transport};

pub const BASE_URL: &str = "https://api.openweathermap.org/data/2.5/";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, OwmError> {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, OwmError> {
        let http = Client::builder().timeout(timeout).build()?;
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { base_url, http })
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

impl Transport for HttpTransport {
    fn get(&self, endpoint: Endpoint, query: &[(String, String)]) -> Result<Value, OwmError> {
        let url = self.url(endpoint);
        debug!("GET {url}");

        let res = self.http.get(&url).query(query).send()?;

        let status = res.status();
        let body = res.text()?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(OwmError::Authentication { text: body });
        }

        if status != StatusCode::OK {
            info!(
                "OpenWeatherMap {endpoint} request failed with status {status}: {}",
                truncate_body(&body)
            );
            return Err(OwmError::Provider {
                status: status.as_u16(),
                text: body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
