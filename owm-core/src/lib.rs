//! Core library for the `owm` OpenWeatherMap exporter.
//!
//! This crate defines:
//! - The weather client: temporal routing between the time-machine and
//!   forecast endpoints, and lazy row streams over a location
//! - Normalization of nested provider JSON into flat, typed rows
//! - The static column registry and schema descriptors
//! - Configuration, the response cache and the HTTP transport
//!
//! It is used by `owm-cli`, but can also be reused by other binaries or services.

pub mod batch;
pub mod bridge;
pub mod cache;
pub mod cast;
pub mod client;
pub mod config;
pub mod error;
pub mod flatten;
pub mod model;
pub mod provider;
pub mod schema;
pub mod stream;
pub mod time;

pub use batch::{BatchConfig, DateMode, enrich_rows, make_column_names_unique};
pub use bridge::{CallOutcome, bridge};
pub use cache::{Cache, CacheConfig, CacheKey, FileCache, MemoryCache, NullCache};
pub use cast::{ColumnType, cast};
pub use client::{DEFAULT_HISTORY_DAYS, WeatherClient};
pub use config::Config;
pub use error::{CacheError, ErrorDescriptor, OwmError};
pub use flatten::flatten;
pub use model::{Category, Granularity, Location, OutputMode, QueryParams, Row, Units};
pub use provider::{Endpoint, HttpTransport, Transport};
pub use schema::{SchemaDescriptor, resolve_columns, schema_descriptor};
