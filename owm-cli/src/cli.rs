use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{Password, Select, Text};
use log::info;
use serde_json::{Map, Value};

use owm_core::{
    BatchConfig, Category, Config, DEFAULT_HISTORY_DAYS, DateMode, Granularity, Location,
    OutputMode, QueryParams, Row, Units, WeatherClient, batch::parse_date, enrich_rows,
    schema::schema_descriptor_with_descriptions, schema_descriptor,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "owm", version, about = "OpenWeatherMap data exporter")]
pub struct Cli {
    /// Unit system: standard, metric, imperial, or "default" for the configured one.
    #[arg(long, global = true, default_value = "default")]
    pub units: String,

    /// Response language, or "default" for the configured one.
    #[arg(long, global = true, default_value = "default")]
    pub lang: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key and default units/language.
    Configure,

    /// Show the weather at one location and date.
    Lookup {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Date/time (RFC 3339, "YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DD"); if absent, means "now".
        #[arg(long)]
        date: Option<String>,

        /// Bypass the response cache.
        #[arg(long)]
        no_cache: bool,
    },

    /// Print rows for the recent past and/or the forecast window, one JSON object per line.
    Stream {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// historical, forecast or all.
        #[arg(long, default_value = "all")]
        category: Category,

        /// daily or hourly.
        #[arg(long, default_value = "daily")]
        granularity: Granularity,

        /// Number of past days to fetch.
        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
        limit_days: u32,

        /// Wrap each row under a single column instead of the fixed schema.
        #[arg(long)]
        raw: bool,

        #[arg(long)]
        no_cache: bool,
    },

    /// Print the output schema for a category and granularity.
    Schema {
        #[arg(long, default_value = "all")]
        category: Category,

        #[arg(long, default_value = "daily")]
        granularity: Granularity,

        /// Include column descriptions for the selected units and language.
        #[arg(long)]
        describe: bool,
    },

    /// Add weather columns to every row of a JSON-lines table.
    Enrich {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        #[arg(long)]
        lat_column: String,

        #[arg(long)]
        lon_column: String,

        /// Column holding each row's date; when absent every row uses "now".
        #[arg(long)]
        date_column: Option<String>,

        #[arg(long)]
        raw: bool,

        #[arg(long)]
        no_cache: bool,
    },
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;
        let params = config.resolve_params(Some(&self.units), Some(&self.lang))?;

        match self.command {
            Command::Configure => configure(config),
            Command::Lookup {
                lat,
                lon,
                date,
                no_cache,
            } => {
                let client = WeatherClient::from_config(&config, !no_cache)?;
                let date = match date {
                    Some(text) => {
                        parse_date(&text).ok_or_else(|| anyhow!("Cannot parse date '{text}'"))?
                    }
                    None => Utc::now(),
                };
                let row = client.lookup_single(Location::new(lat, lon), &date, &params)?;
                println!("{}", serde_json::to_string_pretty(&row)?);
                info!("API calls #: {}", client.api_calls());
                Ok(())
            }
            Command::Stream {
                lat,
                lon,
                category,
                granularity,
                limit_days,
                raw,
                no_cache,
            } => {
                let client = WeatherClient::from_config(&config, !no_cache)?;
                let rows = client.stream_combined(
                    Location::new(lat, lon),
                    granularity,
                    category,
                    limit_days,
                    OutputMode::from_parse_flag(!raw),
                    &params,
                );
                let stdout = std::io::stdout();
                write_rows(rows, stdout.lock())?;
                info!("API calls #: {}", client.api_calls());
                Ok(())
            }
            Command::Schema {
                category,
                granularity,
                describe,
            } => {
                let schema = if describe {
                    schema_descriptor_with_descriptions(category, granularity, &params)
                } else {
                    schema_descriptor(category, granularity)
                };
                println!("{}", serde_json::to_string_pretty(&schema)?);
                Ok(())
            }
            Command::Enrich {
                input,
                output,
                lat_column,
                lon_column,
                date_column,
                raw,
                no_cache,
            } => {
                let client = WeatherClient::from_config(&config, !no_cache)?;
                let batch = BatchConfig {
                    latitude_column: lat_column,
                    longitude_column: lon_column,
                    date_mode: match date_column {
                        Some(column) => DateMode::Column(column),
                        None => DateMode::Current(Utc::now()),
                    },
                    output: OutputMode::from_parse_flag(!raw),
                };
                enrich(&client, &input, &output, &batch, &params)?;
                info!("API calls #: {}", client.api_calls());
                Ok(())
            }
        }
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let api_key = Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key.trim().to_string());

    config.units = Select::new("Default units:", Units::all().to_vec())
        .prompt()
        .context("Failed to read units")?;

    let lang = Text::new("Default language (leave empty for the provider default):")
        .prompt()
        .context("Failed to read language")?;
    config.lang = Some(lang.trim().to_string()).filter(|l| !l.is_empty());

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

fn write_rows<W: Write>(
    rows: impl Iterator<Item = Result<Row, owm_core::OwmError>>,
    out: W,
) -> anyhow::Result<()> {
    let mut out = BufWriter::new(out);
    for row in rows {
        serde_json::to_writer(&mut out, &row?)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn read_rows(path: &Path) -> anyhow::Result<Vec<Map<String, Value>>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).with_context(|| {
            format!("Line {} of {} is not a JSON object", idx + 1, path.display())
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn enrich(
    client: &WeatherClient,
    input: &Path,
    output: &Path,
    batch: &BatchConfig,
    params: &QueryParams,
) -> anyhow::Result<()> {
    let rows = read_rows(input)?;
    info!("Enriching {} rows from {}", rows.len(), input.display());

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    write_rows(enrich_rows(client, rows, batch, params), file)
}
