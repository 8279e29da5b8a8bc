//! Reference CLI harness: wires a pair of JSON-lines `Source`s and CSV
//! `Sink`s into a [`microregime_rs::Pipeline`] and runs it to completion.
//!
//! This binary is a reference implementation of the external-collaborator
//! pieces (decoding the wire format, persisting output) described for the
//! library; the crate itself is agnostic to both.

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::Parser;
use microregime_rs::{
    Config, MarketEvent, Pipeline, Sink, SinkError, Source, SourceError,
};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Replay a pair of instrument event streams through the feature pipeline.
#[derive(Parser, Debug)]
#[command(name = "microregime")]
struct Cli {
    /// Session date, `YYYYMMDD`.
    date: String,
    /// Base instrument symbol; expects `<symbol>.jsonl` in the working directory.
    base_symbol: String,
    /// Linked futures instrument symbol; expects `<symbol>.jsonl`.
    futures_symbol: String,
    /// Override `SNAPSHOT_INTERVAL_NS`.
    snapshot_interval_ns: Option<u64>,
}

/// Reads one [`MarketEvent`] per line of a JSON-lines file, in file order.
struct JsonlSource {
    lines: std::io::Lines<BufReader<File>>,
}

impl JsonlSource {
    fn open(path: &PathBuf) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Source for JsonlSource {
    fn next(&mut self) -> Result<Option<MarketEvent>, SourceError> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            let line = line.map_err(|e| SourceError::Io { message: e.to_string() })?;
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line)
                .map(Some)
                .map_err(|e| SourceError::Decode { message: e.to_string() });
        }
    }
}

const CSV_HEADER: &str = "timestamp_ns,instrument,midprice,log_spread,log_return,ewm_volatility,realized_variance,directional_volatility,spread_volatility,ofi,signed_volume_pressure,order_arrival_rate,depth_imbalance,market_depth,lob_slope,price_gap,tick_direction_entropy,reversal_rate,aggressor_bias,shannon_entropy,liquidity_stress\n";

/// Writes raw and normalised feature vectors to `<prefix>_raw.csv` and
/// `<prefix>_norm.csv`, one row per snapshot boundary.
struct CsvSink {
    raw: BufWriter<File>,
    norm: BufWriter<File>,
}

impl CsvSink {
    fn create(prefix: &str) -> Result<Self> {
        let mut raw = BufWriter::new(File::create(format!("{prefix}_raw.csv"))?);
        let mut norm = BufWriter::new(File::create(format!("{prefix}_norm.csv"))?);
        raw.write_all(CSV_HEADER.as_bytes())?;
        norm.write_all(CSV_HEADER.as_bytes())?;
        Ok(Self { raw, norm })
    }
}

fn write_row(w: &mut BufWriter<File>, timestamp_ns: u64, fs: &microregime_rs::FeatureSet) -> std::io::Result<()> {
    write!(w, "{timestamp_ns},{}", fs.instrument)?;
    for value in fs.numeric_fields() {
        write!(w, ",{value:.14e}")?;
    }
    writeln!(w)
}

impl Sink for CsvSink {
    fn ingest_feature_set(
        &mut self,
        _instrument: &str,
        timestamp_ns: u64,
        raw: &microregime_rs::FeatureSet,
        normalised: &microregime_rs::FeatureSet,
    ) -> Result<(), SinkError> {
        write_row(&mut self.raw, timestamp_ns, raw).map_err(|e| SinkError::Io { message: e.to_string() })?;
        write_row(&mut self.norm, timestamp_ns, normalised).map_err(|e| SinkError::Io { message: e.to_string() })
    }
}

fn session_bounds(date: &str) -> Result<(u64, u64)> {
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").with_context(|| format!("parsing date {date}"))?;
    let (sh, sm, ss) = microregime_rs::config::DEFAULT_SESSION_START_HMS;
    let (eh, em, es) = microregime_rs::config::DEFAULT_SESSION_END_HMS;
    let start = Utc.from_utc_datetime(&date.and_hms_opt(sh, sm, ss).expect("valid session start time"));
    let end = Utc.from_utc_datetime(&date.and_hms_opt(eh, em, es).expect("valid session end time"));
    Ok((
        start.timestamp_nanos_opt().expect("session start fits in i64 ns") as u64,
        end.timestamp_nanos_opt().expect("session end fits in i64 ns") as u64,
    ))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(interval) = cli.snapshot_interval_ns {
        config.snapshot_interval_ns = interval;
    }

    let (session_start_ns, session_end_ns) = session_bounds(&cli.date)?;

    let base_path = PathBuf::from(format!("{}.jsonl", cli.base_symbol));
    let futures_path = PathBuf::from(format!("{}.jsonl", cli.futures_symbol));

    let base_source = JsonlSource::open(&base_path)?;
    let futures_source = JsonlSource::open(&futures_path)?;
    let base_sink = CsvSink::create(&cli.base_symbol)?;
    let futures_sink = CsvSink::create(&cli.futures_symbol)?;

    let mut pipeline = Pipeline::new(
        config,
        session_start_ns,
        session_end_ns,
        cli.base_symbol.clone(),
        cli.futures_symbol.clone(),
        Box::new(base_source),
        Box::new(futures_source),
        Box::new(base_sink),
        Box::new(futures_sink),
    );

    let emitted = pipeline.run()?;
    info!(emitted, "run complete");
    Ok(())
}
