use std::{fs, path::Path, sync::Arc, time::Duration};

use arrow::{json::ArrayWriter, record_batch::RecordBatch};
use color_eyre::eyre::{Result, WrapErr};
use promstore::{Aggregator, AggregatorConfig, Labels};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub mod api;
pub mod http;

/// Reads an [`AggregatorConfig`] from a JSON file, or returns the default
/// configuration when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<AggregatorConfig> {
    let Some(path) = path else {
        return Ok(AggregatorConfig::default());
    };
    let data = fs::read(path).wrap_err_with(|| format!("{}", path.display()))?;
    serde_json::from_slice(&data)
        .wrap_err_with(|| format!("failed to parse config file {}", path.display()))
}

/// Converts query results into one JSON object per row.
pub fn batches_to_json(batches: &[RecordBatch]) -> Result<Vec<serde_json::Value>> {
    let mut writer = ArrayWriter::new(Vec::new());
    writer.write_batches(batches)?;
    writer.finish()?;
    let buf = writer.into_inner();
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(&buf)?)
}

/// Feeds `aggregator` with synthetic HTTP traffic every `period`.
pub fn spawn_demo(aggregator: Arc<Aggregator>, period: Duration) -> tokio::task::JoinHandle<()> {
    aggregator.describe("http_requests_total", "HTTP requests handled");
    aggregator.describe("http_request_duration_seconds", "HTTP request latency");
    aggregator.describe("http_requests_in_flight", "HTTP requests being handled");

    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let in_flight = rng.gen_range(0..32);
            for _ in 0..in_flight {
                let code = if rng.gen_bool(0.95) { "200" } else { "500" };
                let method = if rng.gen_bool(0.8) { "GET" } else { "POST" };
                let labels = Labels::new([("method", method), ("code", code)]);
                let latency = rng.gen_range(0.001..2.0);
                let result = aggregator
                    .add("http_requests_total", &labels, 1.0)
                    .and_then(|_| aggregator.observe("http_request_duration_seconds", &labels, latency));
                if let Err(error) = result {
                    tracing::error!(%error, "demo: failed to record observation");
                }
            }
            if let Err(error) =
                aggregator.set("http_requests_in_flight", &Labels::default(), in_flight as f64)
            {
                tracing::error!(%error, "demo: failed to record observation");
            }
        }
    })
}
