pub mod aggregator;
pub mod buckets;
mod entry;
mod error;
pub mod export;
mod labels;
mod state;
mod store;
pub mod value;

pub use {
    aggregator::{Aggregator, AggregatorConfig},
    buckets::{format_bound, BucketPolicy},
    error::{Error, Result},
    labels::{Label, Labels, Signature},
    store::MetricStore,
    value::{sort_metrics, Metric, MetricKind, Observation},
};
