use datafusion::error::DataFusionError;

use crate::value::MetricKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("metric kind {0} has no update semantics")]
    UnsupportedKind(MetricKind),
    #[error("invalid buckets for {name:?}: {reason}")]
    InvalidBuckets { name: String, reason: String },
    #[error(transparent)]
    Query(#[from] DataFusionError),
}
