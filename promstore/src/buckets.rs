//! Histogram bucket tables.

use serde::Deserialize;

use crate::{labels::Labels, value::FIELD_BUCKET};

/// How an observation is credited to the buckets of a histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketPolicy {
    /// Only the first bucket whose upper bound is `>=` the observation is
    /// incremented.
    #[default]
    FirstMatch,
    /// Every bucket whose upper bound is `>=` the observation is
    /// incremented, as standard Prometheus histogram consumers expect.
    Cumulative,
}

#[derive(Debug, Clone)]
pub(crate) struct Bucket {
    pub(crate) limit: f64,
    pub(crate) count: u64,
    pub(crate) labels: Labels,
}

/// One row per configured upper bound, in the order the bounds were given.
#[derive(Debug, Clone, Default)]
pub(crate) struct Buckets(Vec<Bucket>);

impl Buckets {
    pub(crate) fn new(limits: &[f64], labels: &Labels) -> Self {
        Self(
            limits
                .iter()
                .map(|&limit| Bucket {
                    limit,
                    count: 0,
                    labels: labels.with(FIELD_BUCKET, format_bound(limit)),
                })
                .collect(),
        )
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Bucket> {
        self.0.iter()
    }

    pub(crate) fn update(&mut self, value: f64, policy: BucketPolicy) {
        let mut matching = self.0.iter_mut().filter(|bucket| value <= bucket.limit);
        match policy {
            BucketPolicy::FirstMatch => {
                if let Some(bucket) = matching.next() {
                    bucket.count += 1;
                }
            }
            BucketPolicy::Cumulative => matching.for_each(|bucket| bucket.count += 1),
        }
    }
}

/// Formats a bucket bound as the shortest text that parses back to the same
/// `f64`.
///
/// Bounds with a decimal exponent below -4 or from 6 up are written in
/// exponent form with a signed two digit exponent (`1e-05`, `1e+06`).
pub fn format_bound(bound: f64) -> String {
    if bound.is_nan() {
        return "NaN".to_owned();
    } else if bound == f64::INFINITY {
        return "+Inf".to_owned();
    } else if bound == f64::NEG_INFINITY {
        return "-Inf".to_owned();
    }
    let sci = format!("{bound:e}");
    let parts = sci
        .split_once('e')
        .and_then(|(mantissa, exp)| Some((mantissa, exp.parse::<i32>().ok()?)));
    match parts {
        Some((mantissa, exp)) if !(-4..6).contains(&exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
        }
        _ => bound.to_string(),
    }
}
