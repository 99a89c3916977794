use parking_lot::Mutex;

use crate::{
    buckets::{BucketPolicy, Buckets},
    labels::Labels,
    value::{Metric, MetricKind},
};

/// Accumulator for one (metric name, label set) pair.
#[derive(Debug)]
pub(crate) struct MetricState {
    labels: Labels,
    values: Mutex<StateValues>,
}

#[derive(Debug, Default)]
struct StateValues {
    buckets: Buckets,
    value: f64,
    sum: f64,
    count: u64,
    timestamp: i64,
}

/// Names and help text shared by every state of an entry.
pub(crate) struct Names<'a> {
    pub(crate) name: &'a str,
    pub(crate) help: &'a str,
    pub(crate) bucket: &'a str,
    pub(crate) sum: &'a str,
    pub(crate) count: &'a str,
}

impl MetricState {
    pub(crate) fn new(labels: &Labels) -> Self {
        Self {
            labels: labels.clone(),
            values: Mutex::new(StateValues::default()),
        }
    }

    pub(crate) fn labels(&self) -> &Labels {
        &self.labels
    }

    pub(crate) fn update(
        &self,
        kind: MetricKind,
        value: f64,
        timestamp: i64,
        limits: &[f64],
        policy: BucketPolicy,
    ) {
        let mut state = self.values.lock();
        match kind {
            MetricKind::Counter => state.value += value,
            MetricKind::Gauge | MetricKind::Untyped => state.value = value,
            MetricKind::Histogram => {
                // Bounds are only rebuilt when their number changes.
                if state.buckets.len() != limits.len() {
                    state.buckets = Buckets::new(limits, &self.labels);
                }
                state.buckets.update(value, policy);
                state.sum += value;
                state.count += 1;
            }
            MetricKind::Summary => {}
        }
        state.timestamp = timestamp;
    }

    pub(crate) fn collect_into(&self, out: &mut Vec<Metric>, kind: MetricKind, names: &Names<'_>) {
        let state = self.values.lock();
        let sample = |name: &str, value: f64, labels: &Labels| Metric {
            kind,
            name: name.to_owned(),
            help: names.help.to_owned(),
            value,
            timestamp: state.timestamp,
            labels: labels.clone(),
        };
        match kind {
            MetricKind::Histogram => {
                out.reserve(state.buckets.len() + 2);
                for bucket in state.buckets.iter() {
                    out.push(sample(names.bucket, bucket.count as f64, &bucket.labels));
                }
                out.push(sample(names.sum, state.sum, &self.labels));
                out.push(sample(names.count, state.count as f64, &self.labels));
            }
            _ => out.push(sample(names.name, state.value, &self.labels)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: Names<'static> = Names {
        name: "m",
        help: "help",
        bucket: "m_bucket",
        sum: "m_sum",
        count: "m_count",
    };

    fn collect(state: &MetricState, kind: MetricKind) -> Vec<Metric> {
        let mut out = Vec::new();
        state.collect_into(&mut out, kind, &NAMES);
        out
    }

    #[test]
    fn test_counter_accumulates() {
        let state = MetricState::new(&Labels::default());
        for (i, v) in [1.0, 2.5, 0.5].into_iter().enumerate() {
            state.update(MetricKind::Counter, v, i as i64, &[], BucketPolicy::FirstMatch);
        }
        let out = collect(&state, MetricKind::Counter);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, 4.0);
        assert_eq!(out[0].timestamp, 2);
        assert_eq!(out[0].help, "help");
    }

    #[test]
    fn test_gauge_replaces() {
        let state = MetricState::new(&Labels::default());
        for v in [7.0, -3.0, 42.0] {
            state.update(MetricKind::Gauge, v, 0, &[], BucketPolicy::FirstMatch);
        }
        assert_eq!(collect(&state, MetricKind::Gauge)[0].value, 42.0);
    }

    #[test]
    fn test_state_owns_its_labels() {
        let mut labels = Labels::new([("x", "1")]);
        let state = MetricState::new(&labels);
        labels.push("y", "2");
        assert_eq!(state.labels(), &Labels::new([("x", "1")]));
    }

    #[test]
    fn test_histogram_rebuilds_only_on_count_change() {
        let state = MetricState::new(&Labels::default());
        state.update(MetricKind::Histogram, 1.0, 0, &[1.0, 2.0], BucketPolicy::FirstMatch);
        // Same number of bounds, different values: the table is kept.
        state.update(MetricKind::Histogram, 1.0, 0, &[5.0, 6.0], BucketPolicy::FirstMatch);

        let out = collect(&state, MetricKind::Histogram);
        let les = out
            .iter()
            .filter_map(|m| m.labels.get("le"))
            .collect::<Vec<_>>();
        assert_eq!(les, ["1", "2"]);
        assert_eq!(out[0].value, 2.0);

        // A different number of bounds resets the table but not sum/count.
        state.update(MetricKind::Histogram, 4.0, 0, &[5.0, 6.0, 7.0], BucketPolicy::FirstMatch);
        let out = collect(&state, MetricKind::Histogram);
        let values = out.iter().map(|m| m.value).collect::<Vec<_>>();
        assert_eq!(values, [1.0, 0.0, 0.0, 6.0, 3.0]);
    }

    #[test]
    fn test_histogram_samples() {
        let state = MetricState::new(&Labels::new([("path", "/")]));
        for v in [5.0, 30.0, 75.0, 150.0] {
            state.update(MetricKind::Histogram, v, 9, &[10.0, 50.0, 100.0], BucketPolicy::FirstMatch);
        }
        let out = collect(&state, MetricKind::Histogram);
        let summary = out
            .iter()
            .map(|m| (m.name.as_str(), m.labels.get("le"), m.value))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            [
                ("m_bucket", Some("10"), 1.0),
                ("m_bucket", Some("50"), 1.0),
                ("m_bucket", Some("100"), 1.0),
                ("m_sum", None, 260.0),
                ("m_count", None, 4.0),
            ]
        );
        assert!(out.iter().all(|m| m.kind == MetricKind::Histogram));
        assert!(out.iter().all(|m| m.timestamp == 9));
        assert_eq!(out[3].labels, Labels::new([("path", "/")]));
    }

    #[test]
    fn test_summary_keeps_value() {
        let state = MetricState::new(&Labels::default());
        state.update(MetricKind::Summary, 3.0, 5, &[], BucketPolicy::FirstMatch);
        let out = collect(&state, MetricKind::Summary);
        assert_eq!(out[0].value, 0.0);
        assert_eq!(out[0].timestamp, 5);
    }
}
