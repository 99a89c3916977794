use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{
    buckets::BucketPolicy,
    entry::MetricEntry,
    error::{Error, Result},
    value::{Metric, MetricKind, Observation},
};

/// Concurrent store of metric accumulators, keyed by metric name then by
/// label set.
///
/// Entries and states are created on first use and live as long as the
/// store. Updates to series that already exist only take shared locks
/// until they reach the state being updated.
#[derive(Debug, Default)]
pub struct MetricStore {
    entries: RwLock<FxHashMap<String, Arc<MetricEntry>>>,
    policy: BucketPolicy,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket_policy(policy: BucketPolicy) -> Self {
        Self {
            entries: Default::default(),
            policy,
        }
    }

    pub fn bucket_policy(&self) -> BucketPolicy {
        self.policy
    }

    /// Records one observation.
    ///
    /// A non-empty `help` replaces the help text of the metric. If the metric already exists with another kind, the entry is replaced
    /// and every series previously recorded under that name is dropped.
    /// Summaries are rejected.
    pub fn update(&self, obs: &Observation<'_>) -> Result<()> {
        if obs.kind == MetricKind::Summary {
            tracing::debug!(name = obs.name, "rejected summary observation");
            return Err(Error::UnsupportedKind(obs.kind));
        }
        let entry = self.lookup(obs.kind, obs.name, obs.help);
        let state = entry.lookup(obs.labels);
        state.update(obs.kind, obs.value, obs.timestamp, obs.buckets, self.policy);
        Ok(())
    }

    fn lookup(&self, kind: MetricKind, name: &str, help: &str) -> Arc<MetricEntry> {
        let found = self
            .entries
            .read()
            .get(name)
            .filter(|entry| entry.kind() == kind)
            .cloned();
        if let Some(entry) = found {
            entry.describe(help);
            return entry;
        }

        let mut entries = self.entries.write();
        // Another writer may have created or migrated it in the meantime.
        let previous = entries.get(name).map(|entry| (entry.kind(), Arc::clone(entry)));
        match previous {
            Some((previous, entry)) if previous == kind => {
                drop(entries);
                entry.describe(help);
                return entry;
            }
            Some((previous, _)) => tracing::debug!(
                name,
                from = %previous,
                to = %kind,
                "metric kind changed, dropping previous series"
            ),
            None => tracing::trace!(name, %kind, "new metric entry"),
        }
        let entry = Arc::new(MetricEntry::new(kind, name, help));
        entries.insert(name.to_owned(), Arc::clone(&entry));
        entry
    }

    /// Returns a sample for every series of every metric, in no particular
    /// order. See [`sort_metrics`](crate::sort_metrics).
    pub fn collect(&self) -> Vec<Metric> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    /// Appends a sample for every series of every metric to `out`.
    ///
    /// Each series is read consistently, but updates to other series may
    /// land while the collection is in progress.
    pub fn collect_into(&self, out: &mut Vec<Metric>) {
        let entries = self.entries.read().values().cloned().collect::<Vec<_>>();
        for entry in entries {
            entry.collect_into(out);
        }
    }

    /// Number of metric names.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of series across all metric names.
    pub fn series(&self) -> usize {
        let entries = self.entries.read().values().cloned().collect::<Vec<_>>();
        entries.iter().map(|entry| entry.len()).sum()
    }
}
