use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::{
    labels::Labels,
    state::{MetricState, Names},
    value::{Metric, MetricKind, SUFFIX_BUCKET, SUFFIX_COUNT, SUFFIX_SUM},
};

/// All the states of one metric name, one per distinct label set.
#[derive(Debug)]
pub(crate) struct MetricEntry {
    kind: MetricKind,
    name: String,
    help: RwLock<String>,
    // Only set for histograms, cached so collection does not reformat them.
    bucket: String,
    sum: String,
    count: String,
    states: RwLock<StateMap>,
}

impl MetricEntry {
    pub(crate) fn new(kind: MetricKind, name: &str, help: &str) -> Self {
        let (bucket, sum, count) = if kind == MetricKind::Histogram {
            (
                format!("{name}{SUFFIX_BUCKET}"),
                format!("{name}{SUFFIX_SUM}"),
                format!("{name}{SUFFIX_COUNT}"),
            )
        } else {
            Default::default()
        };
        Self {
            kind,
            name: name.to_owned(),
            help: RwLock::new(help.to_owned()),
            bucket,
            sum,
            count,
            states: RwLock::new(StateMap::default()),
        }
    }

    pub(crate) fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Replaces the help text unless `help` is empty or unchanged.
    pub(crate) fn describe(&self, help: &str) {
        if help.is_empty() || *self.help.read() == help {
            return;
        }
        let mut current = self.help.write();
        if *current != help {
            tracing::trace!(name = %self.name, help, "metric help changed");
            *current = help.to_owned();
        }
    }

    pub(crate) fn lookup(&self, labels: &Labels) -> Arc<MetricState> {
        self.lookup_hashed(labels.hash_key(), labels)
    }

    /// Resolves the state for `labels` stored under `key`, creating it if
    /// needed. `key` must be the same for equal label sets.
    pub(crate) fn lookup_hashed(&self, key: u64, labels: &Labels) -> Arc<MetricState> {
        if let Some(state) = self.states.read().find(key, labels) {
            return state;
        }

        let mut states = self.states.write();
        // Another writer may have created it between the two locks.
        if let Some(state) = states.find(key, labels) {
            return state;
        }
        tracing::trace!(name = %self.name, ?labels, "new metric state");
        let state = Arc::new(MetricState::new(labels));
        states.put(key, Arc::clone(&state));
        state
    }

    pub(crate) fn len(&self) -> usize {
        self.states.read().len()
    }

    pub(crate) fn collect_into(&self, out: &mut Vec<Metric>) {
        let states = self.states.read().all();
        let help = self.help.read().clone();
        let names = Names {
            name: &self.name,
            help: &help,
            bucket: &self.bucket,
            sum: &self.sum,
            count: &self.count,
        };
        for state in states {
            state.collect_into(out, self.kind, &names);
        }
    }
}

/// Label hash to the states sharing it.
#[derive(Debug, Default)]
pub(crate) struct StateMap(FxHashMap<u64, Vec<Arc<MetricState>>>);

impl StateMap {
    pub(crate) fn find(&self, key: u64, labels: &Labels) -> Option<Arc<MetricState>> {
        self.0
            .get(&key)?
            .iter()
            .find(|state| state.labels() == labels)
            .cloned()
    }

    pub(crate) fn put(&mut self, key: u64, state: Arc<MetricState>) {
        self.0.entry(key).or_default().push(state);
    }

    fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    fn all(&self) -> Vec<Arc<MetricState>> {
        self.0.values().flatten().cloned().collect()
    }
}
