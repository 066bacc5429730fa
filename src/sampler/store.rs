//! Concurrent sample map keyed by message id.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// One latency observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub receive_time: DateTime<Utc>,
}

impl Sample {
    pub fn latency(&self) -> TimeDelta {
        self.receive_time - self.start_time
    }

    /// Latency in (possibly fractional, possibly negative) seconds.
    pub fn latency_seconds(&self) -> f64 {
        delta_seconds(self.latency())
    }
}

pub(crate) fn delta_seconds(delta: TimeDelta) -> f64 {
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        // Only reachable for spans over ~292 years.
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Outcome of [`SampleStore::insert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The id was new; `count` is the number of distinct samples after it.
    Inserted { count: usize },
    /// The id was already present and the stored sample was kept.
    Duplicate,
}

/// Samples keyed by message id, plus the distinct-sample count.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    samples: Arc<DashMap<String, Sample>>,
    count: Arc<AtomicUsize>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless a sample with the same id exists.
    ///
    /// The absence check, the insert and the count increment all happen
    /// under the shard lock for that id.
    pub fn insert_if_absent(&self, sample: Sample) -> Insertion {
        match self.samples.entry(sample.id.clone()) {
            Entry::Occupied(_) => Insertion::Duplicate,
            Entry::Vacant(slot) => {
                let _guard = slot.insert(sample);
                let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
                Insertion::Inserted { count }
            }
        }
    }

    /// Number of distinct samples inserted so far.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<Sample> {
        self.samples.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.samples.contains_key(id)
    }

    /// Copy out every sample. Order is unspecified.
    pub fn samples(&self) -> Vec<Sample> {
        self.samples
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
