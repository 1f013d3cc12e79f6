use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use web_utils::{format_time_of_day, parse_hashrate};

/// 14 samples at the default 10 minute refresh cover a little over two hours.
pub const DEFAULT_SERIES_CAPACITY: usize = 14;

/// One chart point: a time-of-day label and the hashrate as ckpool published it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub label: String,
    pub hashrate: String,
}

impl Sample {
    pub fn new(label: impl Into<String>, hashrate: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            hashrate: hashrate.into(),
        }
    }

    /// Sample labelled with the UTC time of day of `unix_secs`.
    pub fn at(unix_secs: u64, hashrate: impl Into<String>) -> Self {
        Self::new(format_time_of_day(unix_secs), hashrate)
    }

    /// Numeric hashrate for plotting; unparseable strings plot as zero.
    pub fn value(&self) -> f64 {
        parse_hashrate(&self.hashrate)
    }
}

/// Ordered samples, oldest first, never more than `capacity` of them.
#[derive(Debug, Clone)]
pub struct RollingSeries {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl RollingSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    pub fn seeded(capacity: usize, seed: Sample) -> Self {
        let mut series = Self::new(capacity);
        series.append(seed);
        series
    }

    /// Push `sample` to the end, then evict from the front down to capacity.
    pub fn append(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }
}
