/*!
 * Bus Self-Latency
 * Bounded record of how long items waited in the queue and how long they
 * took to render, grouped by the renderer kinds that fired
 */

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// One processed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSample {
    /// Bitmask of `ObservationCounts::{LOGGING, TRACING, METRICS}`
    pub kinds: u8,
    /// Enqueue to dequeue
    pub channel: Duration,
    /// Dequeue to finish
    pub process: Duration,
}

/// Summary of one latency series, in nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub mean: f64,
    pub median: f64,
    pub min: u64,
    pub max: u64,
}

impl LatencySummary {
    fn of(mut values: Vec<u64>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        values.sort_unstable();

        let n = values.len();
        let sum: u128 = values.iter().map(|&v| u128::from(v)).sum();
        let median = if n % 2 == 1 {
            values[n / 2] as f64
        } else {
            (values[n / 2 - 1] as f64 + values[n / 2] as f64) / 2.0
        };

        Self {
            mean: sum as f64 / n as f64,
            median,
            min: values[0],
            max: values[n - 1],
        }
    }
}

/// Per renderer-kind statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfStats {
    pub count: usize,
    pub channel: LatencySummary,
    pub process: LatencySummary,
}

/// Ring of the most recent samples
pub struct PerfRecorder {
    samples: Mutex<VecDeque<PerfSample>>,
    capacity: usize,
}

impl PerfRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Record a sample, evicting the oldest when full
    pub fn record(&self, sample: PerfSample) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Statistics keyed by renderer-kind bitmask
    pub fn calculate(&self) -> BTreeMap<u8, PerfStats> {
        let mut grouped: BTreeMap<u8, (Vec<u64>, Vec<u64>)> = BTreeMap::new();
        for sample in self.samples.lock().iter() {
            let (channel, process) = grouped.entry(sample.kinds).or_default();
            channel.push(nanos(sample.channel));
            process.push(nanos(sample.process));
        }

        grouped
            .into_iter()
            .map(|(kinds, (channel, process))| {
                let stats = PerfStats {
                    count: channel.len(),
                    channel: LatencySummary::of(channel),
                    process: LatencySummary::of(process),
                };
                (kinds, stats)
            })
            .collect()
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }
}

#[inline]
fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
