/*!
 * Environment Profiler
 * Periodic host CPU and memory profile, stamped onto every submitted event
 *
 * The latest profile is published through an RCU cell so submitters read it
 * without locking. A bounded history keeps recent profiles addressable by
 * timestamp; consecutive profiles link to each other by timestamp.
 */

use crate::core::sync::RcuCell;
use crate::core::types::{now_nanos, Nanos};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use sysinfo::System;
use tracing::trace;

/// Host resource usage at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalProfile {
    /// Also the profile id; 0 before the first sample
    pub timestamp: Nanos,
    pub cpu_percent: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub memory_available: u64,
    /// Timestamp of the profile taken before this one
    pub prev: Option<Nanos>,
}

impl EnvironmentalProfile {
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total == 0 {
            return 0.0;
        }
        self.memory_used as f64 / self.memory_total as f64 * 100.0
    }
}

/// Read side of the profiler
pub trait ProfileSource: Send + Sync {
    fn latest(&self) -> Arc<EnvironmentalProfile>;

    fn by_id(&self, timestamp: Nanos) -> Option<Arc<EnvironmentalProfile>>;

    /// Profile taken right after `timestamp`, if still retained
    fn next(&self, timestamp: Nanos) -> Option<Arc<EnvironmentalProfile>>;
}

pub struct EnvironmentProfiler {
    system: Mutex<System>,
    latest: RcuCell<EnvironmentalProfile>,
    history: Mutex<VecDeque<Arc<EnvironmentalProfile>>>,
    retention: usize,
}

impl EnvironmentProfiler {
    pub fn new(retention: usize) -> Self {
        Self {
            system: Mutex::new(System::new()),
            latest: RcuCell::new(EnvironmentalProfile::default()),
            history: Mutex::new(VecDeque::new()),
            retention: retention.max(1),
        }
    }

    /// Take a fresh profile and publish it as the latest
    pub fn sample(&self) -> Arc<EnvironmentalProfile> {
        let (cpu_percent, memory_used, memory_total, memory_available) = {
            let mut sys = self.system.lock();
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            (
                sys.global_cpu_usage(),
                sys.used_memory(),
                sys.total_memory(),
                sys.available_memory(),
            )
        };

        self.publish(EnvironmentalProfile {
            timestamp: now_nanos(),
            cpu_percent,
            memory_used,
            memory_total,
            memory_available,
            prev: None,
        })
    }

    /// Link `profile` behind the current latest and publish it
    pub fn publish(&self, mut profile: EnvironmentalProfile) -> Arc<EnvironmentalProfile> {
        let mut history = self.history.lock();
        if let Some(last) = history.back() {
            // clock steps backward must not break the ordering
            profile.timestamp = profile.timestamp.max(last.timestamp + 1);
            profile.prev = Some(last.timestamp);
        }

        let profile = Arc::new(profile);
        if history.len() == self.retention {
            history.pop_front();
        }
        history.push_back(Arc::clone(&profile));
        self.latest.store((*profile).clone());
        drop(history);

        trace!(
            timestamp = profile.timestamp,
            cpu = profile.cpu_percent,
            memory_used = profile.memory_used,
            "Environment profile published"
        );
        profile
    }

    pub fn retained(&self) -> usize {
        self.history.lock().len()
    }
}

impl ProfileSource for EnvironmentProfiler {
    fn latest(&self) -> Arc<EnvironmentalProfile> {
        self.latest.load()
    }

    fn by_id(&self, timestamp: Nanos) -> Option<Arc<EnvironmentalProfile>> {
        let history = self.history.lock();
        let idx = history.binary_search_by_key(&timestamp, |p| p.timestamp).ok()?;
        history.get(idx).cloned()
    }

    fn next(&self, timestamp: Nanos) -> Option<Arc<EnvironmentalProfile>> {
        let history = self.history.lock();
        let idx = history.partition_point(|p| p.timestamp <= timestamp);
        history.get(idx).filter(|p| p.prev == Some(timestamp)).cloned()
    }
}

impl Default for EnvironmentProfiler {
    fn default() -> Self {
        Self::new(crate::core::limits::ENV_PROFILE_RETENTION)
    }
}
