use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub method: String,
    pub host: String,
    pub path: String,
    pub status_code: u16,
    pub status: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub total_requests: u64,
    pub recent_requests: Vec<RequestRecord>,
}

/// Request counter plus the most recent `capacity` records, oldest first.
pub struct Statistics {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    total: u64,
    recent: VecDeque<RequestRecord>,
}

impl Statistics {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                total: 0,
                recent: VecDeque::with_capacity(capacity),
            }),
        }
    }

    pub fn record(&self, record: RequestRecord) {
        let mut inner = self.inner.lock();
        inner.total += 1;
        if inner.recent.len() == self.capacity {
            inner.recent.pop_front();
        }
        inner.recent.push_back(record);
    }

    pub fn total(&self) -> u64 {
        self.inner.lock().total
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let inner = self.inner.lock();
        StatisticsSnapshot {
            total_requests: inner.total,
            recent_requests: inner.recent.iter().cloned().collect(),
        }
    }
}
