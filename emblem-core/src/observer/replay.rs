use super::{DecisionRecord, SinkError, TrainingSink};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const DEFAULT_REPLAY_CAPACITY: usize = 1000;

/// Bounded ring of recent records; the oldest is evicted when full.
pub struct ReplayBuffer {
    capacity: usize,
    records: Mutex<VecDeque<DecisionRecord>>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the buffered records, oldest first.
    pub fn snapshot(&self) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn total_reward(&self) -> f32 {
        self.records
            .lock()
            .map(|r| r.iter().map(|rec| rec.reward).sum())
            .unwrap_or(0.0)
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_CAPACITY)
    }
}

impl TrainingSink for ReplayBuffer {
    fn record(&self, record: &DecisionRecord) -> Result<(), SinkError> {
        if self.capacity == 0 {
            return Ok(());
        }
        let mut records = self.records.lock().map_err(|_| SinkError::Poisoned)?;
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "ReplayBuffer"
    }
}

impl TrainingSink for Arc<ReplayBuffer> {
    fn record(&self, record: &DecisionRecord) -> Result<(), SinkError> {
        self.as_ref().record(record)
    }

    fn name(&self) -> &str {
        self.as_ref().name()
    }
}
