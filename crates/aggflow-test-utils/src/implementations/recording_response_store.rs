use async_trait::async_trait;
use parking_lot::Mutex;

use aggflow_core::{DataPacket, FlowError, ResponseStore};

/// Response store recording every write, optionally failing all of them
#[derive(Default)]
pub struct RecordingResponseStore {
    entries: Mutex<Vec<(String, DataPacket)>>,
    fail_writes: bool,
}

impl RecordingResponseStore {
    /// Store accepting and recording every write
    pub fn new() -> Self {
        Self::default()
    }

    /// Store rejecting every write, for fire-and-forget coverage
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail_writes: true,
        }
    }

    /// Keys written so far, in write order
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    /// The last value written under a key
    pub fn get(&self, key: &str) -> Option<DataPacket> {
        self.entries
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Number of recorded writes
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no write was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl ResponseStore for RecordingResponseStore {
    async fn store(&self, key: &str, value: DataPacket) -> Result<(), FlowError> {
        if self.fail_writes {
            return Err(FlowError::node_execution(key, "scripted store failure"));
        }
        self.entries.lock().push((key.to_string(), value));
        Ok(())
    }
}
