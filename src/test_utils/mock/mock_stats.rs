use async_trait::async_trait;
use parking_lot::Mutex;

use crate::Result;
use crate::StatsSink;
use crate::StatsSnapshot;

/// Keeps every published snapshot
#[derive(Debug, Default)]
pub struct MemoryStatsSink {
    published: Mutex<Vec<StatsSnapshot>>,
}

impl MemoryStatsSink {
    pub fn latest(&self) -> Option<StatsSnapshot> {
        self.published.lock().last().cloned()
    }

    pub fn publications(&self) -> usize {
        self.published.lock().len()
    }
}

#[async_trait]
impl StatsSink for MemoryStatsSink {
    async fn publish(
        &self,
        snapshot: StatsSnapshot,
    ) -> Result<()> {
        self.published.lock().push(snapshot);
        Ok(())
    }
}
