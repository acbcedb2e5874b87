use tokio::sync::RwLock;

use courseplan_core::schedule::ScheduleSnapshot;

use super::{RepositoryError, ScheduleRepository};

#[derive(Default)]
pub struct InMemoryScheduleRepository {
    snapshot: RwLock<Option<ScheduleSnapshot>>,
    saves: RwLock<usize>,
}

impl InMemoryScheduleRepository {
    pub fn with_snapshot(snapshot: ScheduleSnapshot) -> Self {
        Self { snapshot: RwLock::new(Some(snapshot)), saves: RwLock::new(0) }
    }

    /// Number of `save` calls seen so far.
    pub async fn save_count(&self) -> usize {
        *self.saves.read().await
    }
}

#[async_trait::async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn save(&self, snapshot: &ScheduleSnapshot) -> Result<(), RepositoryError> {
        let mut stored = self.snapshot.write().await;
        *stored = Some(snapshot.clone());
        *self.saves.write().await += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<ScheduleSnapshot>, RepositoryError> {
        let stored = self.snapshot.read().await;
        Ok(stored.clone())
    }
}
