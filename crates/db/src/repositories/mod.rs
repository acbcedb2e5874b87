use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use courseplan_core::schedule::{Restored, ScheduleSnapshot, SelectionStore};

pub mod memory;
pub mod schedule;

pub use memory::InMemoryScheduleRepository;
pub use schedule::SqlScheduleRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Whole-snapshot persistence for the selected courses and their grid.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Replaces whatever was stored before.
    async fn save(&self, snapshot: &ScheduleSnapshot) -> Result<(), RepositoryError>;
    /// `None` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<ScheduleSnapshot>, RepositoryError>;
}

/// Loads and restores the stored selection, writing the cleaned state back
/// when restore had to collapse duplicates or repair the grid.
pub async fn load_selection<R>(repo: &R, max_period: u8) -> Result<Restored, RepositoryError>
where
    R: ScheduleRepository + ?Sized,
{
    let Some(snapshot) = repo.load().await? else {
        return Ok(Restored {
            store: SelectionStore::new(max_period),
            duplicates_removed: 0,
            dropped_assignments: 0,
            repaired_slots: 0,
        });
    };

    let restored = SelectionStore::restore(snapshot, max_period);
    if restored.needs_persist() {
        repo.save(&restored.store.snapshot()).await?;
        info!(
            event_name = "persistence.selection_repaired",
            duplicates_removed = restored.duplicates_removed,
            dropped_assignments = restored.dropped_assignments,
            repaired_slots = restored.repaired_slots,
            "re-saved cleaned selection"
        );
    }
    Ok(restored)
}
