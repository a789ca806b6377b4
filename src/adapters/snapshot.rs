use crate::core::store::{RosterStore, StoreSnapshot};
use crate::domain::ports::Storage;
use crate::utils::error::Result;

/// Persists the whole store as one JSON document through a [`Storage`] backend.
pub struct SnapshotRepository<S: Storage> {
    storage: S,
    file: String,
}

impl<S: Storage> SnapshotRepository<S> {
    pub fn new(storage: S, file: impl Into<String>) -> Self {
        Self {
            storage,
            file: file.into(),
        }
    }

    /// A missing snapshot yields an empty store.
    pub async fn load(&self) -> Result<RosterStore> {
        if !self.storage.exists(&self.file).await {
            tracing::info!("📂 No snapshot at {}, starting with an empty roster", self.file);
            return Ok(RosterStore::new());
        }

        let data = self.storage.read_file(&self.file).await?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&data)?;
        tracing::debug!(
            "Loaded snapshot {}: {} programs, {} movements",
            self.file,
            snapshot.programs.len(),
            snapshot.movements.len()
        );
        Ok(RosterStore::from_snapshot(snapshot))
    }

    pub async fn save(&self, store: &RosterStore) -> Result<()> {
        let snapshot = store.snapshot()?;
        let data = serde_json::to_vec_pretty(&snapshot)?;
        self.storage.write_file(&self.file, &data).await?;
        tracing::debug!("💾 Saved snapshot {} ({} bytes)", self.file, data.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::LocalStorage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_snapshot_gives_empty_store() {
        let dir = TempDir::new().unwrap();
        let repo = SnapshotRepository::new(
            LocalStorage::new(dir.path().to_string_lossy().to_string()),
            "roster.json",
        );

        let store = repo.load().await.unwrap();
        assert!(store.program_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let repo = SnapshotRepository::new(
            LocalStorage::new(dir.path().to_string_lossy().to_string()),
            "nested/roster.json",
        );

        let store = RosterStore::new();
        let id = store.create_program("Ride Tribe", "Sundays", 6, None).unwrap();
        repo.save(&store).await.unwrap();

        let restored = repo.load().await.unwrap();
        assert_eq!(restored.program_ids().unwrap(), vec![id.clone()]);
        assert_eq!(
            restored.read_program(&id, |p| p.description.clone()).unwrap(),
            "Sundays"
        );
    }
}
