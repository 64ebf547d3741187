//! File-backed profile storage

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::profile::LearnerProfile;
use crate::types::{SessionId, StudentId};

use super::memory::latest_for;
use super::traits::ProfileStore;

/// Profiles file name
const PROFILES_FILE: &str = "profiles.json";

/// Profiles persisted as a JSON array in a data directory
pub struct JsonProfileStore {
    profiles: Arc<RwLock<HashMap<SessionId, LearnerProfile>>>,
    file_path: PathBuf,
}

impl JsonProfileStore {
    /// Load profiles from `data_dir` or start empty
    pub async fn load(data_dir: &Path) -> Result<Self, StoreError> {
        let file_path = data_dir.join(PROFILES_FILE);

        let profiles = if fs::try_exists(&file_path).await? {
            let content = fs::read_to_string(&file_path).await?;
            let list: Vec<LearnerProfile> = serde_json::from_str(&content)?;
            debug!(path = %file_path.display(), count = list.len(), "Loaded profiles");
            list.into_iter().map(|p| (p.session_id, p)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            profiles: Arc::new(RwLock::new(profiles)),
            file_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// All profiles of a student, oldest first
    pub async fn list_for(&self, student_id: &StudentId) -> Vec<LearnerProfile> {
        let profiles = self.profiles.read().await;
        let mut list: Vec<LearnerProfile> = profiles
            .values()
            .filter(|p| &p.student_id == student_id)
            .cloned()
            .collect();
        list.sort_by_key(|p| (p.generated_at, p.session_id));
        list
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }

    /// Persist profiles to file
    async fn persist(&self) -> Result<(), StoreError> {
        let profiles = self.profiles.read().await;
        let mut list: Vec<_> = profiles.values().collect();
        list.sort_by_key(|p| p.session_id);

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&list)?;
        fs::write(&self.file_path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for JsonProfileStore {
    async fn save_profile(&self, profile: &LearnerProfile) -> Result<(), StoreError> {
        {
            let mut profiles = self.profiles.write().await;
            profiles.insert(profile.session_id, profile.clone());
        }
        self.persist().await
    }

    async fn get_latest_profile(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<LearnerProfile>, StoreError> {
        let profiles = self.profiles.read().await;
        Ok(latest_for(profiles.values(), student_id))
    }

    async fn get_profile(&self, session_id: SessionId) -> Result<Option<LearnerProfile>, StoreError> {
        Ok(self.profiles.read().await.get(&session_id).cloned())
    }
}
