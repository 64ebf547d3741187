//! In-memory stores for tests and single-process use

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::profile::LearnerProfile;
use crate::session::{SessionStatus, TestSession};
use crate::types::{SessionId, StudentId};

use super::traits::{ProfileStore, SessionStore};

/// Sessions kept in a map keyed by ID
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, TestSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: SessionId) -> Result<Option<TestSession>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn save(&self, session: &TestSession) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        Ok(())
    }

    async fn find_active(&self, student_id: &StudentId) -> Result<Option<TestSession>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.student_id() == student_id && s.status() == SessionStatus::InProgress)
            .max_by_key(|s| s.id())
            .cloned())
    }

    async fn list_in_progress(&self) -> Result<Vec<TestSession>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut active: Vec<TestSession> = sessions
            .values()
            .filter(|s| s.status() == SessionStatus::InProgress)
            .cloned()
            .collect();
        active.sort_by_key(|s| s.id());
        Ok(active)
    }
}

/// Profiles kept in a map keyed by session ID
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<SessionId, LearnerProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

/// Newest profile of `student_id`; ties resolve to the later session
pub(super) fn latest_for<'a>(
    profiles: impl Iterator<Item = &'a LearnerProfile>,
    student_id: &StudentId,
) -> Option<LearnerProfile> {
    profiles
        .filter(|p| &p.student_id == student_id)
        .max_by_key(|p| (p.generated_at, p.session_id))
        .cloned()
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn save_profile(&self, profile: &LearnerProfile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .await
            .insert(profile.session_id, profile.clone());
        Ok(())
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
