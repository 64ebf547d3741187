//! Storage traits for sessions and profiles

use async_trait::async_trait;

use crate::error::StoreError;
use crate::profile::LearnerProfile;
use crate::session::TestSession;
use crate::types::{SessionId, StudentId};

/// Session persistence. `save` replaces the whole session value.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Retrieve a session by ID
    async fn load(&self, id: SessionId) -> Result<Option<TestSession>, StoreError>;

    /// Insert or replace a session
    async fn save(&self, session: &TestSession) -> Result<(), StoreError>;

    /// The student's in-progress session, if any
    async fn find_active(&self, student_id: &StudentId) -> Result<Option<TestSession>, StoreError>;

    /// All in-progress sessions
    async fn list_in_progress(&self) -> Result<Vec<TestSession>, StoreError>;
}

/// Profile persistence. At most one profile is kept per session.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Store a profile, superseding any earlier profile of the same session
    async fn save_profile(&self, profile: &LearnerProfile) -> Result<(), StoreError>;

    /// Most recently generated profile of a student
    async fn get_latest_profile(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<LearnerProfile>, StoreError>;

    /// Profile of a session
    async fn get_profile(&self, session_id: SessionId) -> Result<Option<LearnerProfile>, StoreError>;
}
