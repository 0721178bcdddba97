//! Concurrency-safe registries for sessions, assessments, and learner levels.
//!
//! The registry map and each entry are locked separately: the map lock
//! (`RwLock`) is held only long enough to look an entry up or insert it,
//! and each entry has its own `Mutex` that serializes commands against that
//! one session. Entries idle longer than the time-to-live are evicted lazily
//! on lookup and by [`SessionStore::evict_idle`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::assessment::Assessment;
use crate::error::{Result, StepwiseError};
use crate::level::ComprehensionLevel;
use crate::session::Session;

/// Shared, individually lockable handle to a stored session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Shared, individually lockable handle to a stored assessment.
pub type AssessmentHandle = Arc<Mutex<Assessment>>;

// ============================================================================
// TTL map
// ============================================================================

#[derive(Debug)]
struct Entry<T> {
    value: Arc<Mutex<T>>,
    last_seen: Instant,
}

/// Identifier-keyed map whose entries expire after a period of inactivity.
#[derive(Debug)]
struct TtlMap<T> {
    entries: RwLock<HashMap<Uuid, Entry<T>>>,
    ttl: Duration,
}

impl<T> TtlMap<T> {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    async fn insert(&self, id: Uuid, value: T) -> Arc<Mutex<T>> {
        let value = Arc::new(Mutex::new(value));
        self.entries.write().await.insert(
            id,
            Entry {
                value: Arc::clone(&value),
                last_seen: Instant::now(),
            },
        );
        value
    }

    /// Returns the entry and refreshes its idle timer, or evicts it if expired.
    async fn get(&self, id: Uuid) -> Option<Arc<Mutex<T>>> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id)?;

        if entry.last_seen.elapsed() > self.ttl {
            entries.remove(&id);
            debug!(%id, "Evicted expired entry on lookup");
            return None;
        }

        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.value))
    }

    async fn remove(&self, id: Uuid) -> bool {
        self.entries.write().await.remove(&id).is_some()
    }

    async fn evict_idle(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_seen.elapsed() <= self.ttl);
        before - entries.len()
    }

    async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Storage for learning sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a new session and returns its handle.
    async fn insert(&self, session: Session) -> SessionHandle;

    /// Looks a session up and refreshes its idle timer.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for unknown or expired identifiers.
    async fn get(&self, id: Uuid) -> Result<SessionHandle>;

    /// Removes a session. Returns `true` if it existed.
    async fn remove(&self, id: Uuid) -> bool;

    /// Evicts every session idle longer than the time-to-live.
    /// Returns the number evicted.
    async fn evict_idle(&self) -> usize;

    /// Returns the number of stored sessions.
    async fn count(&self) -> usize;
}

/// In-memory [`SessionStore`] with idle eviction.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: TtlMap<Session>,
}

impl InMemorySessionStore {
    /// Creates an empty store with the given idle time-to-live.
    #[must_use]
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: TtlMap::new(idle_ttl),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> SessionHandle {
        self.sessions.insert(session.id(), session).await
    }

    async fn get(&self, id: Uuid) -> Result<SessionHandle> {
        self.sessions
            .get(id)
            .await
            .ok_or(StepwiseError::SessionNotFound { id })
    }

    async fn remove(&self, id: Uuid) -> bool {
        self.sessions.remove(id).await
    }

    async fn evict_idle(&self) -> usize {
        self.sessions.evict_idle().await
    }

    async fn count(&self) -> usize {
        self.sessions.count().await
    }
}

// ============================================================================
// Assessments
// ============================================================================

/// In-progress assessments, evicted after the same idle time-to-live as sessions.
#[derive(Debug)]
pub struct AssessmentRegistry {
    assessments: TtlMap<Assessment>,
}

impl AssessmentRegistry {
    /// Creates an empty registry with the given idle time-to-live.
    #[must_use]
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            assessments: TtlMap::new(idle_ttl),
        }
    }

    /// Stores a new assessment and returns its handle.
    pub async fn insert(&self, assessment: Assessment) -> AssessmentHandle {
        self.assessments.insert(assessment.id(), assessment).await
    }

    /// Looks an assessment up.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentNotFound` for unknown or expired identifiers.
    pub async fn get(&self, id: Uuid) -> Result<AssessmentHandle> {
        self.assessments
            .get(id)
            .await
            .ok_or(StepwiseError::AssessmentNotFound { id })
    }

    /// Discards an assessment. Returns `true` if it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.assessments.remove(id).await
    }

    /// Evicts idle assessments and returns the number evicted.
    pub async fn evict_idle(&self) -> usize {
        self.assessments.evict_idle().await
    }

    /// Returns the number of stored assessments.
    pub async fn count(&self) -> usize {
        self.assessments.count().await
    }
}

// ============================================================================
// Learner levels
// ============================================================================

/// Storage for each learner's last assigned comprehension level.
#[async_trait]
pub trait LevelStore: Send + Sync {
    /// Records the level for a learner, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Backend-specific storage failures.
    async fn save(&self, learner: &str, level: ComprehensionLevel) -> Result<()>;

    /// Returns the learner's stored level, if any.
    ///
    /// # Errors
    ///
    /// Backend-specific storage failures.
    async fn load(&self, learner: &str) -> Result<Option<ComprehensionLevel>>;
}

/// In-memory [`LevelStore`].
#[derive(Debug, Default)]
pub struct InMemoryLevelStore {
    levels: RwLock<HashMap<String, ComprehensionLevel>>,
}

impl InMemoryLevelStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LevelStore for InMemoryLevelStore {
    async fn save(&self, learner: &str, level: ComprehensionLevel) -> Result<()> {
        self.levels.write().await.insert(learner.to_string(), level);
        Ok(())
    }

    async fn load(&self, learner: &str) -> Result<Option<ComprehensionLevel>> {
        Ok(self.levels.read().await.get(learner).copied())
    }
}
