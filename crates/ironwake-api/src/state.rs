//! Shared application state.

use std::fmt;
use std::sync::Arc;

use ironwake_core::repository::SnapshotRepository;
use ironwake_session::application::actor::AuthorityHandle;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the single-writer authority task.
    pub authority: AuthorityHandle,
    /// Where flushed snapshots go.
    pub repository: Arc<dyn SnapshotRepository>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(authority: AuthorityHandle, repository: Arc<dyn SnapshotRepository>) -> Self {
        Self {
            authority,
            repository,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("authority", &self.authority)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use ironwake_core::config::RulesConfig;
    use ironwake_session::application::actor::spawn_authority;
    use ironwake_session::application::authority::Authority;
    use ironwake_session::domain::store::GameStore;
    use ironwake_snapshot_store::memory::InMemorySnapshotRepository;
    use ironwake_test_support::{CrewFixture, FixedTime, MockRng};

    use super::AppState;

    /// State over a fresh authority holding a two-member crew.
    pub(crate) fn app_state() -> (AppState, CrewFixture) {
        let rules = Arc::new(RulesConfig::default());
        let fixture = CrewFixture::new(2);
        let store = GameStore {
            roster: fixture.roster(&rules.momentum),
            ..GameStore::default()
        };
        let time = Arc::new(FixedTime(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let authority = Authority::new(store, rules, time, Box::new(MockRng), 16);
        let (handle, _task) = spawn_authority(authority);
        let state = AppState::new(handle, Arc::new(InMemorySnapshotRepository::new()));
        (state, fixture)
    }
}
