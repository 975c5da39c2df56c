//! Session lifecycle: spawn, cancellation, status

use std::sync::Mutex;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::sync::orchestrator::SyncStatus;
use crate::sync::types::SyncPhase;
use crate::Result;
use crate::WorldSyncError;

/// Handles of one running synchronization session.
pub(crate) struct Session {
    pub cancel: watch::Sender<bool>,
    pub status: watch::Receiver<SyncStatus>,
    pub handle: JoinHandle<Result<()>>,
    pub started_at: DateTime<Utc>,
}

/// Human-readable session progress.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub phase: SyncPhase,
    pub frontier_block: u64,
    pub emitted: u64,
    pub buffered: usize,
    pub started_at: DateTime<Utc>,
}

impl SyncReport {
    /// Format the report for display.
    #[must_use]
    pub fn format(&self) -> String {
        format!(
            "Phase: {}, Frontier: {}, Emitted: {}, Buffered: {}, Started: {}",
            self.phase,
            self.frontier_block,
            self.emitted,
            self.buffered,
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Owns the running session, if any. One session at a time per service.
pub struct LifecycleManager {
    session: Mutex<Option<Session>>,
}

impl LifecycleManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }

    /// Register a freshly spawned session. Fails if one is already running.
    pub(crate) fn register(&self, session: Session) -> Result<()> {
        let mut slot = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            return Err(WorldSyncError::Custom(
                "a sync session is already running".to_string(),
            ));
        }
        *slot = Some(session);
        Ok(())
    }

    fn take_session(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }

    /// Request cooperative cancellation and wait for the session to wind
    /// down. No-op when nothing is running.
    pub async fn stop(&self) -> Result<()> {
        let Some(session) = self.take_session() else {
            info!("No sync session to stop");
            return Ok(());
        };
        info!("Stopping sync session started at {}", session.started_at);
        // Receiver may already be gone if the task finished on its own
        let _ = session.cancel.send(true);
        Self::join_session(session).await
    }

    /// Wait for the session to end on its own, surfacing its outcome.
    pub async fn join(&self) -> Result<()> {
        let Some(session) = self.take_session() else {
            return Ok(());
        };
        Self::join_session(session).await
    }

    async fn join_session(session: Session) -> Result<()> {
        match session.handle.await {
            Ok(result) => result,
            Err(e) => Err(WorldSyncError::Fatal(format!("sync task panicked: {e}"))),
        }
    }

    /// Progress of the current session, if one is registered.
    #[must_use]
    pub fn report(&self) -> Option<SyncReport> {
        let slot = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.as_ref().map(|session| {
            let status = session.status.borrow().clone();
            SyncReport {
                phase: status.phase,
                frontier_block: status.frontier_block,
                emitted: status.emitted,
                buffered: status.buffered,
                started_at: session.started_at,
            }
        })
    }

    /// Whether a session is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let slot = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.as_ref().is_some_and(|s| !s.handle.is_finished())
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
