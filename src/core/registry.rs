//! In-memory registry of live sessions
//!
//! Sessions live until deleted, evicted for inactivity, or the process stops.
//! Nothing is written to disk.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::providers::ResponseProvider;

use super::session::SessionHandle;

/// Shortest pause between two idle sweeps
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(10);

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
    provider: Arc<dyn ResponseProvider>,
    welcome_delay: Duration,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn ResponseProvider>, welcome_delay: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            provider,
            welcome_delay,
        }
    }

    /// Start a session and schedule its welcome message
    pub async fn create(&self) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(self.provider.clone()));
        handle.begin_welcome().await;
        self.sessions
            .write()
            .await
            .insert(handle.id(), handle.clone());

        // A session ended before the delay gets no welcome
        let welcome = Arc::downgrade(&handle);
        let delay = self.welcome_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(session) = welcome.upgrade() {
                session.post_welcome().await;
            }
        });

        let live = self.len().await;
        tracing::info!(
            session = %handle.id(),
            provider = self.provider.name(),
            live,
            "Session started"
        );
        handle
    }

    /// Look up a session and mark it active
    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.read().await.get(&id).cloned()?;
        handle.touch();
        Some(handle)
    }

    /// End a session. Returns false if it did not exist.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session = %id, "Session ended");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session idle for at least `max_idle`. Returns how many went.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let candidates: Vec<Arc<SessionHandle>> =
            self.sessions.read().await.values().cloned().collect();

        let mut idle = Vec::new();
        for handle in candidates {
            if handle.is_idle(max_idle).await {
                idle.push(handle.id());
            }
        }

        if idle.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.write().await;
        let mut evicted = 0;
        for id in idle {
            // Activity since the check keeps the session
            let still_idle = sessions
                .get(&id)
                .is_some_and(|handle| handle.idle_for() >= max_idle);
            if still_idle && sessions.remove(&id).is_some() {
                tracing::info!(session = %id, "Session evicted after inactivity");
                evicted += 1;
            }
        }
        evicted
    }

    /// Periodically evict idle sessions until the registry is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        let period = (max_idle / 2).max(MIN_SWEEP_PERIOD);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let Some(sessions) = registry.upgrade() else {
                    break;
                };
                let evicted = sessions.evict_idle(max_idle).await;
                if evicted > 0 {
                    let live = sessions.len().await;
                    tracing::debug!(evicted, live, "Idle sweep");
                }
            }
        })
    }
}
