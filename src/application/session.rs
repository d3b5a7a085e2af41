// Session credential and invalidation events
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend answered 401 to some request.
    Invalidated,
}

/// Broadcast bus on which the backend client reports session problems.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        // No subscriber is not an error; the event is simply dropped.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Bearer credential shared between the backend client and the session owner.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    bearer: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    pub fn new(bearer: Option<String>) -> Self {
        Self {
            bearer: Arc::new(RwLock::new(bearer)),
        }
    }

    pub fn bearer(&self) -> Option<String> {
        self.bearer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        *self.bearer.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// React to session events until the bus closes. An invalidated session drops
    /// the bearer credential; requests continue unauthenticated.
    pub async fn watch(self, mut events: broadcast::Receiver<SessionEvent>) {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Invalidated) => {
                    if self.bearer().is_some() {
                        tracing::warn!("Session invalidated by backend, clearing credential");
                        self.clear();
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Session watcher lagged by {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_invalidation_clears_credential() {
        let events = SessionEvents::new();
        let credentials = Credentials::new(Some("token-1".into()));
        let watcher = tokio::spawn(credentials.clone().watch(events.subscribe()));

        events.publish(SessionEvent::Invalidated);
        tokio::time::timeout(Duration::from_secs(1), async {
            while credentials.bearer().is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        drop(events);
        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_publish_without_subscribers() {
        let events = SessionEvents::new();
        events.publish(SessionEvent::Invalidated);

        let credentials = Credentials::default();
        assert_eq!(credentials.bearer(), None);
        let seeded = Credentials::new(Some("abc".into()));
        assert_eq!(seeded.bearer().as_deref(), Some("abc"));
    }
}
