//! Transient user-facing notifications (toasts).
//!
//! Timed notifications disappear on their own; loading notifications stay
//! until the operation that raised them removes them. Renderers either poll
//! `active()` or follow `subscribe()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifetime of success/error/warning notifications.
pub const DEFAULT_TTL: Duration = Duration::from_millis(3000);

/// Buffered events per subscriber before old ones are dropped
const EVENT_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Loading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Notification {
    pub id: u64,
    pub text: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    /// `None` keeps the notification until it is removed.
    pub ttl_ms: Option<u64>,
}

impl Notification {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_ms {
            Some(ttl) => {
                let ttl = chrono::Duration::milliseconds(i64::try_from(ttl).unwrap_or(i64::MAX));
                now >= self.created_at + ttl
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Added(Notification),
    Removed(u64),
    Cleared,
}

#[derive(Clone)]
pub struct NotificationCenter {
    items: Arc<Mutex<Vec<Notification>>>,
    next_id: Arc<AtomicU64>,
    events: broadcast::Sender<NotificationEvent>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            events,
        }
    }

    fn items(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    /// Adds a notification and returns its id.
    pub fn add(&self, kind: NotificationKind, text: impl Into<String>, ttl: Option<Duration>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notification = Notification {
            id,
            text: text.into(),
            kind,
            created_at: Utc::now(),
            ttl_ms: ttl.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        };

        self.items().push(notification.clone());
        let _ = self.events.send(NotificationEvent::Added(notification));

        // Expire eagerly when a runtime is around; `active()` prunes otherwise.
        if let (Some(ttl), Ok(handle)) = (ttl, tokio::runtime::Handle::try_current()) {
            let center = self.clone();
            handle.spawn(async move {
                tokio::time::sleep(ttl).await;
                center.remove(id);
            });
        }

        id
    }

    pub fn success(&self, text: impl Into<String>) -> u64 {
        self.add(NotificationKind::Success, text, Some(DEFAULT_TTL))
    }

    pub fn error(&self, text: impl Into<String>) -> u64 {
        self.add(NotificationKind::Error, text, Some(DEFAULT_TTL))
    }

    pub fn warning(&self, text: impl Into<String>) -> u64 {
        self.add(NotificationKind::Warning, text, Some(DEFAULT_TTL))
    }

    /// Sticky until removed.
    pub fn loading(&self, text: impl Into<String>) -> u64 {
        self.add(NotificationKind::Loading, text, None)
    }

    pub fn remove(&self, id: u64) {
        let removed = {
            let mut items = self.items();
            let before = items.len();
            items.retain(|n| n.id != id);
            items.len() != before
        };
        if removed {
            let _ = self.events.send(NotificationEvent::Removed(id));
        }
    }

    pub fn clear(&self) {
        self.items().clear();
        let _ = self.events.send(NotificationEvent::Cleared);
    }

    /// Notifications that are still visible, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        let now = Utc::now();
        let mut items = self.items();
        items.retain(|n| !n.is_expired(now));
        items.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let center = NotificationCenter::new();
        let id = center.loading("Please confirm wallet connection");
        assert_eq!(center.active().len(), 1);
        assert_eq!(center.active()[0].kind, NotificationKind::Loading);

        center.remove(id);
        assert!(center.active().is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let center = NotificationCenter::new();
        let a = center.error("first");
        let b = center.error("second");
        assert_ne!(a, b);
    }

    #[test]
    fn test_expired_notifications_are_pruned() {
        let center = NotificationCenter::new();
        center.add(NotificationKind::Warning, "gone", Some(Duration::ZERO));
        center.loading("sticky");
        let active = center.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].text, "sticky");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_notification_expires_with_runtime() {
        let center = NotificationCenter::new();
        let mut events = center.subscribe();
        let id = center.success("Transaction submitted");

        assert_eq!(
            events.recv().await.expect("added event"),
            NotificationEvent::Added(center.active()[0].clone())
        );

        tokio::time::sleep(DEFAULT_TTL + Duration::from_millis(10)).await;
        assert_eq!(events.recv().await.expect("removed event"), NotificationEvent::Removed(id));
    }

    #[test]
    fn test_clear() {
        let center = NotificationCenter::new();
        center.error("a");
        center.loading("b");
        center.clear();
        assert!(center.active().is_empty());
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::Loading).expect("serialize"),
            "\"loading\""
        );
    }
}
