//! User-facing notifications.
//!
//! The pipeline and stores report through [`NotificationSink`]. [`AlertCenter`]
//! is the bundled sink: an alert queue whose entries dismiss themselves after a
//! per-kind delay. Every scheduled dismissal is returned as an [`AlertHandle`]
//! so callers (and tests running under paused tokio time) can cancel it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task::AbortHandle;

/// Delay between dismissing an alert and dropping it from the queue.
pub const REMOVE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Success,
    Error,
    Warning,
    Info,
}

impl AlertKind {
    /// How long an alert of this kind stays visible by default.
    #[must_use]
    pub const fn default_duration(self) -> Duration {
        match self {
            Self::Success | Self::Info => Duration::from_millis(5000),
            Self::Error => Duration::from_millis(7000),
            Self::Warning => Duration::from_millis(6000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: AlertKind,
    pub message: String,
}

impl Notification {
    #[must_use]
    pub fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(AlertKind::Success, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(AlertKind::Error, message)
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(AlertKind::Warning, message)
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(AlertKind::Info, message)
    }
}

/// Consumer-provided surface for user-visible messages.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Alert {
    pub id: u64,
    pub kind: AlertKind,
    pub message: String,
    pub dismissed: bool,
    pub created_at: OffsetDateTime,
}

/// Handle to a pushed alert and its pending auto-dismiss timer.
#[derive(Debug)]
pub struct AlertHandle {
    id: u64,
    timer: Option<AbortHandle>,
}

impl AlertHandle {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether an auto-dismiss timer was scheduled.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.timer.is_some()
    }

    /// Cancels the auto-dismiss; the alert stays until dismissed explicitly.
    pub fn cancel(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

struct AlertQueue {
    alerts: Vec<Alert>,
    next_id: u64,
}

/// In-memory alert queue with timed dismissal.
#[derive(Clone)]
pub struct AlertCenter {
    inner: Arc<Mutex<AlertQueue>>,
}

impl AlertCenter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(AlertQueue {
                alerts: Vec::new(),
                next_id: 1,
            })),
        }
    }

    pub fn success(&self, message: impl Into<String>) -> AlertHandle {
        self.push(AlertKind::Success, message, AlertKind::Success.default_duration())
    }

    pub fn error(&self, message: impl Into<String>) -> AlertHandle {
        self.push(AlertKind::Error, message, AlertKind::Error.default_duration())
    }

    pub fn warning(&self, message: impl Into<String>) -> AlertHandle {
        self.push(AlertKind::Warning, message, AlertKind::Warning.default_duration())
    }

    pub fn info(&self, message: impl Into<String>) -> AlertHandle {
        self.push(AlertKind::Info, message, AlertKind::Info.default_duration())
    }

    /// Queues an alert. A zero `duration` keeps it until dismissed.
    pub fn push(
        &self,
        kind: AlertKind,
        message: impl Into<String>,
        duration: Duration,
    ) -> AlertHandle {
        let id = {
            let mut queue = self.queue();
            let id = queue.next_id;
            queue.next_id += 1;
            queue.alerts.push(Alert {
                id,
                kind,
                message: message.into(),
                dismissed: false,
                created_at: OffsetDateTime::now_utc(),
            });
            id
        };

        let timer = if duration.is_zero() {
            None
        } else {
            self.schedule(duration, move |center| {
                center.dismiss(id);
            })
        };

        AlertHandle { id, timer }
    }

    /// Marks an alert dismissed and schedules its removal. Returns false for unknown ids.
    pub fn dismiss(&self, id: u64) -> bool {
        let found = {
            let mut queue = self.queue();
            match queue.alerts.iter_mut().find(|a| a.id == id) {
                Some(alert) => {
                    alert.dismissed = true;
                    true
                }
                None => false,
            }
        };

        if found {
            // Fire-and-forget: removal is never cancelled.
            let _ = self.schedule(REMOVE_DELAY, move |center| center.remove(id));
        }
        found
    }

    pub fn remove(&self, id: u64) {
        self.queue().alerts.retain(|a| a.id != id);
    }

    pub fn clear(&self) {
        self.queue().alerts.clear();
    }

    /// Snapshot of every queued alert, dismissed ones included.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.queue().alerts.clone()
    }

    #[must_use]
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.queue()
            .alerts
            .iter()
            .filter(|a| !a.dismissed)
            .cloned()
            .collect()
    }

    fn queue(&self) -> MutexGuard<'_, AlertQueue> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule<F>(&self, delay: Duration, f: F) -> Option<AbortHandle>
    where
        F: FnOnce(&AlertCenter) + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; alert timer not scheduled");
            return None;
        };
        let center = self.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            f(&center);
        });
        Some(task.abort_handle())
    }
}

impl Default for AlertCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for AlertCenter {
    fn notify(&self, notification: Notification) {
        let duration = notification.kind.default_duration();
        // Handle dropped on purpose: sink notifications are not cancelled.
        let _ = self.push(notification.kind, notification.message, duration);
    }
}
