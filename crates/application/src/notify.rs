//! Transient toast notifications.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const MAX_TOASTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub description: String,
    pub expires_at: Instant,
}

/// Transient notifications, newest last.
#[derive(Debug, Clone)]
pub struct Notifications {
    lifetime: Duration,
    toasts: VecDeque<Toast>,
}

impl Notifications {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            toasts: VecDeque::new(),
        }
    }

    pub fn set_lifetime(&mut self, lifetime: Duration) {
        self.lifetime = lifetime;
    }

    pub fn success(&mut self, title: impl Into<String>, description: impl Into<String>, now: Instant) {
        self.push(ToastLevel::Success, title.into(), description.into(), now);
    }

    pub fn error(&mut self, title: impl Into<String>, description: impl Into<String>, now: Instant) {
        self.push(ToastLevel::Error, title.into(), description.into(), now);
    }

    fn push(&mut self, level: ToastLevel, title: String, description: String, now: Instant) {
        if self.toasts.len() == MAX_TOASTS {
            self.toasts.pop_front();
        }
        self.toasts.push_back(Toast {
            level,
            title,
            description,
            expires_at: now + self.lifetime,
        });
    }

    /// Drops expired toasts; returns `true` if any were removed.
    pub fn prune(&mut self, now: Instant) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.expires_at > now);
        self.toasts.len() != before
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn dismiss_latest(&mut self) {
        self.toasts.pop_back();
    }
}
