//! Per-user conversation state.
//!
//! Holds the tariff selection, the admin panel state and the menu-hint flag
//! for each user. Entries idle longer than the TTL are evicted by
//! [`SessionContexts::cleanup_expired`]; a completed paid flow clears its
//! selection explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::admin::AdminState;

#[derive(Debug, Clone)]
struct UserContext {
    selection: Option<String>,
    admin: AdminState,
    menu_hint_shown: bool,
    touched_at: Instant,
}

impl UserContext {
    fn new(now: Instant) -> Self {
        Self {
            selection: None,
            admin: AdminState::Idle,
            menu_hint_shown: false,
            touched_at: now,
        }
    }

    fn is_empty(&self) -> bool {
        self.selection.is_none() && self.admin == AdminState::Idle && !self.menu_hint_shown
    }
}

/// Shared store of per-user contexts.
#[derive(Debug, Clone)]
pub struct SessionContexts {
    contexts: Arc<RwLock<HashMap<i64, UserContext>>>,
    ttl: Duration,
}

impl SessionContexts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            contexts: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    async fn update<R>(&self, user_id: i64, f: impl FnOnce(&mut UserContext) -> R) -> R {
        let now = Instant::now();
        let mut contexts = self.contexts.write().await;
        let context = contexts
            .entry(user_id)
            .or_insert_with(|| UserContext::new(now));
        context.touched_at = now;
        f(context)
    }

    async fn read<R>(&self, user_id: i64, f: impl FnOnce(&UserContext) -> R) -> Option<R> {
        self.contexts.read().await.get(&user_id).map(f)
    }

    pub async fn admin_state(&self, user_id: i64) -> AdminState {
        self.read(user_id, |c| c.admin)
            .await
            .unwrap_or_default()
    }

    pub async fn set_admin_state(&self, user_id: i64, state: AdminState) {
        self.update(user_id, |c| c.admin = state).await;
    }

    /// Mark the menu hint as shown; returns `true` only the first time.
    pub async fn take_menu_hint(&self, user_id: i64) -> bool {
        self.update(user_id, |c| !std::mem::replace(&mut c.menu_hint_shown, true))
            .await
    }

    /// Number of tracked users.
    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    /// Drop contexts idle longer than the TTL, measured at `now`.
    pub async fn cleanup_expired_at(&self, now: Instant) -> usize {
        let mut contexts = self.contexts.write().await;
        let before = contexts.len();
        contexts.retain(|_, c| now.saturating_duration_since(c.touched_at) <= self.ttl);
        let removed = before - contexts.len();
        if removed > 0 {
            debug!(removed, "Evicted idle user contexts");
        }
        removed
    }

    pub async fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now()).await
    }

    /// Tariff selection view over these contexts.
    pub fn selections(&self) -> TariffSelectionCache {
        TariffSelectionCache {
            contexts: self.clone(),
        }
    }
}

/// `select` / `get` / `clear` over the per-user tariff selection.
#[derive(Debug, Clone)]
pub struct TariffSelectionCache {
    contexts: SessionContexts,
}

impl TariffSelectionCache {
    /// Overwrites any previous selection.
    pub async fn select(&self, user_id: i64, tariff: &str) {
        self.contexts
            .update(user_id, |c| c.selection = Some(tariff.to_string()))
            .await;
    }

    pub async fn get(&self, user_id: i64) -> Option<String> {
        self.contexts
            .read(user_id, |c| c.selection.clone())
            .await
            .flatten()
    }

    pub async fn clear(&self, user_id: i64) {
        let mut contexts = self.contexts.contexts.write().await;
        if let Some(context) = contexts.get_mut(&user_id) {
            context.selection = None;
            if context.is_empty() {
                contexts.remove(&user_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn selection_overwrites_and_clears() {
        let contexts = SessionContexts::new(DAY);
        let cache = contexts.selections();

        assert_eq!(cache.get(1).await, None);
        cache.select(1, "1 час").await;
        cache.select(1, "2 часа").await;
        assert_eq!(cache.get(1).await.as_deref(), Some("2 часа"));

        cache.clear(1).await;
        assert_eq!(cache.get(1).await, None);
        assert_eq!(contexts.len().await, 0);
    }

    #[tokio::test]
    async fn clearing_keeps_admin_state() {
        let contexts = SessionContexts::new(DAY);
        let cache = contexts.selections();

        cache.select(1, "1 час").await;
        contexts.set_admin_state(1, AdminState::MainMenu).await;
        cache.clear(1).await;

        assert_eq!(contexts.admin_state(1).await, AdminState::MainMenu);
        assert_eq!(contexts.len().await, 1);
    }

    #[tokio::test]
    async fn idle_contexts_are_evicted() {
        let contexts = SessionContexts::new(Duration::from_secs(60));
        let cache = contexts.selections();
        cache.select(1, "1 час").await;
        cache.select(2, "2 часа").await;

        let now = Instant::now();
        assert_eq!(contexts.cleanup_expired_at(now).await, 0);
        assert_eq!(
            contexts
                .cleanup_expired_at(now + Duration::from_secs(120))
                .await,
            2
        );
        assert_eq!(cache.get(1).await, None);
    }

    #[tokio::test]
    async fn menu_hint_is_shown_once() {
        let contexts = SessionContexts::new(DAY);
        assert!(contexts.take_menu_hint(1).await);
        assert!(!contexts.take_menu_hint(1).await);
        assert!(contexts.take_menu_hint(2).await);
    }

    #[tokio::test]
    async fn unknown_user_is_idle() {
        let contexts = SessionContexts::new(DAY);
        assert_eq!(contexts.admin_state(9).await, AdminState::Idle);
    }
}
