//! In-memory store used by tests and local development.
//!
//! The conditional consume relies on DashMap's per-shard write lock:
//! `get_mut` holds the shard exclusively, so check-then-mark inside the
//! guard is atomic with respect to concurrent attempts on the same token.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::{AccessToken, Goal};
use crate::store::{ConsumeOutcome, GoalStore, TokenStore};

pub struct MemoryStore {
    goals: DashMap<i64, Goal>,
    tokens: DashMap<String, AccessToken>,
    next_goal_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            goals: DashMap::new(),
            tokens: DashMap::new(),
            next_goal_id: AtomicI64::new(1),
        }
    }

    pub fn add_goal(&self, name: &str, description: &str) -> Goal {
        let now = Utc::now();
        let goal = Goal {
            id: self.next_goal_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            description: description.to_string(),
            access_secret_hash: None,
            created_at: now,
            updated_at: now,
        };
        self.goals.insert(goal.id, goal.clone());
        goal
    }

    /// Deletes the goal and, as the database cascade would, its tokens.
    pub fn remove_goal(&self, goal_id: i64) -> bool {
        let removed = self.goals.remove(&goal_id).is_some();
        if removed {
            self.tokens.retain(|_, t| t.goal_id != goal_id);
        }
        removed
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

#[async_trait]
impl GoalStore for MemoryStore {
    async fn goal_exists(&self, goal_id: i64) -> anyhow::Result<bool> {
        Ok(self.goals.contains_key(&goal_id))
    }

    async fn get_goal(&self, goal_id: i64) -> anyhow::Result<Option<Goal>> {
        Ok(self.goals.get(&goal_id).map(|g| g.value().clone()))
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, token: &AccessToken) -> anyhow::Result<()> {
        self.tokens.insert(token.token_id.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, token_id: &str) -> anyhow::Result<Option<AccessToken>> {
        Ok(self.tokens.get(token_id).map(|t| t.value().clone()))
    }

    async fn consume_token(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ConsumeOutcome> {
        let Some(mut entry) = self.tokens.get_mut(token_id) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        // Consumed is checked before expiry: a replayed token reports
        // AlreadyUsed even once it is also past its deadline.
        if entry.consumed {
            return Ok(ConsumeOutcome::AlreadyUsed);
        }
        if entry.is_expired(now) {
            return Ok(ConsumeOutcome::Expired);
        }
        entry.consumed = true;
        entry.consumed_at = Some(now);
        Ok(ConsumeOutcome::Consumed {
            goal_id: entry.goal_id,
        })
    }

    async fn revoke_token(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ConsumeOutcome> {
        let Some(mut entry) = self.tokens.get_mut(token_id) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if entry.consumed {
            return Ok(ConsumeOutcome::AlreadyUsed);
        }
        entry.consumed = true;
        entry.consumed_at = Some(now);
        Ok(ConsumeOutcome::Consumed {
            goal_id: entry.goal_id,
        })
    }

    async fn list_tokens_for_goal(&self, goal_id: i64) -> anyhow::Result<Vec<AccessToken>> {
        let mut tokens: Vec<AccessToken> = self
            .tokens
            .iter()
            .filter(|t| t.value().goal_id == goal_id)
            .map(|t| t.value().clone())
            .collect();
        tokens.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        Ok(tokens)
    }
}
