//! One-time goal-access tokens.
//!
//! Tokens are opaque server-side records, not signed payloads: possession
//! of the string is the whole credential, so ids come from the OS CSPRNG
//! and verification is a single conditional write on the backing store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::errors::AppError;
use crate::models::AccessToken;
use crate::store::{ConsumeOutcome, GoalStore, TokenStore};

const TOKEN_PREFIX: &str = "sata_v1_";
const TOKEN_ID_BYTES: usize = 16;

/// Issues, verifies and revokes one-time goal-access tokens over injected
/// store implementations.
#[derive(Clone)]
pub struct AccessTokenService {
    goals: Arc<dyn GoalStore>,
    tokens: Arc<dyn TokenStore>,
}

impl AccessTokenService {
    pub fn new(goals: Arc<dyn GoalStore>, tokens: Arc<dyn TokenStore>) -> Self {
        Self { goals, tokens }
    }

    /// Issues a fresh token for `goal_id`. `ttl` of `None` means the token
    /// only dies by use; a non-positive `ttl` is rejected. The goal must
    /// exist — nothing is persisted otherwise.
    pub async fn generate(
        &self,
        goal_id: i64,
        ttl: Option<Duration>,
    ) -> Result<AccessToken, AppError> {
        if let Some(ttl) = ttl {
            if ttl <= Duration::zero() {
                return Err(AppError::InvalidInput("ttl must be positive".into()));
            }
        }
        if !self.goals.goal_exists(goal_id).await? {
            return Err(AppError::GoalNotFound);
        }

        let now = Utc::now();
        let token = AccessToken {
            token_id: new_token_id(),
            goal_id,
            issued_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            consumed: false,
            consumed_at: None,
        };
        self.tokens.insert_token(&token).await?;

        tracing::info!(goal_id, token_id = %token.token_id, "issued access token");
        Ok(token)
    }

    /// Redeems a token, returning the goal it grants access to. Succeeds at
    /// most once per token, ever; concurrent attempts race on the store's
    /// conditional write and all but one lose with `AlreadyUsed`.
    pub async fn verify(&self, token_id: &str) -> Result<i64, AppError> {
        if !has_token_shape(token_id) {
            return Err(AppError::InvalidInput("malformed access token".into()));
        }

        let Some(token) = self.tokens.get_token(token_id).await? else {
            return Err(AppError::TokenNotFound);
        };
        // The goal may have been deleted since issuance; deny without
        // burning the token.
        if !self.goals.goal_exists(token.goal_id).await? {
            return Err(AppError::GoalNotFound);
        }

        match self.tokens.consume_token(token_id, Utc::now()).await? {
            ConsumeOutcome::Consumed { goal_id } => {
                tracing::info!(goal_id, token_id, "access token redeemed");
                Ok(goal_id)
            }
            ConsumeOutcome::NotFound => Err(AppError::TokenNotFound),
            ConsumeOutcome::AlreadyUsed => Err(AppError::AlreadyUsed),
            ConsumeOutcome::Expired => Err(AppError::Expired),
        }
    }

    /// Owner-initiated invalidation: marks the token consumed without it
    /// ever granting access. Works on expired-but-unused tokens.
    pub async fn revoke(&self, token_id: &str) -> Result<(), AppError> {
        if !has_token_shape(token_id) {
            return Err(AppError::InvalidInput("malformed access token".into()));
        }

        match self.tokens.revoke_token(token_id, Utc::now()).await? {
            ConsumeOutcome::Consumed { goal_id } => {
                tracing::info!(goal_id, token_id, "access token revoked");
                Ok(())
            }
            ConsumeOutcome::NotFound => Err(AppError::TokenNotFound),
            ConsumeOutcome::AlreadyUsed | ConsumeOutcome::Expired => Err(AppError::AlreadyUsed),
        }
    }

    /// Administrative listing of every token issued for a goal.
    pub async fn list_for_goal(&self, goal_id: i64) -> Result<Vec<AccessToken>, AppError> {
        if !self.goals.goal_exists(goal_id).await? {
            return Err(AppError::GoalNotFound);
        }
        Ok(self.tokens.list_tokens_for_goal(goal_id).await?)
    }
}

/// Uniqueness holds by construction: 128 random bits from the OS CSPRNG.
fn new_token_id() -> String {
    let mut bytes = [0u8; TOKEN_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
}

/// Cheap shape check so garbage input is rejected before any store trip.
fn has_token_shape(token_id: &str) -> bool {
    match token_id.strip_prefix(TOKEN_PREFIX) {
        Some(rest) => {
            rest.len() == TOKEN_ID_BYTES * 2 && rest.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn service() -> (Arc<MemoryStore>, AccessTokenService) {
        let store = Arc::new(MemoryStore::new());
        let svc = AccessTokenService::new(store.clone(), store.clone());
        (store, svc)
    }

    #[test]
    fn token_ids_have_the_documented_shape() {
        let id = new_token_id();
        assert!(has_token_shape(&id), "generated id failed shape check: {}", id);
        assert!(!has_token_shape("sata_v1_short"));
        assert!(!has_token_shape("other_prefix_0123456789abcdef0123456789abcdef"));
        assert!(!has_token_shape(""));
    }

    #[test]
    fn token_ids_do_not_repeat() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(new_token_id()));
        }
    }

    #[tokio::test]
    async fn generate_for_unknown_goal_leaves_no_record() {
        let (store, svc) = service();
        let err = svc.generate(42, None).await.unwrap_err();
        assert!(matches!(err, AppError::GoalNotFound));
        assert_eq!(store.token_count(), 0);
    }

    #[tokio::test]
    async fn generate_rejects_non_positive_ttl() {
        let (store, svc) = service();
        let goal = store.add_goal("read", "one book a month");

        for bad in [Duration::zero(), Duration::seconds(-5)] {
            let err = svc.generate(goal.id, Some(bad)).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }
        assert_eq!(store.token_count(), 0);
    }

    #[tokio::test]
    async fn verify_succeeds_once_then_conflicts() {
        let (store, svc) = service();
        let goal = store.add_goal("save", "3 months of expenses");
        let token = svc.generate(goal.id, Some(Duration::hours(1))).await.unwrap();

        assert_eq!(svc.verify(&token.token_id).await.unwrap(), goal.id);
        let err = svc.verify(&token.token_id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyUsed));
    }

    #[tokio::test]
    async fn verify_rejects_unknown_and_malformed_ids() {
        let (_, svc) = service();

        let unknown = new_token_id();
        assert!(matches!(
            svc.verify(&unknown).await.unwrap_err(),
            AppError::TokenNotFound
        ));
        assert!(matches!(
            svc.verify("not-a-token").await.unwrap_err(),
            AppError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn verify_fails_once_the_goal_is_gone() {
        let (store, svc) = service();
        let goal = store.add_goal("write", "a short story");
        let token = svc.generate(goal.id, None).await.unwrap();

        store.remove_goal(goal.id);
        let err = svc.verify(&token.token_id).await.unwrap_err();
        // The cascade drops the token with the goal, so the id is unknown.
        assert!(matches!(
            err,
            AppError::TokenNotFound | AppError::GoalNotFound
        ));
    }

    #[tokio::test]
    async fn expired_token_is_denied_with_expired() {
        let (store, svc) = service();
        let goal = store.add_goal("swim", "twice a week");
        let token = svc.generate(goal.id, Some(Duration::hours(1))).await.unwrap();

        // Back-date the deadline instead of sleeping.
        let mut stale = token.clone();
        stale.expires_at = Some(Utc::now() - Duration::seconds(1));
        store.insert_token(&stale).await.unwrap();

        let err = svc.verify(&token.token_id).await.unwrap_err();
        assert!(matches!(err, AppError::Expired));
    }

    #[tokio::test]
    async fn revoked_token_never_grants_access() {
        let (store, svc) = service();
        let goal = store.add_goal("climb", "first outdoor lead");
        let token = svc.generate(goal.id, None).await.unwrap();

        svc.revoke(&token.token_id).await.unwrap();
        assert!(matches!(
            svc.verify(&token.token_id).await.unwrap_err(),
            AppError::AlreadyUsed
        ));
        // Revoking twice is a conflict, not a success.
        assert!(matches!(
            svc.revoke(&token.token_id).await.unwrap_err(),
            AppError::AlreadyUsed
        ));
    }

    #[tokio::test]
    async fn revoke_works_on_expired_tokens() {
        let (store, svc) = service();
        let goal = store.add_goal("cook", "learn five new dishes");
        let token = svc.generate(goal.id, Some(Duration::hours(1))).await.unwrap();

        let mut stale = token.clone();
        stale.expires_at = Some(Utc::now() - Duration::seconds(1));
        store.insert_token(&stale).await.unwrap();

        svc.revoke(&token.token_id).await.unwrap();
    }

    #[tokio::test]
    async fn list_for_goal_sees_only_that_goals_tokens() {
        let (store, svc) = service();
        let a = store.add_goal("a", "first");
        let b = store.add_goal("b", "second");
        let t1 = svc.generate(a.id, None).await.unwrap();
        let _t2 = svc.generate(b.id, None).await.unwrap();

        let listed = svc.list_for_goal(a.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].token_id, t1.token_id);

        assert!(matches!(
            svc.list_for_goal(999).await.unwrap_err(),
            AppError::GoalNotFound
        ));
    }
}
