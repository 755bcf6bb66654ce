//! Integration tests for the one-time access token lifecycle.
//!
//! These exercise the full service against the in-memory store:
//! 1. A fresh token verifies exactly once and hands back its goal
//! 2. Replays, expiry, unknown ids and dead goals are all denied
//! 3. Racing verifies on one token produce exactly one winner

use std::sync::Arc;

use chrono::Duration;
use sataplan::access::AccessTokenService;
use sataplan::errors::AppError;
use sataplan::store::memory::MemoryStore;

fn service() -> (Arc<MemoryStore>, AccessTokenService) {
    let store = Arc::new(MemoryStore::new());
    let svc = AccessTokenService::new(store.clone(), store.clone());
    (store, svc)
}

mod lifecycle_tests {
    use super::*;

    /// A token verified right after issuance (before expiry) succeeds and
    /// returns the goal it was issued for.
    #[tokio::test]
    async fn fresh_token_verifies_to_its_goal() {
        let (store, svc) = service();
        let goal = store.add_goal("run a marathon", "finish under 4 hours");

        let token = svc
            .generate(goal.id, Some(Duration::seconds(3600)))
            .await
            .unwrap();
        assert!(!token.consumed);
        assert!(token.expires_at.is_some());

        let verified_goal = svc.verify(&token.token_id).await.unwrap();
        assert_eq!(verified_goal, goal.id);
    }

    /// A second verify after a successful one fails with AlreadyUsed —
    /// the replay-prevention contract.
    #[tokio::test]
    async fn replay_is_rejected() {
        let (store, svc) = service();
        let goal = store.add_goal("meditate", "ten minutes daily");
        let token = svc.generate(goal.id, None).await.unwrap();

        svc.verify(&token.token_id).await.unwrap();
        for _ in 0..3 {
            let err = svc.verify(&token.token_id).await.unwrap_err();
            assert!(matches!(err, AppError::AlreadyUsed));
        }
    }

    /// Verifying a token id that was never issued fails with NotFound.
    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let (store, svc) = service();
        store.add_goal("sleep", "eight hours a night");

        let err = svc
            .verify("sata_v1_00000000000000000000000000000000")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TokenNotFound));
    }

    /// Issuing against a goal that does not exist fails and leaves no
    /// token record behind.
    #[tokio::test]
    async fn generate_for_missing_goal_creates_nothing() {
        let (store, svc) = service();

        let err = svc.generate(12345, Some(Duration::seconds(60))).await.unwrap_err();
        assert!(matches!(err, AppError::GoalNotFound));
        assert_eq!(store.token_count(), 0);
    }

    /// Deleting the goal after issuance kills the token with it.
    #[tokio::test]
    async fn deleting_the_goal_invalidates_outstanding_tokens() {
        let (store, svc) = service();
        let goal = store.add_goal("travel", "visit three new countries");
        let token = svc.generate(goal.id, None).await.unwrap();

        store.remove_goal(goal.id);
        let err = svc.verify(&token.token_id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::TokenNotFound | AppError::GoalNotFound
        ));
    }

    /// The worked example: generate with an hour of ttl, verify once,
    /// verify again.
    #[tokio::test]
    async fn documented_scenario_plays_out() {
        let (store, svc) = service();
        let goal = store.add_goal("goal 42", "the documented example");

        let token = svc
            .generate(goal.id, Some(Duration::seconds(3600)))
            .await
            .unwrap();

        assert_eq!(svc.verify(&token.token_id).await.unwrap(), goal.id);

        let stored = sataplan::store::TokenStore::get_token(store.as_ref(), &token.token_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.consumed);
        assert!(stored.consumed_at.is_some());

        assert!(matches!(
            svc.verify(&token.token_id).await.unwrap_err(),
            AppError::AlreadyUsed
        ));
    }

    /// Retried generates are independent: each call issues a distinct
    /// token and all of them are live.
    #[tokio::test]
    async fn repeated_generate_issues_independent_tokens() {
        let (store, svc) = service();
        let goal = store.add_goal("practice", "thirty minutes of piano");

        let a = svc.generate(goal.id, None).await.unwrap();
        let b = svc.generate(goal.id, None).await.unwrap();
        assert_ne!(a.token_id, b.token_id);

        assert_eq!(svc.verify(&b.token_id).await.unwrap(), goal.id);
        assert_eq!(svc.verify(&a.token_id).await.unwrap(), goal.id);
    }
}

mod expiry_tests {
    use super::*;

    /// A token with ttl = 1 second is Expired two seconds later, even
    /// though it was never consumed.
    #[tokio::test]
    async fn short_ttl_expires_on_the_wall_clock() {
        let (store, svc) = service();
        let goal = store.add_goal("stretch", "every morning");
        let token = svc
            .generate(goal.id, Some(Duration::seconds(1)))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;

        let err = svc.verify(&token.token_id).await.unwrap_err();
        assert!(matches!(err, AppError::Expired));

        // Expiry denial must not burn the token's consumed flag.
        let stored = sataplan::store::TokenStore::get_token(store.as_ref(), &token.token_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.consumed);
    }

    /// Tokens issued without a ttl never time out.
    #[tokio::test]
    async fn no_ttl_means_no_time_expiry() {
        let (store, svc) = service();
        let goal = store.add_goal("draw", "one sketch a week");
        let token = svc.generate(goal.id, None).await.unwrap();
        assert!(token.expires_at.is_none());

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert_eq!(svc.verify(&token.token_id).await.unwrap(), goal.id);
    }
}

mod concurrency_tests {
    use super::*;

    /// Two simultaneous verifies on one token: exactly one succeeds, the
    /// other sees AlreadyUsed. Never two successes.
    #[tokio::test]
    async fn two_racing_verifies_have_one_winner() {
        let (store, svc) = service();
        let goal = store.add_goal("race", "the contested goal");
        let token = svc.generate(goal.id, None).await.unwrap();

        let (svc_a, svc_b) = (svc.clone(), svc.clone());
        let (id_a, id_b) = (token.token_id.clone(), token.token_id.clone());
        let a = tokio::spawn(async move { svc_a.verify(&id_a).await });
        let b = tokio::spawn(async move { svc_b.verify(&id_b).await });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let replays = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::AlreadyUsed)))
            .count();

        assert_eq!(wins, 1, "exactly one verify may succeed");
        assert_eq!(replays, 1, "the loser must see AlreadyUsed");
    }

    /// Same property under a wider fan-out.
    #[tokio::test]
    async fn many_racing_verifies_still_have_one_winner() {
        let (store, svc) = service();
        let goal = store.add_goal("storm", "heavily contested goal");
        let token = svc.generate(goal.id, None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let svc = svc.clone();
            let id = token.token_id.clone();
            handles.push(tokio::spawn(async move { svc.verify(&id).await }));
        }

        let mut wins = 0;
        let mut replays = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(goal_id) => {
                    assert_eq!(goal_id, goal.id);
                    wins += 1;
                }
                Err(AppError::AlreadyUsed) => replays += 1,
                Err(other) => panic!("unexpected error under contention: {other}"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(replays, 15);
    }

    /// Revocation races like verification: a revoked token cannot win a
    /// concurrent verify.
    #[tokio::test]
    async fn revoke_and_verify_race_resolves_to_one_writer() {
        let (store, svc) = service();
        let goal = store.add_goal("cancel", "owner pulls the plug");
        let token = svc.generate(goal.id, None).await.unwrap();

        let (svc_a, svc_b) = (svc.clone(), svc.clone());
        let (id_a, id_b) = (token.token_id.clone(), token.token_id.clone());
        let verify = tokio::spawn(async move { svc_a.verify(&id_a).await.map(|_| ()) });
        let revoke = tokio::spawn(async move { svc_b.revoke(&id_b).await });

        let outcomes = [verify.await.unwrap(), revoke.await.unwrap()];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "verify and revoke cannot both claim the token");
    }
}
