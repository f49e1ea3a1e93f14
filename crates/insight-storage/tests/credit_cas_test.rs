//! Credit primitives: the debit CAS and unconditional credit.
//!
//! Covers linearizability of concurrent debits, the no-negative-credits
//! invariant, and post-image reporting.

use std::sync::Arc;

use insight_core::models::User;
use insight_storage::StorageEngine;

// ─── Fixtures ────────────────────────────────────────────────────────────────

async fn engine_with_user(id: &str, credits: i64) -> (Arc<StorageEngine>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("insight_test.db");
    let engine = StorageEngine::open(&path, 2).unwrap();
    engine
        .insert_user(&User::new(id, "hash", credits))
        .await
        .unwrap();
    (Arc::new(engine), dir)
}

#[tokio::test]
async fn debit_returns_post_image() {
    let (engine, _dir) = engine_with_user("alice", 10).await;

    let user = engine.debit_credits("alice", 3).await.unwrap().unwrap();
    assert_eq!(user.credits, 7);

    let reread = engine.find_user("alice").await.unwrap().unwrap();
    assert_eq!(reread.credits, 7);
}

#[tokio::test]
async fn debit_fails_when_insufficient() {
    let (engine, _dir) = engine_with_user("bob", 2).await;

    let outcome = engine.debit_credits("bob", 5).await.unwrap();
    assert!(outcome.is_none());

    // Balance untouched by the failed CAS.
    let user = engine.find_user("bob").await.unwrap().unwrap();
    assert_eq!(user.credits, 2);
}

#[tokio::test]
async fn debit_unknown_user_is_none() {
    let (engine, _dir) = engine_with_user("carol", 5).await;
    assert!(engine.debit_credits("nobody", 1).await.unwrap().is_none());
}

#[tokio::test]
async fn credit_is_unconditional() {
    let (engine, _dir) = engine_with_user("dave", 0).await;

    assert!(engine.credit_credits("dave", 4).await.unwrap());
    let user = engine.find_user("dave").await.unwrap().unwrap();
    assert_eq!(user.credits, 4);

    assert!(!engine.credit_credits("nobody", 4).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_linearize_on_credits() {
    // Ten concurrent debits of 3 against a balance of 5: exactly one can
    // win, and the balance never goes negative.
    let (engine, _dir) = engine_with_user("eve", 5).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let eng = Arc::clone(&engine);
            tokio::spawn(async move { eng.debit_credits("eve", 3).await.unwrap() })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1, "exactly one debit of 3 fits in 5 credits");
    let user = engine.find_user("eve").await.unwrap().unwrap();
    assert_eq!(user.credits, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mixed_debits_never_go_negative() {
    let (engine, _dir) = engine_with_user("frank", 10).await;

    let costs = [4_i64, 4, 4, 3, 3, 2, 2, 1, 1, 1];
    let handles: Vec<_> = costs
        .iter()
        .map(|&cost| {
            let eng = Arc::clone(&engine);
            tokio::spawn(async move {
                eng.debit_credits("frank", cost)
                    .await
                    .unwrap()
                    .map(|_| cost)
            })
        })
        .collect();

    let mut debited_total = 0;
    for handle in handles {
        if let Some(cost) = handle.await.unwrap() {
            debited_total += cost;
        }
    }

    let user = engine.find_user("frank").await.unwrap().unwrap();
    assert!(user.credits >= 0, "credits must never go negative");
    assert_eq!(user.credits, 10 - debited_total);
}
