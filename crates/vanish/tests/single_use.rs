//! Single-use under concurrent duplicate requests.

use std::sync::Arc;
use std::time::Duration;

use vanish::store::ShareStore;
use vanish::{KdfParams, ShareError, ShareStatus};
use vanish_testkit::{test_config, TestEngine};

const PASSWORD: &str = "correcthorse1";

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_duplicates_yield_one_success() {
    for round in 0..10 {
        let t = Arc::new(TestEngine::new());
        let share = t.share(b"only once", PASSWORD, None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let t = t.clone();
            let id = share.share_id;
            handles.push(tokio::spawn(async move {
                t.engine.access_share(&id, PASSWORD).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(opened) => {
                    assert_eq!(&opened.plaintext[..], b"only once");
                    successes += 1;
                }
                Err(ShareError::NotFound) => {}
                Err(other) => panic!("round {}: unexpected {:?}", round, other),
            }
        }

        assert_eq!(successes, 1, "round {}", round);
        assert_eq!(
            t.status(&share.share_id).await.unwrap(),
            Some(ShareStatus::Consumed)
        );
        assert!(t.content.is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_duplicate_burst_beyond_budget_still_one_success() {
    let t = Arc::new(TestEngine::new());
    let share = t.share(b"only once", PASSWORD, None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let t = t.clone();
        let id = share.share_id;
        handles.push(tokio::spawn(async move {
            t.engine.access_share(&id, PASSWORD).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            // In-flight attempts past the budget are refused as locked.
            Err(ShareError::NotFound | ShareError::Locked) => {}
            Err(other) => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(successes, 1);
    assert!(!t.holds_secrets(&share.share_id).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_passwords_at_most_one_success() {
    let t = Arc::new(TestEngine::new());
    let share = t.share(b"payload", PASSWORD, None).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let t = t.clone();
        let id = share.share_id;
        let password = if i % 2 == 0 { PASSWORD } else { "not-the-password" };
        handles.push(tokio::spawn(async move {
            t.engine.access_share(&id, password).await.is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dropped_access_leaves_share_intact() {
    let mut config = test_config();
    config.workers = 1;
    config.kdf = KdfParams {
        m_cost_kib: 64 * 1024,
        t_cost: 4,
        p_cost: 1,
    };
    let t = Arc::new(TestEngine::with_config(config));
    let share = t.share(b"payload", PASSWORD, None).await.unwrap();
    let id = share.share_id;

    // Holds the only worker.
    let busy = {
        let t = t.clone();
        tokio::spawn(async move { t.engine.access_share(&id, "not-the-password").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Queues behind it with the right password, then goes away.
    let dropped = {
        let t = t.clone();
        tokio::spawn(async move { t.engine.access_share(&id, PASSWORD).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    dropped.abort();
    assert!(dropped.await.unwrap_err().is_cancelled());

    assert!(matches!(
        busy.await.unwrap(),
        Err(ShareError::AuthenticationFailed)
    ));

    let record = t.engine.store().get(&id).await.unwrap().unwrap();
    assert_eq!(record.status, ShareStatus::Active);
    assert!(record.holds_secrets());
    // The dropped attempt may or may not have been charged before it went.
    assert!((1..=2).contains(&record.failed_attempts));
    assert_eq!(t.engine.scheduler().pending(), 1);
    assert_eq!(t.content.len(), 1);

    let opened = t.engine.access_share(&id, PASSWORD).await.unwrap();
    assert_eq!(&opened.plaintext[..], b"payload");
}
