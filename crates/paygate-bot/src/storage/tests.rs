//! Storage layer tests for the `Paygate` bot.

#![allow(clippy::unwrap_used)]

use super::db::Database;
use super::queries::ADMIN_BLOCK_MARKER;
use super::queries_codes::NewCode;

async fn test_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

fn new_code<'a>(code: &'a str, session_id: &'a str, user_id: i64, expires_at: i64) -> NewCode<'a> {
    NewCode {
        code,
        user_id,
        session_id,
        tariff: "1 час",
        duration_minutes: 60,
        created_at: expires_at - 3600,
        expires_at,
    }
}

// === Ledger tests ===

#[tokio::test]
async fn claim_transaction_once() {
    let db = test_db().await;

    assert!(!db.transaction_exists("98765").await.unwrap());
    assert!(db.claim_transaction("98765", 1, 100).await.unwrap());
    assert!(db.transaction_exists("98765").await.unwrap());

    // A second claim, even by the same user, loses.
    assert!(!db.claim_transaction("98765", 1, 200).await.unwrap());
    assert!(!db.claim_transaction("98765", 2, 300).await.unwrap());

    let record = db.get_transaction("98765").await.unwrap();
    assert_eq!(record.user_id, 1);
    assert_eq!(record.used_at, 100);
}

#[tokio::test]
async fn upsert_transaction_retouches() {
    let db = test_db().await;

    db.upsert_transaction("555", 1, 100).await.unwrap();
    db.upsert_transaction("555", 2, 250).await.unwrap();

    let record = db.get_transaction("555").await.unwrap();
    assert_eq!(record.user_id, 2);
    assert_eq!(record.used_at, 250);
}

#[tokio::test]
async fn has_transaction_since_window() {
    let db = test_db().await;
    db.claim_transaction("1", 7, 1_000).await.unwrap();

    assert!(db.has_transaction_since(7, 1_000).await.unwrap());
    assert!(!db.has_transaction_since(7, 1_001).await.unwrap());
    assert!(!db.has_transaction_since(8, 0).await.unwrap());
}

// === Suspicious receipt tests ===

#[tokio::test]
async fn suspicious_counter_is_per_file_name() {
    let db = test_db().await;

    assert_eq!(db.increment_suspicious(1, Some("ann"), "a.pdf").await.unwrap(), 1);
    assert_eq!(db.increment_suspicious(1, Some("ann"), "a.pdf").await.unwrap(), 2);
    assert_eq!(db.increment_suspicious(1, Some("ann"), "b.pdf").await.unwrap(), 1);
    assert_eq!(db.increment_suspicious(2, None, "a.pdf").await.unwrap(), 1);

    let records = db.list_suspicious(1).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.is_blocked == 0));
}

#[tokio::test]
async fn block_flag_is_user_scoped() {
    let db = test_db().await;
    db.increment_suspicious(1, None, "a.pdf").await.unwrap();
    db.increment_suspicious(1, None, "b.pdf").await.unwrap();
    db.increment_suspicious(2, None, "a.pdf").await.unwrap();

    db.block_user(1).await.unwrap();

    assert!(db.is_user_blocked(1).await.unwrap());
    assert!(!db.is_user_blocked(2).await.unwrap());
    assert!(db.list_suspicious(1).await.unwrap().iter().all(|r| r.is_blocked == 1));
    assert_eq!(db.count_blocked_users().await.unwrap(), 1);
}

#[tokio::test]
async fn admin_block_without_history_uses_marker() {
    let db = test_db().await;
    db.block_user(9).await.unwrap();
    db.block_user(9).await.unwrap();

    let records = db.list_suspicious(9).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_name, ADMIN_BLOCK_MARKER);
    assert!(db.is_user_blocked(9).await.unwrap());
}

#[tokio::test]
async fn unblock_clears_flag_and_counters() {
    let db = test_db().await;
    db.increment_suspicious(1, None, "a.pdf").await.unwrap();
    db.increment_suspicious(1, None, "a.pdf").await.unwrap();
    db.block_user(1).await.unwrap();

    assert!(db.unblock_user(1).await.unwrap());
    assert!(!db.is_user_blocked(1).await.unwrap());
    assert_eq!(db.increment_suspicious(1, None, "a.pdf").await.unwrap(), 1);

    assert!(!db.unblock_user(42).await.unwrap());
}

// === Code tests ===

#[tokio::test]
async fn insert_and_list_codes() {
    let db = test_db().await;
    db.insert_code(&new_code("aaaa0001", "s1", 1, 5_000)).await.unwrap();
    db.insert_code(&new_code("aaaa0002", "s2", 1, 9_000)).await.unwrap();
    db.insert_code(&new_code("aaaa0003", "s3", 2, 9_000)).await.unwrap();

    let codes = db.list_codes(1).await.unwrap();
    assert_eq!(codes.len(), 2);
    assert_eq!(codes[0].code, "aaaa0002");
    assert!(db.user_has_codes(1).await.unwrap());
    assert!(!db.user_has_codes(3).await.unwrap());
}

#[tokio::test]
async fn duplicate_code_value_is_rejected() {
    let db = test_db().await;
    db.insert_code(&new_code("dup", "s1", 1, 5_000)).await.unwrap();
    assert!(db.insert_code(&new_code("dup", "s2", 2, 5_000)).await.is_err());
    assert!(db.insert_code(&new_code("other", "s1", 2, 5_000)).await.is_err());
}

#[tokio::test]
async fn first_code_only_once() {
    let db = test_db().await;
    let first = db.insert_first_code(&new_code("c1", "s1", 1, 5_000)).await.unwrap();
    assert!(first.is_some());

    let second = db.insert_first_code(&new_code("c2", "s2", 1, 5_000)).await.unwrap();
    assert!(second.is_none());
    assert_eq!(db.list_codes(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn latest_active_code_respects_expiry() {
    let db = test_db().await;
    db.insert_code(&new_code("old", "s1", 1, 1_000)).await.unwrap();
    db.insert_code(&new_code("new", "s2", 1, 2_000)).await.unwrap();

    let active = db.latest_active_code(1, 1_500).await.unwrap().unwrap();
    assert_eq!(active.code, "new");
    assert!(db.latest_active_code(1, 2_000).await.unwrap().is_none());
}

// === Stats tests ===

#[tokio::test]
async fn touch_user_keeps_first_seen() {
    let db = test_db().await;
    db.touch_user(1).await.unwrap();
    let first = db.get_user_stats(1).await.unwrap();
    db.touch_user(1).await.unwrap();
    let second = db.get_user_stats(1).await.unwrap();

    assert_eq!(first.first_seen, second.first_seen);
    assert!(second.last_seen >= first.last_seen);

    let totals = db.user_totals(0).await.unwrap();
    assert_eq!(totals.total, 1);
    assert_eq!(totals.new_since, 1);
    assert_eq!(db.user_totals(i64::MAX).await.unwrap().new_since, 0);
}

#[tokio::test]
async fn payments_are_summed() {
    let db = test_db().await;
    assert_eq!(db.payments_since(0).await.unwrap().total_amount, 0);

    db.record_payment(1, 490, "1 час").await.unwrap();
    db.record_payment(2, 790, "2 часа").await.unwrap();

    let daily = db.payments_since(0).await.unwrap();
    assert_eq!(daily.count, 2);
    assert_eq!(daily.total_amount, 1280);
}

#[tokio::test]
async fn audit_logs_are_ordered() {
    let db = test_db().await;
    db.log_admin_action(10, "login").await.unwrap();
    db.log_admin_action(10, "block 5").await.unwrap();
    db.log_user_activity(5, "start").await.unwrap();

    assert_eq!(db.admin_actions(10).await.unwrap(), vec!["login", "block 5"]);
    assert_eq!(db.user_actions(5).await.unwrap(), vec!["start"]);
}
