#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Integration tests use unwrap for brevity

//! End-to-end tests driving the bot through its event entry point.
//!
//! Verifies that `Bot` correctly wires together:
//! - Router and block checks
//! - Receipt pipeline (validation, ledger claim, anti-fraud tracking)
//! - Access-code issuance and session queries
//! - Administrator panel

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use paygate_core::Config;
use paygate_core::config::PaymentConfig;
use paygate_core::ndjson::{Document, EventKind, InboundEvent, Keyboard, Reply};

use paygate_bot::bot::{Bot, BotDeps};
use paygate_bot::clock::FixedClock;
use paygate_bot::notify::Notifier;
use paygate_bot::receipt::TextExtractor;
use paygate_bot::storage::Database;
use paygate_bot::texts;
use paygate_bot::transport::RecordingTransport;

const RECIPIENT: &str = "IVAN IVANOV";
const ADMIN_ID: i64 = 7;
const ADMIN_PASSWORD: &str = "s3cret";

/// Treats the document bytes as the receipt text.
struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// 2025-03-10 12:00 at +05:00.
fn now() -> DateTime<Utc> {
    FixedOffset::east_opt(5 * 3600)
        .unwrap()
        .with_ymd_and_hms(2025, 3, 10, 12, 0, 0)
        .unwrap()
        .with_timezone(&Utc)
}

struct Harness {
    bot: Bot,
    db: Database,
    transport: RecordingTransport,
    clock: FixedClock,
}

async fn harness() -> Harness {
    let db = Database::open_in_memory().await.unwrap();
    let transport = RecordingTransport::new();
    let clock = FixedClock::at(now());

    let mut config = Config::default();
    config.payment = PaymentConfig {
        card_number: "4400 0000 0000 0001".to_string(),
        card_name: "IVAN I.".to_string(),
        recipient_name: RECIPIENT.to_string(),
        ..PaymentConfig::default()
    };
    config.admin.admin_ids = vec![ADMIN_ID];
    config.admin.password = ADMIN_PASSWORD.to_string();
    config.webhook.base_url = None;

    let bot = Bot::new(
        &config,
        BotDeps {
            db: db.clone(),
            transport: Arc::new(transport.clone()),
            notifier: Notifier::disabled(),
            extractor: Arc::new(PlainTextExtractor),
            clock: Arc::new(clock.clone()),
        },
    );

    Harness {
        bot,
        db,
        transport,
        clock,
    }
}

fn text(user_id: i64, text: &str) -> InboundEvent {
    InboundEvent::new(
        user_id,
        EventKind::Text {
            text: text.to_string(),
        },
    )
}

fn command(user_id: i64, name: &str) -> InboundEvent {
    InboundEvent::new(
        user_id,
        EventKind::Command {
            name: name.to_string(),
        },
    )
}

fn select(user_id: i64, tariff: &str) -> InboundEvent {
    InboundEvent::new(
        user_id,
        EventKind::Callback {
            data: format!("{}{tariff}", texts::TARIFF_CALLBACK_PREFIX),
        },
    )
}

fn upload(user_id: i64, file_name: &str, body: &str) -> InboundEvent {
    InboundEvent::new(
        user_id,
        EventKind::Document(Document {
            file_name: file_name.to_string(),
            mime_type: "application/pdf".to_string(),
            size: body.len() as u64,
            data: body.as_bytes().to_vec(),
        }),
    )
}

fn receipt(amount: &str, time: &str, transaction_id: &str) -> String {
    format!(
        "Перевод по номеру карты\nСумма: {amount}\nПолучатель: {RECIPIENT}\n\
         Дата: {time}\nКвитанция № {transaction_id}"
    )
}

fn issued_code(replies: &[Reply]) -> Option<&Reply> {
    replies
        .iter()
        .find(|r| r.html && r.text.starts_with("✅ Ваш код доступа"))
}

fn inline_labels(reply: &Reply) -> Vec<String> {
    match &reply.keyboard {
        Some(Keyboard::Inline { buttons }) => buttons.iter().map(|b| b.data.clone()).collect(),
        other => panic!("expected inline keyboard, got {other:?}"),
    }
}

#[tokio::test]
async fn paid_receipt_issues_code_end_to_end() {
    let h = harness().await;

    h.bot.handle(InboundEvent::new(1, EventKind::Start)).await;
    h.bot.handle(select(1, "1 час")).await;
    let replies = h.transport.take().await;
    assert_eq!(replies[0].text, texts::WELCOME);
    assert!(replies[1].text.contains("4400 0000 0000 0001"));

    h.bot
        .handle(upload(
            1,
            "receipt_55501.pdf",
            &receipt("490,00", "10.03.2025 11:50", "55501"),
        ))
        .await;
    let replies = h.transport.take().await;
    assert_eq!(replies[0].text, texts::PROCESSING);
    let code = issued_code(&replies).expect("code reply");
    assert!(code.text.contains("1 час"));

    let payments = h.db.payments_since(0).await.unwrap();
    assert_eq!(payments.count, 1);
    assert_eq!(payments.total_amount, 490);

    // The consumed receipt lets /checkpayment show the active code.
    h.bot.handle(select(1, "1 час")).await;
    h.bot.handle(command(1, "checkpayment")).await;
    let replies = h.transport.take().await;
    let active = replies.last().unwrap();
    assert!(active.html);
    assert!(active.text.contains("Действует до: 10.03.2025 13:00"));

    h.bot.handle(text(1, texts::BTN_MY_SESSIONS)).await;
    let sessions = h.transport.take().await;
    assert!(sessions[0].text.contains("🟢 60 мин."));
}

#[tokio::test]
async fn checkpayment_without_recent_receipt_reports_not_found() {
    let h = harness().await;

    h.bot.handle(command(1, "checkpayment")).await;
    h.bot.handle(select(1, "1 час")).await;
    h.bot.handle(command(1, "checkpayment")).await;

    let texts_sent = h.transport.texts().await;
    assert_eq!(texts_sent[0], texts::SELECT_TARIFF_FIRST);
    assert_eq!(texts_sent.last().unwrap(), texts::RECEIPT_NOT_FOUND);
}

#[tokio::test]
async fn reused_receipt_is_rejected() {
    let h = harness().await;
    let body = receipt("490 тенге", "10.03.2025 11:55", "77001");

    h.bot.handle(select(1, "1 час")).await;
    h.bot.handle(upload(1, "r_77001.pdf", &body)).await;
    assert!(issued_code(&h.transport.take().await).is_some());

    h.bot.handle(select(1, "1 час")).await;
    h.bot.handle(upload(1, "r_77001.pdf", &body)).await;
    let replies = h.transport.take().await;
    assert!(issued_code(&replies).is_none());
    assert!(
        replies
            .last()
            .unwrap()
            .text
            .starts_with("❌ Этот чек уже был использован")
    );
}

#[tokio::test]
async fn concurrent_submissions_of_one_receipt_issue_one_code() {
    let h = harness().await;
    let body = receipt("490.00", "10.03.2025 11:58", "90210");

    h.bot.handle(select(1, "1 час")).await;
    h.bot.handle(select(2, "1 час")).await;
    h.transport.take().await;

    let (first, second) = (h.bot.clone(), h.bot.clone());
    tokio::join!(
        first.handle(upload(1, "check_90210.pdf", &body)),
        second.handle(upload(2, "check_90210.pdf", &body)),
    );

    let replies = h.transport.take().await;
    let codes = replies
        .iter()
        .filter(|r| r.html && r.text.starts_with("✅ Ваш код доступа"))
        .count();
    assert_eq!(codes, 1);

    let record = h.db.get_transaction("90210").await.unwrap();
    assert!([1, 2].contains(&record.user_id));
}

#[tokio::test]
async fn repeated_failures_block_the_user() {
    let h = harness().await;
    // Wrong amount for the selected tariff.
    let body = receipt("100,00", "10.03.2025 11:50", "31337");

    h.bot.handle(select(5, "1 час")).await;
    for _ in 0..2 {
        h.bot.handle(upload(5, "fake_31337.pdf", &body)).await;
    }
    let replies = h.transport.take().await;
    assert!(
        replies
            .last()
            .unwrap()
            .text
            .starts_with("❌ Сумма в чеке не соответствует тарифу (490₸)")
    );

    h.bot.handle(upload(5, "fake_31337.pdf", &body)).await;
    let replies = h.transport.take().await;
    assert_eq!(replies.last().unwrap().text, texts::BLOCKED_FOR_SUSPICIOUS);

    // Blocked before any parsing, and on guarded routes.
    h.bot.handle(upload(5, "other_1.pdf", &body)).await;
    h.bot.handle(InboundEvent::new(5, EventKind::Start)).await;
    assert_eq!(
        h.transport.texts().await,
        vec![texts::BLOCKED.to_string(), texts::BLOCKED.to_string()]
    );

    // Other users are unaffected.
    h.bot.handle(InboundEvent::new(6, EventKind::Start)).await;
    assert_eq!(h.transport.texts().await.last().unwrap(), texts::WELCOME);
}

#[tokio::test]
async fn stale_receipt_is_rejected_with_checklist() {
    let h = harness().await;
    let body = receipt("490,00", "10.03.2025 11:50", "4242");

    h.bot.handle(select(1, "1 час")).await;
    h.clock.advance_secs(30 * 60);
    h.bot.handle(upload(1, "r4242.pdf", &body)).await;

    let last = h.transport.take().await.pop().unwrap();
    assert!(last.text.starts_with("❌ Чек слишком старый (более 25 минут)"));
    assert!(last.text.contains(&format!("3. Получатель: {RECIPIENT}")));
}

#[tokio::test]
async fn document_gates_run_before_parsing() {
    let h = harness().await;

    h.bot.handle(upload(1, "r1.pdf", "irrelevant")).await;

    h.bot.handle(select(1, "1 час")).await;
    let mut image = upload(1, "r1.png", "irrelevant");
    if let EventKind::Document(doc) = &mut image.kind {
        doc.mime_type = "image/png".to_string();
    }
    h.bot.handle(image).await;

    let mut huge = upload(1, "r1.pdf", "irrelevant");
    if let EventKind::Document(doc) = &mut huge.kind {
        doc.size = 10 * 1024 * 1024;
    }
    h.bot.handle(huge).await;

    let texts_sent = h.transport.texts().await;
    assert_eq!(texts_sent[0], texts::SELECT_TARIFF_FIRST);
    assert_eq!(texts_sent[2], texts::PDF_REQUIRED);
    assert_eq!(texts_sent[3], texts::document_too_large(3 * 1024 * 1024));
    assert!(h.db.user_actions(1).await.unwrap().iter().all(|a| a != "receipt_uploaded"));
}

#[tokio::test]
async fn free_tariff_is_granted_once() {
    let h = harness().await;

    h.bot.handle(text(3, texts::BTN_CHOOSE_TARIFF)).await;
    let offered = h.transport.take().await;
    assert_eq!(
        inline_labels(&offered[0]),
        vec!["tariff_2 минуты", "tariff_1 час", "tariff_2 часа"]
    );

    h.bot.handle(select(3, "2 минуты")).await;
    assert!(issued_code(&h.transport.take().await).is_some());

    h.bot.handle(select(3, "2 минуты")).await;
    assert_eq!(h.transport.texts().await.last().unwrap(), texts::FREE_TIER_USED);
    h.transport.take().await;

    // No longer a new user: the free tariff is not offered.
    h.bot.handle(text(3, texts::BTN_CHOOSE_TARIFF)).await;
    let offered = h.transport.take().await;
    assert_eq!(
        inline_labels(&offered[0]),
        vec!["tariff_1 час", "tariff_2 часа"]
    );
}

#[tokio::test]
async fn free_tariff_cannot_be_paid_by_receipt() {
    let h = harness().await;
    let body = format!("{RECIPIENT}\n10.03.2025 11:55\n11111");

    h.bot.handle(select(3, "2 минуты")).await;
    h.bot.handle(upload(3, "r_11111.pdf", &body)).await;
    // A refused free selection leaves nothing to pay for either.
    h.bot.handle(select(3, "2 минуты")).await;
    h.bot.handle(upload(3, "r_11111.pdf", &body)).await;

    let texts_sent = h.transport.texts().await;
    assert_eq!(texts_sent[1], texts::SELECT_TARIFF_FIRST);
    assert_eq!(texts_sent[2], texts::FREE_TIER_USED);
    assert_eq!(texts_sent[3], texts::SELECT_TARIFF_FIRST);
    assert_eq!(h.db.list_codes(3).await.unwrap().len(), 1);
    assert_eq!(h.db.payments_since(0).await.unwrap().count, 0);
    assert!(h.db.get_transaction("11111").await.is_err());
}

#[tokio::test]
async fn free_selection_replaces_priced_one() {
    let h = harness().await;

    h.bot.handle(select(3, "1 час")).await;
    h.bot.handle(select(3, "2 минуты")).await;
    h.bot
        .handle(upload(
            3,
            "receipt_60001.pdf",
            &receipt("490,00", "10.03.2025 11:50", "60001"),
        ))
        .await;

    assert_eq!(h.transport.texts().await.last().unwrap(), texts::SELECT_TARIFF_FIRST);
    assert_eq!(h.db.list_codes(3).await.unwrap().len(), 1);
}

#[tokio::test]
async fn block_check_failure_refuses_the_event() {
    let h = harness().await;
    h.bot.handle(select(1, "1 час")).await;
    h.transport.take().await;

    sqlx::query("DROP TABLE suspicious_receipts")
        .execute(h.db.pool())
        .await
        .unwrap();

    h.bot.handle(select(1, "1 час")).await;
    h.bot
        .handle(upload(
            1,
            "receipt_55501.pdf",
            &receipt("490,00", "10.03.2025 11:50", "55501"),
        ))
        .await;

    assert_eq!(
        h.transport.texts().await,
        vec![texts::GENERIC_ERROR.to_string(), texts::RETRY.to_string()]
    );
    assert!(h.db.get_transaction("55501").await.is_err());
    assert!(h.db.list_codes(1).await.unwrap().is_empty());
    assert!(
        h.db.user_actions(1)
            .await
            .unwrap()
            .iter()
            .all(|a| a != "receipt_uploaded")
    );
}

#[tokio::test]
async fn failures_count_without_activity_log() {
    let h = harness().await;
    let body = receipt("100,00", "10.03.2025 11:50", "31337");

    h.bot.handle(select(5, "1 час")).await;
    sqlx::query("DROP TABLE user_activity")
        .execute(h.db.pool())
        .await
        .unwrap();

    for _ in 0..3 {
        h.bot.handle(upload(5, "fake_31337.pdf", &body)).await;
    }

    assert_eq!(
        h.transport.texts().await.last().unwrap(),
        texts::BLOCKED_FOR_SUSPICIOUS
    );
}

#[tokio::test]
async fn code_is_delivered_when_payment_log_fails() {
    let h = harness().await;

    h.bot.handle(select(1, "1 час")).await;
    sqlx::query("DROP TABLE payments")
        .execute(h.db.pool())
        .await
        .unwrap();

    h.bot
        .handle(upload(
            1,
            "receipt_55501.pdf",
            &receipt("490,00", "10.03.2025 11:50", "55501"),
        ))
        .await;
    assert!(issued_code(&h.transport.take().await).is_some());
    assert_eq!(h.db.list_codes(1).await.unwrap().len(), 1);

    // The accepted receipt consumed the selection.
    h.bot
        .handle(upload(
            1,
            "receipt_55502.pdf",
            &receipt("490,00", "10.03.2025 11:52", "55502"),
        ))
        .await;
    assert_eq!(h.transport.texts().await, vec![texts::SELECT_TARIFF_FIRST.to_string()]);
}

#[tokio::test]
async fn admin_login_and_price_edit() {
    let h = harness().await;

    h.bot.handle(command(ADMIN_ID, "admin")).await;
    h.bot.handle(text(ADMIN_ID, "wrong")).await;
    h.bot.handle(command(ADMIN_ID, "admin")).await;
    h.bot.handle(text(ADMIN_ID, ADMIN_PASSWORD)).await;
    h.bot.handle(text(ADMIN_ID, texts::BTN_ADMIN_EDIT_TARIFF)).await;
    h.bot.handle(text(ADMIN_ID, "no equals sign")).await;
    h.bot.handle(text(ADMIN_ID, "1 час=500")).await;

    assert_eq!(
        h.transport.texts().await,
        vec![
            texts::ADMIN_PASSWORD_PROMPT.to_string(),
            texts::ADMIN_WRONG_PASSWORD.to_string(),
            texts::ADMIN_PASSWORD_PROMPT.to_string(),
            texts::ADMIN_MENU.to_string(),
            texts::ADMIN_PROMPT_TARIFF.to_string(),
            texts::ADMIN_INVALID_INPUT.to_string(),
            texts::ADMIN_SAVED.to_string(),
        ]
    );
    assert_eq!(h.bot.payment().tariff("1 час").await.unwrap().price, 500);

    let actions = h.db.admin_actions(ADMIN_ID).await.unwrap();
    assert!(actions.iter().any(|a| a == "login_failed"));
    assert!(actions.iter().any(|a| a == "set_price:1 час=500"));
}

#[tokio::test]
async fn admin_blocks_and_unblocks_user() {
    let h = harness().await;

    h.bot.handle(command(ADMIN_ID, "admin")).await;
    h.bot.handle(text(ADMIN_ID, ADMIN_PASSWORD)).await;
    h.bot.handle(text(ADMIN_ID, texts::BTN_ADMIN_BLOCK)).await;
    h.bot.handle(text(ADMIN_ID, "42")).await;
    h.transport.take().await;

    h.bot.handle(InboundEvent::new(42, EventKind::Start)).await;
    assert_eq!(h.transport.take().await[0].text, texts::BLOCKED);

    h.bot.handle(text(ADMIN_ID, texts::BTN_ADMIN_UNBLOCK)).await;
    h.bot.handle(text(ADMIN_ID, "42")).await;
    h.transport.take().await;

    h.bot.handle(InboundEvent::new(42, EventKind::Start)).await;
    assert_eq!(h.transport.take().await[0].text, texts::WELCOME);
}

#[tokio::test]
async fn non_admin_cannot_open_panel() {
    let h = harness().await;

    h.bot.handle(command(9, "admin")).await;
    h.bot.handle(text(9, texts::BTN_ADMIN_STATS)).await;

    assert!(h.transport.texts().await.is_empty());
}

#[tokio::test]
async fn unmatched_text_hints_menu_once() {
    let h = harness().await;

    h.bot.handle(text(1, "hello?")).await;
    h.bot.handle(text(1, "anyone?")).await;
    h.bot.handle(command(1, "myid")).await;

    assert_eq!(
        h.transport.texts().await,
        vec![texts::MENU_HINT.to_string(), texts::my_id(1)]
    );
}
