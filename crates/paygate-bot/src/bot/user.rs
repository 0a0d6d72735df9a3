//! Handlers for regular users.

use paygate_core::Tariff;
use paygate_core::ndjson::{Document, Reply};
use tracing::{debug, info, warn};

use super::{Bot, HandlerResult};
use crate::admin::Capability;
use crate::pipeline::{Admission, Outcome};
use crate::texts;

/// How far back `/checkpayment` looks for a consumed receipt.
const RECENT_RECEIPT_WINDOW_SECS: i64 = 60 * 60;

impl Bot {
    pub(super) async fn on_start(&self, user_id: i64) -> HandlerResult {
        self.db.log_user_activity(user_id, "start").await?;
        self.send(Reply::text(user_id, texts::WELCOME).with_keyboard(texts::main_keyboard()))
            .await;
        Ok(())
    }

    async fn tariff_reply(&self, user_id: i64, prompt: &str) -> HandlerResult {
        let is_new = self.issuer.is_new_user(user_id).await?;
        let tariffs = self.payment.offered_tariffs(is_new).await;
        let symbol = self.payment.snapshot().await.currency.symbol;
        self.send(
            Reply::text(user_id, prompt).with_keyboard(texts::tariff_keyboard(&tariffs, &symbol)),
        )
        .await;
        Ok(())
    }

    pub(super) async fn on_choose_tariff(&self, user_id: i64) -> HandlerResult {
        self.tariff_reply(user_id, texts::CHOOSE_TARIFF).await
    }

    /// Administrators get their panel; everyone else the tariff list.
    pub(super) async fn on_menu(&self, user_id: i64) -> HandlerResult {
        if Capability::of(user_id, &self.settings.admin_ids) == Capability::Admin {
            if self.contexts.admin_state(user_id).await.in_panel() {
                self.send(
                    Reply::text(user_id, texts::ADMIN_MENU).with_keyboard(texts::admin_keyboard()),
                )
                .await;
                return Ok(());
            }
            return self.on_admin_enter(user_id).await;
        }
        self.tariff_reply(user_id, texts::CHOOSE_TARIFF_FOR_ACCESS)
            .await
    }

    pub(super) async fn on_tariff_callback(&self, user_id: i64, data: &str) -> HandlerResult {
        let name = data
            .strip_prefix(texts::TARIFF_CALLBACK_PREFIX)
            .unwrap_or(data);
        let Some(tariff) = self.payment.tariff(name).await else {
            debug!(tariff = name, "Ignoring unknown tariff");
            return Ok(());
        };

        self.db
            .log_user_activity(user_id, &format!("select:{}", tariff.name))
            .await?;

        // Only priced tariffs are paid by receipt, so only they are remembered.
        if tariff.is_free() {
            self.selections.clear(user_id).await;
            return self.issue_free(user_id, &tariff).await;
        }
        self.selections.select(user_id, &tariff.name).await;

        let payment = self.payment.snapshot().await;
        self.send(Reply::text(user_id, texts::payment_instructions(&tariff, &payment)))
            .await;
        Ok(())
    }

    /// Free tier: one code per user, gated atomically in the store.
    async fn issue_free(&self, user_id: i64, tariff: &Tariff) -> HandlerResult {
        let Some(code) = self.issuer.issue_first(user_id, tariff).await? else {
            info!(user_id, "Free tier refused: user already has codes");
            self.send(
                Reply::text(user_id, texts::FREE_TIER_USED).with_keyboard(texts::main_keyboard()),
            )
            .await;
            return Ok(());
        };

        self.db.log_user_activity(user_id, "free_code").await?;
        self.send(
            Reply::text(user_id, texts::access_code(&code.code, tariff))
                .as_html()
                .with_keyboard(texts::main_keyboard()),
        )
        .await;
        self.notifier.notify(user_id, &code.session_id);
        Ok(())
    }

    pub(super) async fn on_document(
        &self,
        user_id: i64,
        username: Option<&str>,
        document: Document,
    ) -> HandlerResult {
        let tariff = match self.pipeline.admit(user_id, &document).await? {
            Admission::Admitted(tariff) => tariff,
            Admission::Blocked => {
                self.send(Reply::text(user_id, texts::BLOCKED)).await;
                return Ok(());
            }
            Admission::NoSelection | Admission::FreeTariff => {
                self.send(
                    Reply::text(user_id, texts::SELECT_TARIFF_FIRST)
                        .with_keyboard(texts::main_keyboard()),
                )
                .await;
                return Ok(());
            }
            Admission::WrongMimeType => {
                self.send(
                    Reply::text(user_id, texts::PDF_REQUIRED).with_keyboard(texts::main_keyboard()),
                )
                .await;
                return Ok(());
            }
            Admission::TooLarge { max_bytes } => {
                self.send(Reply::text(user_id, texts::document_too_large(max_bytes)))
                    .await;
                return Ok(());
            }
        };

        self.send(Reply::text(user_id, texts::PROCESSING)).await;
        if let Err(e) = self.db.log_user_activity(user_id, "receipt_uploaded").await {
            warn!(error = %e, "Failed to log receipt upload");
        }

        let reply = match self
            .pipeline
            .process(user_id, username, document, tariff)
            .await?
        {
            Outcome::Accepted { code, tariff } => {
                Reply::text(user_id, texts::access_code(&code.code, &tariff))
                    .as_html()
                    .with_keyboard(texts::main_keyboard())
            }
            Outcome::Rejected { reason, tariff, .. } => {
                let payment = self.payment.snapshot().await;
                Reply::text(
                    user_id,
                    texts::rejection_with_checklist(
                        reason,
                        &tariff,
                        &payment,
                        self.settings.max_age_minutes,
                    ),
                )
                .with_keyboard(texts::main_keyboard())
            }
            Outcome::BlockedNow { .. } => Reply::text(user_id, texts::BLOCKED_FOR_SUSPICIOUS),
        };
        self.send(reply).await;
        Ok(())
    }

    /// Codes are issued when a receipt is accepted, so for a priced tariff
    /// this only reports the code of a recently consumed receipt.
    pub(super) async fn on_check_payment(&self, user_id: i64) -> HandlerResult {
        let selected = self.selections.get(user_id).await;
        let tariff = match selected {
            Some(name) => self.payment.tariff(&name).await,
            None => None,
        };
        let Some(tariff) = tariff else {
            self.send(
                Reply::text(user_id, texts::SELECT_TARIFF_FIRST)
                    .with_keyboard(texts::main_keyboard()),
            )
            .await;
            return Ok(());
        };

        if tariff.is_free() {
            return self.issue_free(user_id, &tariff).await;
        }

        let active = if self
            .ledger
            .consumed_recently(user_id, RECENT_RECEIPT_WINDOW_SECS)
            .await?
        {
            self.sessions.active(user_id).await?
        } else {
            None
        };

        let reply = match active {
            Some(session) => Reply::text(
                user_id,
                texts::active_code(&session, self.settings.local_offset),
            )
            .as_html()
            .with_keyboard(texts::main_keyboard()),
            None => Reply::text(user_id, texts::RECEIPT_NOT_FOUND),
        };
        self.send(reply).await;
        Ok(())
    }

    pub(super) async fn on_my_sessions(&self, user_id: i64) -> HandlerResult {
        let sessions = self.sessions.list(user_id).await?;
        self.send(
            Reply::text(
                user_id,
                texts::sessions_list(&sessions, self.settings.local_offset),
            )
            .with_keyboard(texts::main_keyboard()),
        )
        .await;
        Ok(())
    }

    /// Unrecognised text gets a pointer to the menu, once per context.
    pub(super) async fn on_free_text(&self, user_id: i64) -> HandlerResult {
        if self.contexts.take_menu_hint(user_id).await {
            self.send(Reply::text(user_id, texts::MENU_HINT).with_keyboard(texts::main_keyboard()))
                .await;
        } else {
            debug!("Ignoring free text");
        }
        Ok(())
    }
}
