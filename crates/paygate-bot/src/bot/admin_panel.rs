//! Administrator panel handlers.
//!
//! Every panel interaction goes through [`guarded_transition`]; the handlers
//! here only carry out the resulting [`AdminEffect`].

use paygate_core::ndjson::{Keyboard, Reply};
use tracing::{debug, error, info};

use super::{Bot, HandlerResult};
use crate::admin::{
    AdminButton, AdminEffect, AdminInput, AdminState, Capability, Prompt, guarded_transition,
    password_matches,
};
use crate::texts;

impl Bot {
    fn capability(&self, user_id: i64) -> Capability {
        Capability::of(user_id, &self.settings.admin_ids)
    }

    pub(super) async fn on_admin_enter(&self, user_id: i64) -> HandlerResult {
        let input = AdminInput::Enter {
            password_required: !self.settings.admin_password.is_empty(),
        };
        self.run_admin(user_id, input).await
    }

    pub(super) async fn on_admin_input(&self, user_id: i64, text: String) -> HandlerResult {
        let input = if self.contexts.admin_state(user_id).await == AdminState::AwaitingPassword {
            AdminInput::Password {
                valid: password_matches(text.trim(), &self.settings.admin_password),
            }
        } else {
            AdminInput::Value(text)
        };
        self.run_admin(user_id, input).await
    }

    pub(super) async fn on_admin_button(&self, user_id: i64, text: &str) -> HandlerResult {
        let Some(button) = AdminButton::parse(text) else {
            return Ok(());
        };
        self.run_admin(user_id, AdminInput::Button(button)).await
    }

    async fn run_admin(&self, user_id: i64, input: AdminInput) -> HandlerResult {
        let state = self.contexts.admin_state(user_id).await;
        let Some((next, effect)) = guarded_transition(self.capability(user_id), state, &input)
        else {
            debug!(?state, "Admin input ignored");
            return Ok(());
        };

        debug!(from = ?state, to = ?next, "Admin transition");
        self.contexts.set_admin_state(user_id, next).await;
        if let Err(e) = self.apply_admin_effect(user_id, effect).await {
            error!(error = %e, "Admin action failed");
            self.send(
                Reply::text(user_id, texts::ADMIN_STORE_ERROR).with_keyboard(texts::admin_keyboard()),
            )
            .await;
        }
        Ok(())
    }

    async fn apply_admin_effect(&self, user_id: i64, effect: AdminEffect) -> HandlerResult {
        let text = match effect {
            AdminEffect::Ask(prompt) => {
                let text = match prompt {
                    Prompt::Password => texts::ADMIN_PASSWORD_PROMPT,
                    Prompt::CardNumber => texts::ADMIN_PROMPT_CARD,
                    Prompt::Name => texts::ADMIN_PROMPT_NAME,
                    Prompt::TariffPrice => texts::ADMIN_PROMPT_TARIFF,
                    Prompt::BlockUser => texts::ADMIN_PROMPT_BLOCK,
                    Prompt::UnblockUser => texts::ADMIN_PROMPT_UNBLOCK,
                };
                let keyboard = if prompt == Prompt::Password {
                    Keyboard::Remove
                } else {
                    texts::admin_keyboard()
                };
                self.send(Reply::text(user_id, text).with_keyboard(keyboard))
                    .await;
                return Ok(());
            }
            AdminEffect::LoginSucceeded => {
                self.db.log_admin_action(user_id, "login").await?;
                info!(user_id, "Administrator logged in");
                self.send(
                    Reply::text(user_id, texts::ADMIN_MENU).with_keyboard(texts::admin_keyboard()),
                )
                .await;
                return Ok(());
            }
            AdminEffect::LoginFailed => {
                self.db.log_admin_action(user_id, "login_failed").await?;
                self.send(
                    Reply::text(user_id, texts::ADMIN_WRONG_PASSWORD)
                        .with_keyboard(texts::main_keyboard()),
                )
                .await;
                return Ok(());
            }
            AdminEffect::Exit => {
                self.db.log_admin_action(user_id, "logout").await?;
                self.send(Reply::text(user_id, texts::MAIN_MENU).with_keyboard(texts::main_keyboard()))
                    .await;
                return Ok(());
            }
            AdminEffect::ShowStats => {
                let since = self.local_day_start();
                let users = self.db.user_totals(since).await?;
                let payments = self.db.payments_since(since).await?;
                let symbol = self.payment.snapshot().await.currency.symbol;
                texts::admin_stats(
                    users.total,
                    users.new_since,
                    payments.count,
                    payments.total_amount,
                    &symbol,
                )
            }
            AdminEffect::ShowUsers => texts::admin_users(self.db.user_totals(0).await?.total),
            AdminEffect::ShowBlocks => texts::admin_blocks(self.tracker.blocked_count().await?),
            AdminEffect::ShowPaymentDetails => {
                texts::admin_payment_details(&self.payment.snapshot().await)
            }
            AdminEffect::SetCardNumber(card_number) => {
                self.payment.set_card_number(card_number).await;
                self.db.log_admin_action(user_id, "set_card_number").await?;
                texts::ADMIN_SAVED.to_string()
            }
            AdminEffect::SetNames {
                card_name,
                recipient_name,
            } => {
                self.payment.set_card_name(card_name).await;
                self.payment.set_recipient_name(recipient_name).await;
                self.db.log_admin_action(user_id, "set_names").await?;
                texts::ADMIN_SAVED.to_string()
            }
            AdminEffect::SetTariffPrice { name, price } => {
                if self.payment.set_price(&name, price).await {
                    self.db
                        .log_admin_action(user_id, &format!("set_price:{name}={price}"))
                        .await?;
                    texts::ADMIN_SAVED.to_string()
                } else {
                    texts::ADMIN_UNKNOWN_TARIFF.to_string()
                }
            }
            AdminEffect::Block(target) => {
                self.tracker.block(target).await?;
                self.db
                    .log_admin_action(user_id, &format!("block:{target}"))
                    .await?;
                info!(admin_id = user_id, target, "User blocked by administrator");
                texts::admin_blocked_user(target)
            }
            AdminEffect::Unblock(target) => {
                let had_records = self.tracker.unblock(target).await?;
                self.db
                    .log_admin_action(user_id, &format!("unblock:{target}"))
                    .await?;
                info!(admin_id = user_id, target, "User unblocked by administrator");
                texts::admin_unblocked_user(target, had_records)
            }
            AdminEffect::InvalidInput => texts::ADMIN_INVALID_INPUT.to_string(),
        };

        self.send(Reply::text(user_id, text).with_keyboard(texts::admin_keyboard()))
            .await;
        Ok(())
    }
}
