//! Bot service: wires the components together and dispatches inbound events.

mod admin_panel;
mod user;

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime};
use paygate_core::Config;
use paygate_core::ndjson::{EventKind, InboundEvent, Reply};
use tracing::{Instrument, debug, error, info_span, warn};

use crate::clock::SharedClock;
use crate::context::{SessionContexts, TariffSelectionCache};
use crate::issuer::AccessCodeIssuer;
use crate::notify::Notifier;
use crate::payment::PaymentSettings;
use crate::pipeline::{DocumentLimits, PipelineError, PipelineParts, ReceiptPipeline};
use crate::receipt::{
    ExtractionPool, ReceiptValidator, SuspiciousActivityTracker, TextExtractor,
    TransactionLedger, ValidatorLimits,
};
use crate::router::{Handler, RouteContext, Router};
use crate::sessions::SessionQuery;
use crate::storage::{Database, DatabaseError};
use crate::texts;
use crate::transport::Transport;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Store(#[from] DatabaseError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

type HandlerResult = Result<(), HandlerError>;

/// Settings the handlers read directly.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub admin_ids: Vec<i64>,
    pub admin_password: String,
    pub max_age_minutes: u32,
    /// Offset used to render times and to find the start of "today".
    pub local_offset: FixedOffset,
}

/// External collaborators the bot is built with.
pub struct BotDeps {
    pub db: Database,
    pub transport: Arc<dyn Transport>,
    pub notifier: Notifier,
    pub extractor: Arc<dyn TextExtractor>,
    pub clock: SharedClock,
}

#[derive(Clone)]
pub struct Bot {
    db: Database,
    transport: Arc<dyn Transport>,
    settings: Arc<BotSettings>,
    payment: PaymentSettings,
    contexts: SessionContexts,
    selections: TariffSelectionCache,
    tracker: SuspiciousActivityTracker,
    ledger: TransactionLedger,
    issuer: AccessCodeIssuer,
    sessions: SessionQuery,
    pipeline: ReceiptPipeline,
    notifier: Notifier,
    clock: SharedClock,
    router: Arc<Router>,
}

impl Bot {
    pub fn new(config: &Config, deps: BotDeps) -> Self {
        let BotDeps {
            db,
            transport,
            notifier,
            extractor,
            clock,
        } = deps;
        let receipts = &config.receipts;

        let limits = ValidatorLimits::new(receipts.max_age_minutes, receipts.utc_offset_minutes);
        let payment = PaymentSettings::new(config.payment.clone());
        let contexts = SessionContexts::new(Duration::from_secs(config.sessions.context_ttl_secs));
        let selections = contexts.selections();
        let ledger = TransactionLedger::new(db.clone()).with_clock(Arc::clone(&clock));
        let tracker = SuspiciousActivityTracker::new(db.clone(), receipts.suspicious_limit);
        let issuer = AccessCodeIssuer::new(db.clone(), Arc::clone(&clock));
        let validator = ReceiptValidator::new(
            payment.clone(),
            ledger.clone(),
            limits,
            Arc::clone(&clock),
        );

        let pipeline = ReceiptPipeline::new(PipelineParts {
            db: db.clone(),
            extraction: ExtractionPool::new(extractor, receipts.extraction_workers),
            validator,
            ledger: ledger.clone(),
            tracker: tracker.clone(),
            issuer: issuer.clone(),
            selections: selections.clone(),
            payment: payment.clone(),
            notifier: notifier.clone(),
            limits: DocumentLimits {
                accepted_mime_type: receipts.accepted_mime_type.clone(),
                max_bytes: receipts.max_document_bytes,
            },
        });

        let settings = BotSettings {
            admin_ids: config.admin.admin_ids.clone(),
            admin_password: config.admin.password.clone(),
            max_age_minutes: receipts.max_age_minutes,
            local_offset: limits.receipt_offset,
        };

        Self {
            sessions: SessionQuery::new(db.clone(), Arc::clone(&clock)),
            db,
            transport,
            settings: Arc::new(settings),
            payment,
            contexts,
            selections,
            tracker,
            ledger,
            issuer,
            pipeline,
            notifier,
            clock,
            router: Arc::new(Router::standard()),
        }
    }

    pub const fn contexts(&self) -> &SessionContexts {
        &self.contexts
    }

    pub const fn payment(&self) -> &PaymentSettings {
        &self.payment
    }

    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Route one inbound event and run its handler.
    ///
    /// Never fails: handler errors are logged and answered with a retry
    /// prompt.
    pub async fn handle(&self, event: InboundEvent) {
        let span = info_span!("event", user_id = event.user_id, kind = event.kind_name());
        self.dispatch(event).instrument(span).await;
    }

    async fn dispatch(&self, event: InboundEvent) {
        let user_id = event.user_id;

        if let Err(e) = self.db.touch_user(user_id).await {
            warn!(error = %e, "Failed to update user stats");
        }

        let ctx = RouteContext {
            admin_state: self.contexts.admin_state(user_id).await,
        };
        let Some(route) = self.router.resolve(&event, &ctx) else {
            debug!("No route matched");
            return;
        };
        let (name, handler) = (route.name, route.handler);

        if route.checks_block {
            match self.tracker.is_blocked(user_id).await {
                Ok(false) => {}
                Ok(true) => {
                    self.send(Reply::text(user_id, texts::BLOCKED)).await;
                    return;
                }
                Err(e) => {
                    error!(route = name, error = %e, "Block check failed");
                    self.send(Reply::text(user_id, texts::GENERIC_ERROR)).await;
                    return;
                }
            }
        }

        debug!(route = name, "Dispatching");
        if let Err(e) = self.run(handler, event).await {
            error!(route = name, error = %e, "Handler failed");
            let text = if handler == Handler::Document {
                texts::RETRY
            } else {
                texts::GENERIC_ERROR
            };
            self.send(Reply::text(user_id, text)).await;
        }
    }

    async fn run(&self, handler: Handler, event: InboundEvent) -> HandlerResult {
        let InboundEvent {
            user_id,
            username,
            kind,
        } = event;

        match (handler, kind) {
            (Handler::Start, _) => self.on_start(user_id).await,
            (Handler::ChooseTariff, _) => self.on_choose_tariff(user_id).await,
            (Handler::MySessions, _) => self.on_my_sessions(user_id).await,
            (Handler::Menu, _) => self.on_menu(user_id).await,
            (Handler::TariffCallback, EventKind::Callback { data }) => {
                self.on_tariff_callback(user_id, &data).await
            }
            (Handler::Document, EventKind::Document(document)) => {
                self.on_document(user_id, username.as_deref(), document)
                    .await
            }
            (Handler::CheckPayment, _) => self.on_check_payment(user_id).await,
            (Handler::MyId, _) => {
                let reply =
                    Reply::text(user_id, texts::my_id(user_id)).with_keyboard(texts::main_keyboard());
                self.send(reply).await;
                Ok(())
            }
            (Handler::FreeText, _) => self.on_free_text(user_id).await,
            (Handler::AdminEnter, _) => self.on_admin_enter(user_id).await,
            (Handler::AdminInput, EventKind::Text { text }) => {
                self.on_admin_input(user_id, text).await
            }
            (Handler::AdminButton, EventKind::Text { text }) => {
                self.on_admin_button(user_id, &text).await
            }
            (handler, _) => {
                debug!(?handler, "Event does not fit handler");
                Ok(())
            }
        }
    }

    async fn send(&self, reply: Reply) {
        let user_id = reply.user_id;
        if let Err(e) = self.transport.send(reply).await {
            warn!(user_id, error = %e, "Failed to deliver reply");
        }
    }

    /// Unix time of the most recent local midnight.
    fn local_day_start(&self) -> i64 {
        let offset = self.settings.local_offset;
        self.clock
            .now()
            .with_timezone(&offset)
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_local_timezone(offset)
            .single()
            .map_or(0, |t| t.timestamp())
    }
}
