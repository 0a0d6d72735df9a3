//! Receipt submission flow.
//!
//! [`ReceiptPipeline::admit`] runs the cheap gates (block flag, selection,
//! document type and size) so the caller can post a progress notice before
//! [`ReceiptPipeline::process`] does the extraction, validation and
//! issuance.

use paygate_core::Tariff;
use paygate_core::ndjson::Document;
use tracing::{info, instrument, warn};

use crate::context::TariffSelectionCache;
use crate::issuer::AccessCodeIssuer;
use crate::notify::Notifier;
use crate::payment::PaymentSettings;
use crate::receipt::{
    ExtractionPool, ReceiptValidator, SuspiciousActivityTracker, TransactionLedger,
    ValidationReason,
};
use crate::storage::{AccessCode, Database, DatabaseError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Selected tariff no longer exists: {0}")]
    UnknownTariff(String),
}

/// Document acceptance limits.
#[derive(Debug, Clone)]
pub struct DocumentLimits {
    pub accepted_mime_type: String,
    pub max_bytes: u64,
}

/// Result of the gates that run before extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted(Tariff),
    Blocked,
    NoSelection,
    /// The selection is the free tariff, which is never paid by receipt.
    FreeTariff,
    WrongMimeType,
    TooLarge { max_bytes: u64 },
}

/// Result of a processed receipt.
#[derive(Debug, Clone)]
pub enum Outcome {
    Accepted { code: AccessCode, tariff: Tariff },
    Rejected {
        reason: ValidationReason,
        tariff: Tariff,
        failures: i64,
    },
    /// This rejection pushed the user over the suspicious limit.
    BlockedNow { reason: ValidationReason },
}

/// Components the pipeline drives.
#[derive(Clone)]
pub struct PipelineParts {
    pub db: Database,
    pub extraction: ExtractionPool,
    pub validator: ReceiptValidator,
    pub ledger: TransactionLedger,
    pub tracker: SuspiciousActivityTracker,
    pub issuer: AccessCodeIssuer,
    pub selections: TariffSelectionCache,
    pub payment: PaymentSettings,
    pub notifier: Notifier,
    pub limits: DocumentLimits,
}

#[derive(Clone)]
pub struct ReceiptPipeline {
    parts: PipelineParts,
}

impl ReceiptPipeline {
    pub const fn new(parts: PipelineParts) -> Self {
        Self { parts }
    }

    /// Gates evaluated before any parsing.
    ///
    /// The block flag is read fresh from the store; a store error is
    /// returned, never treated as "not blocked".
    pub async fn admit(
        &self,
        user_id: i64,
        document: &Document,
    ) -> Result<Admission, PipelineError> {
        let p = &self.parts;

        if p.tracker.is_blocked(user_id).await? {
            return Ok(Admission::Blocked);
        }

        let Some(selected) = p.selections.get(user_id).await else {
            return Ok(Admission::NoSelection);
        };
        let tariff = p
            .payment
            .tariff(&selected)
            .await
            .ok_or(PipelineError::UnknownTariff(selected))?;
        if tariff.is_free() {
            return Ok(Admission::FreeTariff);
        }

        if document.mime_type != p.limits.accepted_mime_type {
            return Ok(Admission::WrongMimeType);
        }
        if document.size > p.limits.max_bytes || document.data.len() as u64 > p.limits.max_bytes {
            return Ok(Admission::TooLarge {
                max_bytes: p.limits.max_bytes,
            });
        }

        Ok(Admission::Admitted(tariff))
    }

    /// Extract, validate, and on acceptance consume the transaction and
    /// issue a code.
    #[instrument(
        skip(self, username, document, tariff),
        fields(file_name = %document.file_name, tariff_name = %tariff.name)
    )]
    pub async fn process(
        &self,
        user_id: i64,
        username: Option<&str>,
        document: Document,
        tariff: Tariff,
    ) -> Result<Outcome, PipelineError> {
        let p = &self.parts;
        let file_name = document.file_name;

        let text = p.extraction.extract(document.data).await;
        let verdict = p.validator.validate(&file_name, &text, &tariff).await?;

        let reason = match verdict.transaction_id {
            Some(transaction_id) if verdict.reason == ValidationReason::Accepted => {
                if p.ledger.claim(&transaction_id, user_id).await? {
                    let code = self.issue_paid(user_id, &tariff).await?;
                    info!(transaction_id, "Receipt accepted");
                    return Ok(Outcome::Accepted { code, tariff });
                }
                // Lost the race to a concurrent submission of the same id.
                ValidationReason::TransactionAlreadyUsed
            }
            _ => verdict.reason,
        };

        warn!(reason = %reason, "Receipt rejected");
        let failure = p
            .tracker
            .record_failure(user_id, username, &file_name)
            .await?;
        if let Err(e) = p
            .db
            .log_user_activity(user_id, &format!("receipt_rejected:{reason}"))
            .await
        {
            warn!(error = %e, "Failed to log rejected receipt");
        }

        if failure.blocked {
            return Ok(Outcome::BlockedNow { reason });
        }
        Ok(Outcome::Rejected {
            reason,
            tariff,
            failures: failure.count,
        })
    }

    async fn issue_paid(
        &self,
        user_id: i64,
        tariff: &Tariff,
    ) -> Result<AccessCode, PipelineError> {
        let p = &self.parts;

        let code = p.issuer.issue(user_id, tariff).await?;
        p.selections.clear(user_id).await;
        p.notifier.notify(user_id, &code.session_id);

        // The code exists from here on; bookkeeping failures only get logged.
        if let Err(e) = p
            .db
            .record_payment(user_id, i64::from(tariff.price), &tariff.name)
            .await
        {
            warn!(error = %e, session_id = %code.session_id, "Failed to record payment");
        }
        if let Err(e) = p.db.log_user_activity(user_id, "receipt_accepted").await {
            warn!(error = %e, "Failed to log accepted receipt");
        }
        Ok(code)
    }
}
