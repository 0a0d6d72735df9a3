//! Receipt rule chain.
//!
//! Rules run in a fixed order and stop at the first failure:
//! amount, recipient, timestamp, transaction id. Only the last rule touches
//! the store (one existence check against the ledger).

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeDelta, Utc};
use paygate_core::Tariff;
use paygate_core::config::CurrencyConfig;
use regex::Regex;
use tracing::debug;

use super::ledger::TransactionLedger;
use crate::clock::SharedClock;
use crate::payment::PaymentSettings;
use crate::storage::DatabaseError;

/// `DD.MM.YYYY HH:MM`
static DOTTED_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}\.\d{2}\.\d{4}\s\d{2}:\d{2}").expect("static regex is valid")
});

/// `YYYY-MM-DDTHH:MM`
static ISO_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}").expect("static regex is valid"));

static DIGIT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static regex is valid"));

/// Why a receipt was accepted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationReason {
    AmountMismatch,
    RecipientMismatch,
    TimeUnparsable,
    TimeTooOld,
    TransactionIdMissingInFilename,
    TransactionIdNotInText,
    TransactionAlreadyUsed,
    Accepted,
}

impl ValidationReason {
    /// Stable reason code for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AmountMismatch => "amount-mismatch",
            Self::RecipientMismatch => "recipient-mismatch",
            Self::TimeUnparsable => "time-unparsable",
            Self::TimeTooOld => "time-too-old",
            Self::TransactionIdMissingInFilename => "transaction-id-missing-in-filename",
            Self::TransactionIdNotInText => "transaction-id-not-in-text",
            Self::TransactionAlreadyUsed => "transaction-already-used",
            Self::Accepted => "accepted",
        }
    }
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verdict of the rule chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub reason: ValidationReason,
    /// The derived transaction id, set only on acceptance.
    pub transaction_id: Option<String>,
}

impl ValidationResult {
    pub const fn rejected(reason: ValidationReason) -> Self {
        Self {
            reason,
            transaction_id: None,
        }
    }

    pub const fn accepted(transaction_id: String) -> Self {
        Self {
            reason: ValidationReason::Accepted,
            transaction_id: Some(transaction_id),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.reason == ValidationReason::Accepted
    }
}

/// Static limits of the rule chain.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorLimits {
    pub max_age: TimeDelta,
    /// Offset at which naive receipt timestamps are interpreted.
    pub receipt_offset: FixedOffset,
}

impl ValidatorLimits {
    /// Build limits from config values; an out-of-range offset falls back to UTC.
    pub fn new(max_age_minutes: u32, utc_offset_minutes: i32) -> Self {
        Self {
            max_age: TimeDelta::minutes(i64::from(max_age_minutes)),
            receipt_offset: FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// Runs the rule chain against extracted receipt text.
#[derive(Clone)]
pub struct ReceiptValidator {
    payment: PaymentSettings,
    ledger: TransactionLedger,
    limits: ValidatorLimits,
    clock: SharedClock,
}

impl ReceiptValidator {
    pub const fn new(
        payment: PaymentSettings,
        ledger: TransactionLedger,
        limits: ValidatorLimits,
        clock: SharedClock,
    ) -> Self {
        Self {
            payment,
            ledger,
            limits,
            clock,
        }
    }

    /// Validate a receipt for `tariff`.
    ///
    /// Errors only when the ledger lookup fails.
    pub async fn validate(
        &self,
        filename: &str,
        text: &str,
        tariff: &Tariff,
    ) -> Result<ValidationResult, DatabaseError> {
        let payment = self.payment.snapshot().await;

        if !tariff.is_free() && !amount_matches(text, tariff.price, &payment.currency) {
            return Ok(ValidationResult::rejected(ValidationReason::AmountMismatch));
        }

        if !text.contains(payment.recipient_name.as_str()) {
            return Ok(ValidationResult::rejected(
                ValidationReason::RecipientMismatch,
            ));
        }

        let Some(receipt_time) = find_receipt_time(text, self.limits.receipt_offset) else {
            return Ok(ValidationResult::rejected(ValidationReason::TimeUnparsable));
        };
        // Only staleness is checked; a future timestamp passes.
        if self.clock.now() - receipt_time > self.limits.max_age {
            return Ok(ValidationResult::rejected(ValidationReason::TimeTooOld));
        }

        let Some(transaction_id) = transaction_id_from_filename(filename) else {
            return Ok(ValidationResult::rejected(
                ValidationReason::TransactionIdMissingInFilename,
            ));
        };
        if !text.contains(transaction_id) {
            return Ok(ValidationResult::rejected(
                ValidationReason::TransactionIdNotInText,
            ));
        }
        if self.ledger.exists(transaction_id).await? {
            return Ok(ValidationResult::rejected(
                ValidationReason::TransactionAlreadyUsed,
            ));
        }

        debug!(transaction_id, "Receipt passed all rules");
        Ok(ValidationResult::accepted(transaction_id.to_string()))
    }
}

/// Literal renderings of `price` accepted by the amount rule.
pub fn amount_renderings(price: u32, currency: &CurrencyConfig) -> [String; 6] {
    [
        format!("{price},00"),
        format!("{price}.00"),
        format!("{price} {}", currency.code),
        format!("{price}{}", currency.symbol),
        format!("{price} {}", currency.word_short),
        format!("{price} {}", currency.word_long),
    ]
}

/// Substring match of any rendering; `1490,00` also matches a price of 490.
pub fn amount_matches(text: &str, price: u32, currency: &CurrencyConfig) -> bool {
    amount_renderings(price, currency)
        .iter()
        .any(|rendering| text.contains(rendering.as_str()))
}

/// First timestamp found in `text`, trying `DD.MM.YYYY HH:MM` before
/// `YYYY-MM-DDTHH:MM`.
///
/// Each pattern contributes its first match only; a match that is not a
/// real calendar date falls through to the next pattern.
pub fn find_receipt_time(text: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let candidates: [(&Regex, &str); 2] = [
        (&DOTTED_TIME_RE, "%d.%m.%Y %H:%M"),
        (&ISO_TIME_RE, "%Y-%m-%dT%H:%M"),
    ];

    candidates.iter().find_map(|(re, format)| {
        let found = re.find(text)?;
        // The dotted pattern allows any whitespace between date and time.
        let normalized = found.as_str().replace(char::is_whitespace, " ");
        let naive = NaiveDateTime::parse_from_str(&normalized, format).ok()?;
        naive
            .and_local_timezone(offset)
            .single()
            .map(|t| t.with_timezone(&Utc))
    })
}

/// Longest maximal digit run in `filename`; ties go to the leftmost run.
pub fn transaction_id_from_filename(filename: &str) -> Option<&str> {
    DIGIT_RUN_RE
        .find_iter(filename)
        .map(|m| m.as_str())
        .fold(None, |best: Option<&str>, run| match best {
            Some(current) if current.len() >= run.len() => Some(current),
            _ => Some(run),
        })
}
