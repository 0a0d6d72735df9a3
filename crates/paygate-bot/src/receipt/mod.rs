//! Receipt checking: text extraction, the rule chain, the anti-replay
//! ledger and suspicious-activity tracking.

mod extractor;
mod ledger;
mod tracker;
mod validator;

pub use extractor::{ExtractionPool, PdfTextExtractor, TextExtractor};
pub use ledger::TransactionLedger;
pub use tracker::{FailureOutcome, SuspiciousActivityTracker};
pub use validator::{
    ReceiptValidator, ValidationReason, ValidationResult, ValidatorLimits, amount_matches,
    amount_renderings, find_receipt_time, transaction_id_from_filename,
};
