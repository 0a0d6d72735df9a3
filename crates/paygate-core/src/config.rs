//! Configuration resolution for Paygate.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/paygate/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables (`PAYGATE_*`)
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::tariff::TariffCatalog;

/// Complete Paygate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub payment: PaymentConfig,
    pub receipts: ReceiptConfig,
    pub admin: AdminConfig,
    pub webhook: WebhookConfig,
    pub storage: StorageConfig,
    pub sessions: SessionConfig,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            payment: PaymentConfig::default(),
            receipts: ReceiptConfig::default(),
            admin: AdminConfig::default(),
            webhook: WebhookConfig::default(),
            storage: StorageConfig::default(),
            sessions: SessionConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Payment details shown to users and matched against receipts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Card number users transfer to.
    pub card_number: String,
    /// Card holder name shown next to the card number.
    pub card_name: String,
    /// Exact string that must appear in a receipt (case-sensitive).
    pub recipient_name: String,
    pub currency: CurrencyConfig,
    pub tariffs: TariffCatalog,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            card_number: String::new(),
            card_name: String::new(),
            recipient_name: String::new(),
            currency: CurrencyConfig::default(),
            tariffs: TariffCatalog::default(),
        }
    }
}

/// Literal renderings of the currency used by the amount rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub code: String,
    pub symbol: String,
    pub word_short: String,
    pub word_long: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            code: "KZT".to_string(),
            symbol: "₸".to_string(),
            word_short: "тг".to_string(),
            word_long: "тенге".to_string(),
        }
    }
}

/// Receipt validation and anti-fraud limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    /// Maximum receipt age in minutes.
    pub max_age_minutes: u32,
    /// Offset from UTC of the naive timestamps printed on receipts.
    pub utc_offset_minutes: i32,
    /// Failed attempts per (user, filename) before the user is blocked.
    pub suspicious_limit: u32,
    pub max_document_bytes: u64,
    pub accepted_mime_type: String,
    /// Size of the blocking worker pool used for text extraction.
    pub extraction_workers: usize,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            max_age_minutes: 25,
            utc_offset_minutes: 5 * 60,
            suspicious_limit: 3,
            max_document_bytes: 3 * 1024 * 1024, // 3 MB
            accepted_mime_type: "application/pdf".to_string(),
            extraction_workers: 2,
        }
    }
}

/// Administrator identities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub admin_ids: Vec<i64>,
    pub password: String,
}

/// Best-effort session webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Base URL; `None` disables the webhook.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub queue_capacity: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: Some("http://localhost:5000".to_string()),
            timeout_secs: 2,
            queue_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

/// Per-user conversation state retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a user's context is evicted (seconds).
    pub context_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_ttl_secs: 24 * 60 * 60,
            cleanup_interval_secs: 10 * 60,
        }
    }
}

impl Config {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.payment.tariffs.is_empty() {
            return Err(Error::Config("tariff catalog is empty".into()));
        }
        if let Some(name) = self.payment.tariffs.first_duplicate() {
            return Err(Error::Config(format!("duplicate tariff name: {name}")));
        }
        if self.receipts.suspicious_limit == 0 {
            return Err(Error::Config("suspicious_limit must be at least 1".into()));
        }
        if self.payment.recipient_name.trim().is_empty() {
            return Err(Error::Config("recipient_name is required".into()));
        }
        if self.receipts.extraction_workers == 0 {
            return Err(Error::Config("extraction_workers must be at least 1".into()));
        }
        Ok(())
    }

    /// Whether `user_id` is in the administrator list.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin.admin_ids.contains(&user_id)
    }
}

/// Load configuration with hierarchical resolution.
///
/// An explicit `config_path` must exist; the global file is optional.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    if let Some(path) = config_path {
        let overlay = load_config_file(path)?;
        merge_config(&mut config, overlay);
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".paygate").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/paygate/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("paygate").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    // Secrets and identities only override when present.
    if !overlay.payment.card_number.is_empty() {
        base.payment.card_number = overlay.payment.card_number;
    }
    if !overlay.payment.card_name.is_empty() {
        base.payment.card_name = overlay.payment.card_name;
    }
    if !overlay.payment.recipient_name.is_empty() {
        base.payment.recipient_name = overlay.payment.recipient_name;
    }
    base.payment.currency = overlay.payment.currency;
    base.payment.tariffs = overlay.payment.tariffs;

    base.receipts = overlay.receipts;

    if !overlay.admin.admin_ids.is_empty() {
        base.admin.admin_ids = overlay.admin.admin_ids;
    }
    if !overlay.admin.password.is_empty() {
        base.admin.password = overlay.admin.password;
    }

    base.webhook = overlay.webhook;
    if overlay.storage.database_path.is_some() {
        base.storage.database_path = overlay.storage.database_path;
    }
    base.sessions = overlay.sessions;
    base.log_level = overlay.log_level;
}

/// Apply `PAYGATE_*` overrides read through `lookup`.
///
/// Unparseable numeric values are ignored and the previous value is kept.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("PAYGATE_CARD_NUMBER") {
        config.payment.card_number = val;
    }
    if let Some(val) = lookup("PAYGATE_CARD_NAME") {
        config.payment.card_name = val;
    }
    if let Some(val) = lookup("PAYGATE_RECIPIENT_NAME") {
        config.payment.recipient_name = val;
    }
    if let Some(val) = lookup("PAYGATE_ADMIN_IDS") {
        let ids: Vec<i64> = val
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        if !ids.is_empty() {
            config.admin.admin_ids = ids;
        }
    }
    if let Some(val) = lookup("PAYGATE_ADMIN_PASSWORD") {
        config.admin.password = val;
    }
    if let Some(n) = lookup("PAYGATE_RECEIPT_MAX_AGE_MINUTES").and_then(|v| v.parse().ok()) {
        config.receipts.max_age_minutes = n;
    }
    if let Some(n) = lookup("PAYGATE_SUSPICIOUS_RECEIPT_LIMIT").and_then(|v| v.parse().ok()) {
        config.receipts.suspicious_limit = n;
    }
    if let Some(n) = lookup("PAYGATE_MAX_PDF_SIZE").and_then(|v| v.parse().ok()) {
        config.receipts.max_document_bytes = n;
    }
    if let Some(val) = lookup("PAYGATE_WEBHOOK_URL") {
        config.webhook.base_url = (!val.is_empty()).then_some(val);
    }
    if let Some(val) = lookup("PAYGATE_DB_PATH") {
        config.storage.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = lookup("PAYGATE_LOG_LEVEL") {
        config.log_level = val;
    }
}
