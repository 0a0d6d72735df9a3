//! Live payment settings.
//!
//! Card details, the recipient name and tariff prices can be edited from the
//! admin panel at runtime; every reader takes a fresh snapshot, so an edit
//! applies to the next validation.

use std::sync::Arc;

use paygate_core::Tariff;
use paygate_core::config::PaymentConfig;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    inner: Arc<RwLock<PaymentConfig>>,
}

impl PaymentSettings {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current settings.
    pub async fn snapshot(&self) -> PaymentConfig {
        self.inner.read().await.clone()
    }

    pub async fn tariff(&self, name: &str) -> Option<Tariff> {
        self.inner.read().await.tariffs.get(name).cloned()
    }

    /// Tariffs offered to a user, in catalog order. Free tariffs are listed
    /// only when `include_free` is set.
    pub async fn offered_tariffs(&self, include_free: bool) -> Vec<Tariff> {
        self.inner
            .read()
            .await
            .tariffs
            .iter()
            .filter(|t| include_free || !t.is_free())
            .cloned()
            .collect()
    }

    pub async fn set_card_number(&self, card_number: String) {
        self.inner.write().await.card_number = card_number;
        info!("Card number updated");
    }

    pub async fn set_card_name(&self, card_name: String) {
        self.inner.write().await.card_name = card_name;
        info!("Card name updated");
    }

    pub async fn set_recipient_name(&self, recipient_name: String) {
        info!(recipient = %recipient_name, "Recipient name updated");
        self.inner.write().await.recipient_name = recipient_name;
    }

    /// Returns `false` when no tariff has that name.
    pub async fn set_price(&self, name: &str, price: u32) -> bool {
        let updated = self.inner.write().await.tariffs.set_price(name, price);
        if updated {
            info!(tariff = name, price, "Tariff price updated");
        }
        updated
    }
}
