//! Tariff catalog.
//!
//! A tariff is a named access tier with a price (whole currency units,
//! `0` = free) and a duration in minutes. The catalog keeps insertion order,
//! which is also the order tariffs are offered to users.

use serde::{Deserialize, Serialize};

/// A named access tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
    pub name: String,
    pub price: u32,
    pub duration_minutes: u32,
}

impl Tariff {
    pub fn new(name: impl Into<String>, price: u32, duration_minutes: u32) -> Self {
        Self {
            name: name.into(),
            price,
            duration_minutes,
        }
    }

    /// Zero-price tariffs skip the amount rule and are gated by new-user
    /// eligibility instead of a receipt.
    pub const fn is_free(&self) -> bool {
        self.price == 0
    }

    /// Validity window of a code issued for this tariff.
    pub fn duration(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::minutes(i64::from(self.duration_minutes))
    }
}

/// Ordered set of tariffs, unique by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TariffCatalog {
    tariffs: Vec<Tariff>,
}

impl TariffCatalog {
    pub const fn new(tariffs: Vec<Tariff>) -> Self {
        Self { tariffs }
    }

    /// Look up a tariff by its exact name.
    pub fn get(&self, name: &str) -> Option<&Tariff> {
        self.tariffs.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tariff> {
        self.tariffs.iter()
    }

    /// Tariffs that require a payment receipt.
    pub fn priced(&self) -> impl Iterator<Item = &Tariff> {
        self.tariffs.iter().filter(|t| !t.is_free())
    }

    /// The first zero-price tariff, if the catalog has one.
    pub fn free(&self) -> Option<&Tariff> {
        self.tariffs.iter().find(|t| t.is_free())
    }

    pub fn len(&self) -> usize {
        self.tariffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tariffs.is_empty()
    }

    /// Change the price of an existing tariff. Returns `false` when no
    /// tariff has that name.
    pub fn set_price(&mut self, name: &str, price: u32) -> bool {
        match self.tariffs.iter_mut().find(|t| t.name == name) {
            Some(tariff) => {
                tariff.price = price;
                true
            }
            None => false,
        }
    }

    /// Name of the first tariff that appears more than once, if any.
    pub fn first_duplicate(&self) -> Option<&str> {
        self.tariffs.iter().enumerate().find_map(|(i, t)| {
            self.tariffs[..i]
                .iter()
                .any(|earlier| earlier.name == t.name)
                .then_some(t.name.as_str())
        })
    }
}

impl Default for TariffCatalog {
    fn default() -> Self {
        Self::new(vec![
            Tariff::new("2 минуты", 0, 2),
            Tariff::new("1 час", 490, 60),
            Tariff::new("2 часа", 790, 120),
        ])
    }
}
