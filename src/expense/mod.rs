//! Expenses, stored encrypted to their owner's public key.

mod period;
mod repository;
mod service;

pub use period::*;
pub use repository::*;
pub use service::*;

use chrono::NaiveDate;

use crate::crypto::{PrivateKey, PublicKey};
use crate::error::{Result, ServerError};

/// Expense as saved on database.
///
/// `description`, `total`, `historical` and `currency` hold ciphertext once
/// [`Expense::encrypt`] ran; `date` and `user_id` stay in clear for indexing.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct Expense {
    /// Unset until saved.
    pub id: Option<i64>,
    pub user_id: i64,
    pub date: NaiveDate,
    pub description: String,
    /// Amount as entered.
    pub total: String,
    /// Amount in the pivot currency at entry time.
    pub historical: String,
    pub currency: String,
    pub category: Option<String>,
}

impl Expense {
    /// Create a plaintext expense.
    pub fn new(
        user_id: i64,
        date: NaiveDate,
        description: impl Into<String>,
        total: f64,
        historical: f64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            date,
            description: description.into(),
            total: total.to_string(),
            historical: historical.to_string(),
            currency: currency.into(),
            category: None,
        }
    }

    /// Encrypt the four sensitive fields. Call once, on creation.
    pub fn encrypt(&self, key: &PublicKey) -> Result<Self> {
        Ok(Self {
            description: key.encrypt(&self.description)?,
            total: key.encrypt(&self.total)?,
            historical: key.encrypt(&self.historical)?,
            currency: key.encrypt(&self.currency)?,
            ..self.clone()
        })
    }

    /// Decrypt the four sensitive fields.
    pub fn decrypt(&self, key: &PrivateKey) -> Result<Self> {
        Ok(Self {
            description: key.decrypt(&self.description)?,
            total: key.decrypt(&self.total)?,
            historical: key.decrypt(&self.historical)?,
            currency: key.decrypt(&self.currency)?,
            ..self.clone()
        })
    }

    /// Plaintext historical value.
    pub fn historical_value(&self) -> Result<f64> {
        self.historical.trim().parse::<f64>().map_err(|_| {
            ServerError::internal(format!(
                "historical value of expense {:?} is not a number",
                self.id
            ))
        })
    }
}
