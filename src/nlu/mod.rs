//! Natural-language understanding.
//!
//! [`NluResponse`] is a typed view over the provider payload. Its accessors
//! read the `amount`, `datetime`, `description` and `total_spent` slots and
//! [`NluResponse::overview`] classifies the whole message.

mod wit;

pub use wit::*;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::parser;

/// Failure of a slot accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NluError {
    #[error("no-amount")]
    NoAmount,
    #[error("invalid-amount")]
    InvalidAmount,
    #[error("no-description")]
    NoDescription,
    #[error("no-period")]
    NoPeriod,
}

/// Provider able to annotate a message.
#[async_trait]
pub trait Nlu: Send + Sync {
    /// Understand `text`. Unavailability yields an empty response.
    async fn understand(&self, text: &str) -> NluResponse;
}

/// Single detected value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default)]
    pub confidence: f64,
}

impl Entity {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            confidence: 1.0,
        }
    }
}

/// Entity slots, each ordered by decreasing confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub amount: Vec<Entity>,
    #[serde(default)]
    pub datetime: Vec<Entity>,
    #[serde(default)]
    pub description: Vec<Entity>,
    #[serde(default)]
    pub total_spent: Vec<Entity>,
}

/// Provider payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluResponse {
    #[serde(rename = "_text", default)]
    pub text: String,
    #[serde(default)]
    pub entities: Entities,
}

/// Whether a message asks to track an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracking {
    /// No readable amount.
    Absent,
    /// Amount readable but something else is missing.
    Partial(NluError),
    Complete,
}

/// Classification of a whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageOverview {
    TrackingError,
    TrackingSuccess,
    ExpenseTotalSuccess,
    UnknownRequest,
}

impl std::fmt::Display for MessageOverview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageOverview::TrackingError => "tracking-error",
            MessageOverview::TrackingSuccess => "tracking-success",
            MessageOverview::ExpenseTotalSuccess => "expense-total-success",
            MessageOverview::UnknownRequest => "unknown-request",
        };
        f.write_str(name)
    }
}

fn first(slot: &[Entity]) -> Option<&str> {
    slot.first().map(|entity| entity.value.as_str())
}

impl NluResponse {
    /// Amount and its currency.
    pub fn amount(&self) -> Result<(f64, String), NluError> {
        let value = first(&self.entities.amount).ok_or(NluError::NoAmount)?;

        let (amount, currency) = parser::parse_amount(value);
        if amount == 0.0 || currency.is_empty() {
            return Err(NluError::InvalidAmount);
        }

        Ok((amount, currency))
    }

    /// Description, without a leading `for `.
    pub fn description(&self) -> Result<String, NluError> {
        let description = first(&self.entities.description)
            .map(parser::parse_description)
            .unwrap_or_default();

        if description.is_empty() {
            Err(NluError::NoDescription)
        } else {
            Ok(description)
        }
    }

    /// Date of occurrence, `today` when absent.
    pub fn date(&self, today: NaiveDate) -> NaiveDate {
        match first(&self.entities.datetime) {
            Some(value) if !value.trim().is_empty() => {
                parser::parse_date(value, today)
            },
            _ => today,
        }
    }

    /// Requested period, as detected. Validity is checked when it is used.
    pub fn spend_period(&self) -> Result<String, NluError> {
        first(&self.entities.total_spent)
            .map(|period| period.trim().to_lowercase())
            .ok_or(NluError::NoPeriod)
    }

    pub fn tracking(&self) -> Tracking {
        if self.amount().is_err() {
            return Tracking::Absent;
        }

        match self.description() {
            Ok(_) => Tracking::Complete,
            Err(err) => Tracking::Partial(err),
        }
    }

    pub fn is_requesting_total(&self) -> bool {
        self.spend_period().is_ok()
    }

    /// Classify the message, tracking first.
    pub fn overview(&self) -> MessageOverview {
        match self.tracking() {
            Tracking::Partial(_) => MessageOverview::TrackingError,
            Tracking::Complete => MessageOverview::TrackingSuccess,
            Tracking::Absent if self.is_requesting_total() => {
                MessageOverview::ExpenseTotalSuccess
            },
            Tracking::Absent => MessageOverview::UnknownRequest,
        }
    }
}

/// Accept strings, numbers and booleans as a string value.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => value,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
