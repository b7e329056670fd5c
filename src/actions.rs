//! Verb-level operations bridging stores and external services.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveTime;
use tokio::task::JoinHandle;

use crate::cache::{CONVERSION_TTL, Cache, CachedConversion, conversion_key};
use crate::clock::Clock;
use crate::crypto::{PrivateKey, PublicKey};
use crate::error::Result;
use crate::expense::{Expense, ExpenseService};
use crate::nlu::NluResponse;
use crate::rates::RateProvider;
use crate::user::{SettingService, User, UserService};

/// Currency of every historical value.
pub const PIVOT_CURRENCY: &str = "USD";

/// `date(1)` output format, used by CSV exports.
const UNIX_DATE_FORMAT: &str = "%a %b %e %H:%M:%S UTC %Y";

const CSV_HEADER: [&str; 5] = ["date", "description", "total", "historical", "currency"];

pub struct Actions {
    pub users: UserService,
    pub settings: SettingService,
    pub expenses: ExpenseService,
    cache: Arc<dyn Cache>,
    rates: Arc<dyn RateProvider>,
    clock: Arc<dyn Clock>,
    /// Directory receiving CSV exports.
    export_dir: PathBuf,
}

impl Actions {
    /// Create a new [`Actions`].
    pub fn new(
        users: UserService,
        settings: SettingService,
        expenses: ExpenseService,
        cache: Arc<dyn Cache>,
        rates: Arc<dyn RateProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            settings,
            expenses,
            cache,
            rates,
            clock,
            export_dir: std::env::temp_dir(),
        }
    }

    /// Write CSV exports into `dir` instead of the system temp directory.
    pub fn export_dir(mut self, dir: PathBuf) -> Self {
        self.export_dir = dir;
        self
    }

    /// Assemble an expense out of an NLU response, convert it into the pivot
    /// currency, encrypt and save it.
    ///
    /// The conversion completes before the save: no expense is written when
    /// it fails.
    pub async fn create_new_expense(
        &self,
        nlu: &NluResponse,
        user_id: i64,
        key: &PublicKey,
    ) -> Result<Expense> {
        let (total, currency) = nlu.amount()?;
        let description = nlu.description()?;
        let date = nlu.date(self.clock.today());

        let historical = self.convert_currency(&currency, PIVOT_CURRENCY, total).await?;

        let expense = Expense::new(user_id, date, description, total, historical, currency)
            .encrypt(key)?;

        self.expenses.save(&expense).await
    }

    /// Run [`Actions::create_new_expense`] in the background. Failures are
    /// logged only.
    pub fn spawn_new_expense(
        self: &Arc<Self>,
        nlu: NluResponse,
        user_id: i64,
        key: PublicKey,
    ) -> JoinHandle<()> {
        let actions = Arc::clone(self);

        tokio::spawn(async move {
            match actions.create_new_expense(&nlu, user_id, &key).await {
                Ok(expense) => {
                    tracing::info!(user_id, expense_id = ?expense.id, "expense saved")
                },
                Err(err) => {
                    tracing::error!(user_id, error = %err, "expense not saved")
                },
            }
        })
    }

    /// Convert `amount` from one currency to another, through the cache.
    pub async fn convert_currency(&self, from: &str, to: &str, amount: f64) -> Result<f64> {
        if from == to {
            return Ok(amount);
        }

        let key = conversion_key(from, to);
        match self.cache.get_json::<CachedConversion>(&key).await {
            Ok(Some(conversion)) => return Ok(conversion.rate * amount),
            Ok(None) => {},
            Err(err) => {
                tracing::warn!(%key, error = %err, "cannot read cached conversion");
            },
        }

        let rate = self.rates.exchange_rate(from, to).await?;

        let conversion = CachedConversion {
            from: from.to_owned(),
            to: to.to_owned(),
            rate,
        };
        if let Err(err) = self.cache.set_json(&key, &conversion, CONVERSION_TTL).await {
            tracing::warn!(%key, error = %err, "cannot cache conversion");
        }

        Ok(rate * amount)
    }

    /// Total of `period` in the user's display currency, e.g. `"20.25 USD"`.
    pub async fn get_expense_total(
        &self,
        period: &str,
        user: &User,
        key: &PrivateKey,
    ) -> Result<String> {
        let total = self.expenses.total_by_period(period, user.id, key).await?;
        let currency = self.settings.get_currency(user.id).await?;

        let total = self.convert_currency(PIVOT_CURRENCY, &currency, total).await?;

        Ok(format!("{total:.2} {currency}"))
    }

    pub async fn create_new_user(&self, telegram_id: i64, password: &str) -> Result<User> {
        self.users.create(telegram_id, password).await
    }

    /// Store the display currency, returning the normalized code.
    pub async fn set_user_currency(&self, user_id: i64, iso: &str) -> Result<String> {
        self.settings.update_currency(user_id, iso).await
    }

    /// Write the expenses of `period` into a CSV file and return its path.
    ///
    /// Rows that do not decrypt are skipped. The caller removes the file.
    pub async fn get_expense_csv(
        &self,
        period: &str,
        user_id: i64,
        key: &PrivateKey,
    ) -> Result<PathBuf> {
        let expenses = self.expenses.query_by_period(period, user_id).await?;
        let path = self.export_dir.join(format!("{user_id}_expenses.csv"));

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(CSV_HEADER)?;

        for expense in &expenses {
            let expense = match expense.decrypt(key) {
                Ok(expense) => expense,
                Err(err) => {
                    tracing::warn!(user_id, expense_id = ?expense.id, error = %err, "expense skipped from export");
                    continue;
                },
            };

            let date = expense
                .date
                .and_time(NaiveTime::MIN)
                .format(UNIX_DATE_FORMAT)
                .to_string();
            writer.write_record([
                date.as_str(),
                expense.description.as_str(),
                expense.total.as_str(),
                expense.historical.as_str(),
                expense.currency.as_str(),
            ])?;
        }

        writer.flush()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::ServerError;
    use crate::nlu::{Entities, Entity};
    use crate::testing::Harness;

    fn tracking(amount: &str, description: &str) -> NluResponse {
        NluResponse {
            text: format!("{amount} {description}"),
            entities: Entities {
                amount: vec![Entity::new(amount)],
                description: vec![Entity::new(description)],
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_convert_currency_is_cached() {
        let harness = Harness::new();

        let converted = harness.actions.convert_currency("SGD", "USD", 20.0).await.unwrap();
        assert!((converted - 14.0).abs() < 1e-9);
        let converted = harness.actions.convert_currency("SGD", "USD", 10.0).await.unwrap();
        assert!((converted - 7.0).abs() < 1e-9);
        assert_eq!(harness.rates.calls(), 1);

        // same currency never reaches the provider.
        assert_eq!(harness.actions.convert_currency("USD", "USD", 3.5).await.unwrap(), 3.5);
        assert_eq!(harness.rates.calls(), 1);
    }

    #[tokio::test]
    async fn test_create_new_expense() {
        let harness = Harness::new();
        let user = harness.actions.create_new_user(1, "secret").await.unwrap();

        let saved = harness
            .actions
            .create_new_expense(&tracking("20 SGD", "for lunch"), user.id, &user.public_key().unwrap())
            .await
            .unwrap();

        let expense = saved.decrypt(&user.private_key("secret").unwrap()).unwrap();
        assert_eq!(expense.description, "lunch");
        assert_eq!(expense.total, "20");
        assert_eq!(expense.historical, "14");
        assert_eq!(expense.currency, "SGD");
        assert_eq!(expense.date, NaiveDate::from_ymd_opt(2018, 3, 12).unwrap());
    }

    #[tokio::test]
    async fn test_rate_failure_skips_the_save() {
        let harness = Harness::new();
        harness.rates.fail();
        let user = harness.actions.create_new_user(1, "secret").await.unwrap();

        let result = harness
            .actions
            .create_new_expense(&tracking("20 SGD", "lunch"), user.id, &user.public_key().unwrap())
            .await;

        assert!(matches!(result, Err(ServerError::RateUnavailable { .. })));
        assert!(harness.expenses.all().is_empty());
    }

    #[tokio::test]
    async fn test_expense_total_in_display_currency() {
        let harness = Harness::new();
        let user = harness.actions.create_new_user(1, "secret").await.unwrap();
        let key = user.private_key("secret").unwrap();
        harness.seed_expenses(&user).await;

        assert_eq!(
            harness.actions.get_expense_total("today", &user, &key).await.unwrap(),
            "20.25 USD"
        );

        harness.rates.set_rate("USD", "PHP", 50.0);
        harness.actions.set_user_currency(user.id, "php").await.unwrap();
        assert_eq!(
            harness.actions.get_expense_total("today", &user, &key).await.unwrap(),
            "1012.50 PHP"
        );

        let err = harness
            .actions
            .get_expense_total("decade", &user, &key)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "decade is an invalid period");
    }

    #[tokio::test]
    async fn test_expense_csv() {
        let harness = Harness::new();
        let user = harness.actions.create_new_user(1, "secret").await.unwrap();
        let key = user.private_key("secret").unwrap();
        harness.seed_expenses(&user).await;

        let path = harness.actions.get_expense_csv("week", user.id, &key).await.unwrap();
        assert!(path.ends_with(format!("{}_expenses.csv", user.id)));

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "date,description,total,historical,currency");
        assert_eq!(lines[1], "Sun Mar 11 00:00:00 UTC 2018,lunch,20.25,20.25,USD");
    }

    #[tokio::test]
    async fn test_expense_csv_skips_unreadable_rows() {
        let harness = Harness::new();
        let user = harness.actions.create_new_user(1, "secret").await.unwrap();
        let key = user.private_key("secret").unwrap();
        harness.seed_expenses(&user).await;

        let mut garbled = Expense::new(user.id, harness.clock.today(), "x", 1.0, 1.0, "USD");
        garbled.description = "bm90IGNpcGhlcnRleHQ=".into();
        harness.actions.expenses.save(&garbled).await.unwrap();

        let path = harness.actions.get_expense_csv("today", user.id, &key).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(content.lines().count(), 2);
    }
}
