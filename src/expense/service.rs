use std::sync::Arc;

use super::{DateRange, Expense, ExpenseRepository, SpendPeriod};
use crate::clock::Clock;
use crate::crypto::PrivateKey;
use crate::error::{Result, ServerError};

/// Expense manager.
#[derive(Clone)]
pub struct ExpenseService {
    pub repo: Arc<dyn ExpenseRepository>,
    clock: Arc<dyn Clock>,
}

impl ExpenseService {
    /// Create a new [`ExpenseService`].
    pub fn new(repo: Arc<dyn ExpenseRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Insert an expense that was never saved.
    pub async fn save(&self, expense: &Expense) -> Result<Expense> {
        if let Some(id) = expense.id {
            return Err(ServerError::AlreadySaved(id));
        }

        self.repo.insert(expense).await
    }

    /// Map a period name to a date filter relative to the clock.
    pub fn parse_time_period(&self, period: &str) -> Result<DateRange> {
        let period: SpendPeriod = period.parse()?;
        Ok(period.range(self.clock.today()))
    }

    /// Encrypted expenses of `user_id` in `period`.
    pub async fn query_by_period(&self, period: &str, user_id: i64) -> Result<Vec<Expense>> {
        let range = self.parse_time_period(period)?;
        self.repo.find_in_range(user_id, range).await
    }

    /// Sum of decrypted historical values of `user_id` in `period`.
    pub async fn total_by_period(
        &self,
        period: &str,
        user_id: i64,
        key: &PrivateKey,
    ) -> Result<f64> {
        let expenses = self.query_by_period(period, user_id).await?;

        expenses.iter().try_fold(0.0, |total, expense| {
            Ok(total + expense.decrypt(key)?.historical_value()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::clock::FixedClock;
    use crate::crypto::{KeyPair, MIN_RSA_BITS};
    use crate::testing::MemoryExpenseRepository;

    fn service() -> ExpenseService {
        ExpenseService::new(
            Arc::new(MemoryExpenseRepository::default()),
            Arc::new(FixedClock::at(2018, 3, 12)),
        )
    }

    /// Ten daily expenses of 20.25 starting 2018-03-09, plus one on the
    /// last day of February.
    async fn seed(service: &ExpenseService, pair: &KeyPair) {
        let dates = (9..19).map(|day| NaiveDate::from_ymd_opt(2018, 3, day).unwrap());
        for date in dates.chain(NaiveDate::from_ymd_opt(2018, 2, 28)) {
            let expense = Expense::new(1, date, "lunch", 20.25, 20.25, "USD")
                .encrypt(&pair.public_key)
                .unwrap();
            service.save(&expense).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_period_queries() {
        let service = service();
        let pair = KeyPair::generate(MIN_RSA_BITS).unwrap();
        seed(&service, &pair).await;

        for (period, rows, total) in [("month", 10, 202.5), ("week", 8, 162.0), ("today", 1, 20.25)] {
            let expenses = service.query_by_period(period, 1).await.unwrap();
            assert_eq!(expenses.len(), rows, "{period}");

            let sum = service
                .total_by_period(period, 1, &pair.private_key)
                .await
                .unwrap();
            assert!((sum - total).abs() < 1e-9, "{period}: {sum}");
        }
    }

    #[tokio::test]
    async fn test_month_boundary_rows() {
        let service = service();
        let pair = KeyPair::generate(MIN_RSA_BITS).unwrap();
        seed(&service, &pair).await;

        let first = NaiveDate::from_ymd_opt(2018, 3, 1).unwrap();
        let expenses = service.query_by_period("month", 1).await.unwrap();
        assert_eq!(expenses.len(), 10);
        assert!(expenses.iter().all(|expense| expense.date >= first));
        assert_eq!(service.query_by_period("week", 1).await.unwrap().len(), 8);
        assert_eq!(service.query_by_period("today", 1).await.unwrap().len(), 1);
        assert!(service.query_by_period("month", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_period() {
        let service = service();
        let pair = KeyPair::generate(MIN_RSA_BITS).unwrap();

        let err = service
            .total_by_period("decade", 1, &pair.private_key)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "decade is an invalid period");
    }

    #[tokio::test]
    async fn test_wrong_key_is_a_decryption_error() {
        let service = service();
        let owner = KeyPair::generate(MIN_RSA_BITS).unwrap();
        let other = KeyPair::generate(MIN_RSA_BITS).unwrap();
        seed(&service, &owner).await;

        assert!(matches!(
            service.total_by_period("today", 1, &other.private_key).await,
            Err(ServerError::Crypto(_))
        ));
    }

    #[tokio::test]
    async fn test_save_twice_is_rejected() {
        let service = service();
        let date = NaiveDate::from_ymd_opt(2018, 3, 12).unwrap();

        let saved = service
            .save(&Expense::new(1, date, "lunch", 1.0, 1.0, "USD"))
            .await
            .unwrap();
        assert!(saved.id.is_some());
        assert!(matches!(
            service.save(&saved).await,
            Err(ServerError::AlreadySaved(_))
        ));
    }
}
