use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{DateRange, Expense};
use crate::error::Result;

/// Storage of [`Expense`] records. Rows stay encrypted.
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Insert [`Expense`], returning it with its identifier.
    async fn insert(&self, expense: &Expense) -> Result<Expense>;

    /// Live expenses of `user_id` whose date is in `range`.
    async fn find_in_range(&self, user_id: i64, range: DateRange) -> Result<Vec<Expense>>;
}

#[derive(Clone)]
pub struct PostgresExpenseRepository {
    pool: Pool<Postgres>,
}

impl PostgresExpenseRepository {
    /// Create a new [`PostgresExpenseRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str =
    "id, user_id, date, description, total, historical, currency, category";

#[async_trait]
impl ExpenseRepository for PostgresExpenseRepository {
    async fn insert(&self, expense: &Expense) -> Result<Expense> {
        let query = format!(
            r#"INSERT INTO expenses (user_id, date, description, total, historical, currency, category)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING {COLUMNS}"#
        );

        let expense = sqlx::query_as::<_, Expense>(&query)
            .bind(expense.user_id)
            .bind(expense.date)
            .bind(&expense.description)
            .bind(&expense.total)
            .bind(&expense.historical)
            .bind(&expense.currency)
            .bind(&expense.category)
            .fetch_one(&self.pool)
            .await?;

        Ok(expense)
    }

    async fn find_in_range(&self, user_id: i64, range: DateRange) -> Result<Vec<Expense>> {
        let (operator, boundary) = match range {
            DateRange::Since(date) => (">=", date),
            DateRange::On(date) => ("=", date),
        };

        let query = format!(
            r#"SELECT {COLUMNS} FROM expenses
                WHERE user_id = $1 AND date {operator} $2 AND deleted_at IS NULL
                ORDER BY date, id"#
        );

        let expenses = sqlx::query_as::<_, Expense>(&query)
            .bind(user_id)
            .bind(boundary)
            .fetch_all(&self.pool)
            .await?;

        Ok(expenses)
    }
}
