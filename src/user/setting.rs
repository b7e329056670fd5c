//! Per-user settings.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::error::Result;
use crate::parser;

/// Display currency used when nothing is stored.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Settings of a user, created lazily on first update.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Setting {
    pub id: i64,
    pub user_id: i64,
    pub currency: String,
}

#[async_trait]
pub trait SettingRepository: Send + Sync {
    /// Create or update the display currency of `user_id`.
    async fn upsert_currency(&self, user_id: i64, currency: &str) -> Result<()>;

    async fn find_by_user(&self, user_id: i64) -> Result<Option<Setting>>;
}

#[derive(Clone)]
pub struct PostgresSettingRepository {
    pool: Pool<Postgres>,
}

impl PostgresSettingRepository {
    /// Create a new [`PostgresSettingRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingRepository for PostgresSettingRepository {
    async fn upsert_currency(&self, user_id: i64, currency: &str) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO settings (user_id, currency) VALUES ($1, $2)
                ON CONFLICT (user_id)
                DO UPDATE SET currency = EXCLUDED.currency, updated_at = NOW()"#,
        )
        .bind(user_id)
        .bind(currency)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Option<Setting>> {
        let setting = sqlx::query_as::<_, Setting>(
            r#"SELECT id, user_id, currency FROM settings WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(setting)
    }
}

/// Settings manager.
#[derive(Clone)]
pub struct SettingService {
    pub repo: Arc<dyn SettingRepository>,
}

impl SettingService {
    /// Create a new [`SettingService`].
    pub fn new(repo: Arc<dyn SettingRepository>) -> Self {
        Self { repo }
    }

    /// Validate and store the display currency, returning the normalized ISO.
    pub async fn update_currency(&self, user_id: i64, iso: &str) -> Result<String> {
        let iso = parser::parse_iso(iso)?;
        self.repo.upsert_currency(user_id, &iso).await?;

        Ok(iso)
    }

    /// Stored display currency, `USD` by default.
    pub async fn get_currency(&self, user_id: i64) -> Result<String> {
        Ok(self
            .repo
            .find_by_user(user_id)
            .await?
            .map(|setting| setting.currency)
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ServerError;
    use crate::testing::MemorySettingRepository;

    use super::*;

    #[tokio::test]
    async fn test_currency_defaults_to_usd() {
        let service = SettingService::new(Arc::new(MemorySettingRepository::default()));
        assert_eq!(service.get_currency(1).await.unwrap(), "USD");
    }

    #[tokio::test]
    async fn test_update_currency() {
        let service = SettingService::new(Arc::new(MemorySettingRepository::default()));

        assert_eq!(service.update_currency(1, "sgd").await.unwrap(), "SGD");
        assert_eq!(service.get_currency(1).await.unwrap(), "SGD");

        service.update_currency(1, "EUR").await.unwrap();
        assert_eq!(service.get_currency(1).await.unwrap(), "EUR");
        assert_eq!(service.get_currency(2).await.unwrap(), "USD");
    }

    #[tokio::test]
    async fn test_invalid_currency() {
        let service = SettingService::new(Arc::new(MemorySettingRepository::default()));

        assert!(matches!(
            service.update_currency(1, "AAA").await,
            Err(ServerError::InvalidCurrency(_))
        ));
        assert_eq!(service.get_currency(1).await.unwrap(), "USD");
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_upsert_currency(pool: Pool<Postgres>) {
        let users = crate::user::PostgresUserRepository::new(pool.clone());
        let user = crate::user::UserRepository::insert(
            &users,
            &crate::user::User {
                telegram_id: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let repo = PostgresSettingRepository::new(pool);
        repo.upsert_currency(user.id, "SGD").await.unwrap();
        repo.upsert_currency(user.id, "PHP").await.unwrap();

        let setting = repo.find_by_user(user.id).await.unwrap().unwrap();
        assert_eq!(setting.currency, "PHP");
    }
}
