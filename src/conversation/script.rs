//! Response functions of every intent.

use crate::cache::{PASSWORD_TTL, password_key};
use crate::crypto::PrivateKey;
use crate::error::{Result, ServerError};
use crate::nlu::MessageOverview;

use super::{Bot, BotResponse, Context, Conversation, Intent, MessageKey, Outcome, Step};

/// Period exported by a bare `/export`.
const DEFAULT_EXPORT_PERIOD: &str = "month";

impl Bot {
    pub(super) async fn run(
        &self,
        step: Step,
        conversation: &mut Conversation,
        ctx: &mut Context,
    ) -> Result<Outcome> {
        match step {
            Step::AskForNewPassword => {
                Ok(Outcome::Reply(self.reply(MessageKey::AskForNewPassword, "")))
            },
            Step::ConfirmPassword => self.confirm_password(conversation, ctx),
            Step::ConfirmAccount => self.confirm_account(conversation, ctx).await,
            Step::SayOutro => Ok(Outcome::Reply(self.reply(MessageKey::Outro, ""))),
            Step::ConfirmExpense => self.confirm_expense(ctx),
            Step::AskForPassword => self.ask_for_password(conversation, ctx).await,
            Step::ValidatePassword => self.validate_password(ctx).await,
            Step::CalculateTotal => self.calculate_total(conversation, ctx).await,
            Step::ExportCsv => self.export_csv(conversation, ctx).await,
            Step::UpdateCurrency => self.update_currency(ctx).await,
            Step::DefaultMessage => Ok(Outcome::Reply(self.reply(MessageKey::Default, ""))),
        }
    }

    /// The proposed password only crosses the cache encrypted.
    fn confirm_password(
        &self,
        conversation: &mut Conversation,
        ctx: &Context,
    ) -> Result<Outcome> {
        conversation.aux_data = self.crypto.secret.encrypt(&ctx.text)?;

        Ok(Outcome::Reply(self.reply(MessageKey::ConfirmPassword, &ctx.text)))
    }

    async fn confirm_account(
        &self,
        conversation: &mut Conversation,
        ctx: &mut Context,
    ) -> Result<Outcome> {
        match ctx.text.trim().to_lowercase().as_str() {
            "no" => Ok(Outcome::End(self.reply(MessageKey::PasswordRejected, ""))),
            "yes" => {
                let password = self.crypto.secret.decrypt_to_string(&conversation.aux_data)?;

                match self.actions.create_new_user(ctx.telegram_id, &password).await {
                    Ok(user) => {
                        conversation.aux_data.clear();
                        ctx.user = Some(user);
                        Ok(Outcome::Skip)
                    },
                    Err(err) => {
                        tracing::warn!(user_id = ctx.telegram_id, error = %err, "account creation failed");
                        Ok(Outcome::Retry(self.reply(MessageKey::AccountCreationFailed, "")))
                    },
                }
            },
            _ => Ok(Outcome::Retry(self.reply(MessageKey::DidntUnderstand, ""))),
        }
    }

    fn confirm_expense(&self, ctx: &mut Context) -> Result<Outcome> {
        if ctx.nlu.overview() != MessageOverview::TrackingSuccess {
            return Ok(Outcome::Reply(self.reply(MessageKey::TrackingError, "")));
        }

        let user = ctx.user()?;
        let task = self
            .actions
            .spawn_new_expense(ctx.nlu.clone(), user.id, user.public_key()?);
        ctx.tasks.push(task);

        Ok(Outcome::Reply(self.reply(MessageKey::TrackingSuccess, "")))
    }

    async fn ask_for_password(
        &self,
        conversation: &mut Conversation,
        ctx: &Context,
    ) -> Result<Outcome> {
        let period = match conversation.intent {
            Intent::ExportExpenses => match ctx.command_argument() {
                "" => DEFAULT_EXPORT_PERIOD.to_owned(),
                argument => argument.to_lowercase(),
            },
            _ => ctx.nlu.spend_period()?,
        };

        if let Err(err) = self.actions.expenses.parse_time_period(&period) {
            tracing::debug!(user_id = ctx.telegram_id, error = %err, "period rejected");
            return Ok(Outcome::End(self.reply(MessageKey::InvalidPeriod, &period)));
        }
        conversation.aux_data = period;

        if self.cached_password(ctx.telegram_id).await?.is_some() {
            Ok(Outcome::Skip)
        } else {
            Ok(Outcome::Reply(self.reply(MessageKey::AskForPassword, "")))
        }
    }

    async fn validate_password(&self, ctx: &Context) -> Result<Outcome> {
        if self.cached_password(ctx.telegram_id).await?.is_some() {
            return Ok(Outcome::Skip);
        }

        if ctx.text == "cancel" {
            return Ok(Outcome::End(self.reply(MessageKey::Cancel, "")));
        }

        let user = ctx.user()?;
        if !self.actions.users.verify_password(user, &ctx.text).await? {
            return Ok(Outcome::Retry(self.reply(MessageKey::InvalidPassword, "")));
        }

        let sealed = self.crypto.secret.encrypt(&ctx.text)?;
        self.cache
            .set(&password_key(ctx.telegram_id), sealed, PASSWORD_TTL)
            .await?;

        Ok(Outcome::Skip)
    }

    async fn calculate_total(
        &self,
        conversation: &Conversation,
        ctx: &Context,
    ) -> Result<Outcome> {
        let user = ctx.user()?;
        let key = match self.unlock(ctx).await {
            Ok(key) => key,
            Err(ServerError::MissingPassword) => {
                return Ok(Outcome::End(self.reply(MessageKey::PasswordExpired, "")));
            },
            Err(err) => return Err(err),
        };

        match self
            .actions
            .get_expense_total(&conversation.aux_data, user, &key)
            .await
        {
            Ok(total) => Ok(Outcome::Reply(self.reply(MessageKey::ExpenseTotal, &total))),
            Err(ServerError::InvalidPeriod(period)) => {
                Ok(Outcome::Reply(self.reply(MessageKey::InvalidPeriod, &period)))
            },
            Err(err) => {
                tracing::error!(user_id = ctx.telegram_id, error = %err, "total calculation failed");
                Ok(Outcome::Reply(self.reply(MessageKey::ExpenseTotalError, "")))
            },
        }
    }

    async fn export_csv(&self, conversation: &Conversation, ctx: &Context) -> Result<Outcome> {
        let user = ctx.user()?;
        let key = match self.unlock(ctx).await {
            Ok(key) => key,
            Err(ServerError::MissingPassword) => {
                return Ok(Outcome::End(self.reply(MessageKey::PasswordExpired, "")));
            },
            Err(err) => return Err(err),
        };

        match self
            .actions
            .get_expense_csv(&conversation.aux_data, user.id, &key)
            .await
        {
            Ok(path) => Ok(Outcome::Reply(BotResponse {
                document: Some(path),
                ..self.reply(MessageKey::ExportSuccess, "")
            })),
            Err(err) => {
                tracing::error!(user_id = ctx.telegram_id, error = %err, "export failed");
                Ok(Outcome::Reply(self.reply(MessageKey::ExportError, "")))
            },
        }
    }

    async fn update_currency(&self, ctx: &Context) -> Result<Outcome> {
        let user = ctx.user()?;
        let argument = ctx.command_argument();

        match self.actions.set_user_currency(user.id, argument).await {
            Ok(iso) => Ok(Outcome::Reply(self.reply(MessageKey::CurrencyUpdated, &iso))),
            Err(ServerError::InvalidCurrency(_)) => {
                Ok(Outcome::Reply(self.reply(MessageKey::InvalidCurrency, argument)))
            },
            Err(err) => Err(err),
        }
    }

    /// Password cached after a successful prompt, in clear.
    async fn cached_password(&self, telegram_id: i64) -> Result<Option<String>> {
        let Some(sealed) = self.cache.get(&password_key(telegram_id)).await? else {
            return Ok(None);
        };

        match self.crypto.secret.decrypt_to_string(&sealed) {
            Ok(password) => Ok(Some(password)),
            Err(err) => {
                tracing::warn!(user_id = telegram_id, error = %err, "cached password unreadable");
                Ok(None)
            },
        }
    }

    /// Private key of the sender, opened with the cached password.
    async fn unlock(&self, ctx: &Context) -> Result<PrivateKey> {
        let user = ctx.user()?;
        let password = self
            .cached_password(ctx.telegram_id)
            .await?
            .ok_or(ServerError::MissingPassword)?;

        user.private_key(&password)
    }
}
