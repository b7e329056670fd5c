//! Conversation state machine.
//!
//! Every inbound message resumes the live conversation of its sender, or
//! infers a new one, then runs its intent script until a step replies. The
//! conversation is written back to the cache before the reply is sent, so
//! the next delivery of the same chat observes it.

mod intent;
mod messages;
mod script;

pub use intent::*;
pub use messages::*;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::actions::Actions;
use crate::cache::{CONVERSATION_TTL, Cache, conversation_key};
use crate::crypto::Crypto;
use crate::error::{Result, ServerError};
use crate::nlu::{Nlu, NluResponse};
use crate::telegram::Message;
use crate::user::User;

/// Step of a finished conversation.
pub const TERMINAL: i32 = -1;

/// Per-user dialog position, kept in the cache between messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub intent: Intent,
    /// Messaging-platform identifier of the user.
    pub user_id: i64,
    /// Index in the intent script, or [`TERMINAL`].
    pub step: i32,
    /// Scratch data carried across steps.
    #[serde(default)]
    pub aux_data: String,
}

impl Conversation {
    pub fn new(intent: Intent, user_id: i64) -> Self {
        Self {
            intent,
            user_id,
            step: 0,
            aux_data: String::new(),
        }
    }

    /// Whether a step is still expected.
    pub fn has_response(&self) -> bool {
        usize::try_from(self.step)
            .is_ok_and(|step| step < self.intent.steps().len())
    }

    fn current(&self) -> Option<Step> {
        usize::try_from(self.step)
            .ok()
            .and_then(|step| self.intent.steps().get(step).copied())
    }

    fn advance(&mut self) {
        self.step += 1;
        if !self.has_response() {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.step = TERMINAL;
        self.aux_data.clear();
    }
}

/// Reply to send back. Empty text means nothing is sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotResponse {
    pub text: String,
    /// File to upload after the text.
    pub document: Option<PathBuf>,
}

impl BotResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            document: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.document.is_none()
    }
}

/// Result of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to say, run the next step now.
    Skip,
    /// Reply and advance.
    Reply(BotResponse),
    /// Reply and stay on this step.
    Retry(BotResponse),
    /// Reply and terminate the conversation.
    End(BotResponse),
}

/// Data a step reads and writes while handling one message.
pub struct Context {
    pub text: String,
    pub telegram_id: i64,
    pub user: Option<User>,
    /// Empty unless the message started a conversation.
    pub nlu: NluResponse,
    /// Background work launched by steps.
    pub tasks: Vec<JoinHandle<()>>,
}

impl Context {
    pub fn new(text: impl Into<String>, telegram_id: i64, user: Option<User>) -> Self {
        Self {
            text: text.into(),
            telegram_id,
            user,
            nlu: NluResponse::default(),
            tasks: Vec::new(),
        }
    }

    /// Registered sender.
    pub fn user(&self) -> Result<&User> {
        self.user
            .as_ref()
            .ok_or(ServerError::UserNotFound(self.telegram_id))
    }

    /// Text following a `/command`.
    pub fn command_argument(&self) -> &str {
        let text = self.text.trim();
        text.split_once(char::is_whitespace)
            .map(|(_, argument)| argument.trim())
            .unwrap_or_default()
    }
}

/// Outcome of one inbound message.
pub struct Turn {
    pub reply: BotResponse,
    /// Conversation as left after the message.
    pub conversation: Conversation,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Conversation core.
pub struct Bot {
    actions: Arc<Actions>,
    cache: Arc<dyn Cache>,
    crypto: Arc<Crypto>,
    nlu: Arc<dyn Nlu>,
    messages: Arc<MessageCatalog>,
}

impl Bot {
    /// Create a new [`Bot`].
    pub fn new(
        actions: Arc<Actions>,
        cache: Arc<dyn Cache>,
        crypto: Arc<Crypto>,
        nlu: Arc<dyn Nlu>,
        messages: Arc<MessageCatalog>,
    ) -> Self {
        Self {
            actions,
            cache,
            crypto,
            nlu,
            messages,
        }
    }

    fn reply(&self, key: MessageKey, var: &str) -> BotResponse {
        BotResponse::text(self.messages.get(key, var))
    }

    /// Handle one inbound message.
    pub async fn handle(&self, message: &Message) -> Turn {
        let telegram_id = message.sender_id();
        let text = message.text.clone().unwrap_or_default();

        let user = match self.actions.users.find_by_telegram_id(telegram_id).await {
            Ok(user) => user,
            Err(err) => {
                tracing::error!(user_id = telegram_id, error = %err, "cannot load user");
                let mut conversation =
                    Conversation::new(Intent::GenericResponse, telegram_id);
                conversation.finish();

                return Turn {
                    reply: self.reply(MessageKey::GenericError, ""),
                    conversation,
                    tasks: Vec::new(),
                };
            },
        };

        let mut ctx = Context::new(text, telegram_id, user);
        let mut conversation = match self.resume(telegram_id).await {
            Some(conversation) => conversation,
            None => self.infer(&mut ctx).await,
        };

        tracing::debug!(
            user_id = telegram_id,
            intent = ?conversation.intent,
            step = conversation.step,
            "running conversation"
        );

        let reply = self.process(&mut conversation, &mut ctx).await;
        self.save(&conversation).await;

        Turn {
            reply,
            conversation,
            tasks: ctx.tasks,
        }
    }

    /// Live conversation of `telegram_id`, if any.
    async fn resume(&self, telegram_id: i64) -> Option<Conversation> {
        match self
            .cache
            .get_json::<Conversation>(&conversation_key(telegram_id))
            .await
        {
            Ok(conversation) => conversation.filter(|conversation| {
                conversation.has_response() && conversation.user_id == telegram_id
            }),
            Err(err) => {
                tracing::warn!(user_id = telegram_id, error = %err, "cannot resume conversation");
                None
            },
        }
    }

    /// Start a conversation. The NLU only sees messages of registered users
    /// that are not commands.
    async fn infer(&self, ctx: &mut Context) -> Conversation {
        let intent = if ctx.user.is_none() {
            Intent::OnboardUser
        } else if let Some(intent) = Intent::from_command(&ctx.text) {
            intent
        } else {
            ctx.nlu = self.nlu.understand(&ctx.text).await;
            Intent::from_overview(ctx.nlu.overview()).unwrap_or(Intent::GenericResponse)
        };

        Conversation::new(intent, ctx.telegram_id)
    }

    /// Run steps from the current one until a step replies.
    ///
    /// Skips advance and chain; a skip out of the last step terminates with
    /// an empty reply. Retries keep the step.
    pub async fn process(
        &self,
        conversation: &mut Conversation,
        ctx: &mut Context,
    ) -> BotResponse {
        loop {
            let Some(step) = conversation.current() else {
                conversation.finish();
                return BotResponse::default();
            };

            let outcome = match self.run(step, conversation, ctx).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(
                        user_id = ctx.telegram_id,
                        intent = ?conversation.intent,
                        step = conversation.step,
                        error = %err,
                        "conversation step failed"
                    );
                    Outcome::End(self.reply(MessageKey::GenericError, ""))
                },
            };

            match outcome {
                Outcome::Skip => {
                    conversation.advance();
                    if !conversation.has_response() {
                        return BotResponse::default();
                    }
                },
                Outcome::Reply(reply) => {
                    conversation.advance();
                    return reply;
                },
                Outcome::Retry(reply) => return reply,
                Outcome::End(reply) => {
                    conversation.finish();
                    return reply;
                },
            }
        }
    }

    async fn save(&self, conversation: &Conversation) {
        let key = conversation_key(conversation.user_id);

        let result = if conversation.has_response() {
            self.cache
                .set_json(&key, conversation, CONVERSATION_TTL)
                .await
        } else {
            self.cache.delete(&key).await
        };

        if let Err(err) = result {
            tracing::error!(
                user_id = conversation.user_id,
                error = %err,
                "cannot save conversation"
            );
        }
    }
}
