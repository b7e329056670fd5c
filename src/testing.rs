//! In-memory collaborators for tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::actions::Actions;
use crate::cache::{Cache, MemoryCache};
use crate::clock::{Clock, FixedClock};
use crate::config::Argon2;
use crate::conversation::{Bot, MessageCatalog, MessageKey, Turn};
use crate::crypto::{Crypto, MIN_RSA_BITS};
use crate::error::{Result, ServerError};
use crate::expense::{DateRange, Expense, ExpenseRepository, ExpenseService};
use crate::nlu::{Entities, Entity, Nlu, NluResponse};
use crate::rates::RateProvider;
use crate::telegram::{Chat, Message, Messenger, Sender};
use crate::user::{
    Setting, SettingRepository, SettingService, User, UserRepository, UserService,
};

pub const SECRET_KEY: &str = "process secret";

/// Rate returned for pairs without an explicit one.
pub const DEFAULT_RATE: f64 = 0.7;

#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: &User) -> Result<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.telegram_id == user.telegram_id) {
            return Err(ServerError::UserExists(user.telegram_id));
        }

        let user = User {
            id: users.len() as i64 + 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..user.clone()
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.telegram_id == telegram_id && u.deleted_at.is_none())
            .cloned())
    }
}

#[derive(Default)]
pub struct MemorySettingRepository {
    settings: Mutex<HashMap<i64, Setting>>,
}

#[async_trait]
impl SettingRepository for MemorySettingRepository {
    async fn upsert_currency(&self, user_id: i64, currency: &str) -> Result<()> {
        let mut settings = self.settings.lock().unwrap();
        let id = settings.len() as i64 + 1;
        settings
            .entry(user_id)
            .and_modify(|setting| setting.currency = currency.to_owned())
            .or_insert_with(|| Setting {
                id,
                user_id,
                currency: currency.to_owned(),
            });
        Ok(())
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Option<Setting>> {
        Ok(self.settings.lock().unwrap().get(&user_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryExpenseRepository {
    expenses: Mutex<Vec<Expense>>,
}

impl MemoryExpenseRepository {
    /// Every stored row, still encrypted.
    pub fn all(&self) -> Vec<Expense> {
        self.expenses.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExpenseRepository for MemoryExpenseRepository {
    async fn insert(&self, expense: &Expense) -> Result<Expense> {
        let mut expenses = self.expenses.lock().unwrap();
        let expense = Expense {
            id: Some(expenses.len() as i64 + 1),
            ..expense.clone()
        };
        expenses.push(expense.clone());
        Ok(expense)
    }

    async fn find_in_range(&self, user_id: i64, range: DateRange) -> Result<Vec<Expense>> {
        let mut expenses: Vec<Expense> = self
            .expenses
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id && range.contains(e.date))
            .cloned()
            .collect();
        expenses.sort_by_key(|e| (e.date, e.id));
        Ok(expenses)
    }
}

/// NLU answering from a script and recording what it was asked.
#[derive(Default)]
pub struct ScriptedNlu {
    responses: Mutex<HashMap<String, NluResponse>>,
    queries: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedNlu {
    /// Make every later call sleep before answering.
    pub fn slow(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn script(&self, text: &str, response: NluResponse) {
        self.responses.lock().unwrap().insert(text.to_owned(), response);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Nlu for ScriptedNlu {
    async fn understand(&self, text: &str) -> NluResponse {
        self.queries.lock().unwrap().push(text.to_owned());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_default()
    }
}

/// Rate provider with fixed answers.
#[derive(Default)]
pub struct FixedRates {
    rates: Mutex<HashMap<(String, String), f64>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FixedRates {
    pub fn set_rate(&self, from: &str, to: &str, rate: f64) {
        self.rates
            .lock()
            .unwrap()
            .insert((from.to_owned(), to.to_owned()), rate);
    }

    /// Make every later call fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateProvider for FixedRates {
    async fn exchange_rate(&self, from: &str, to: &str) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ServerError::RateUnavailable {
                from: from.to_owned(),
                to: to.to_owned(),
            });
        }

        Ok(self
            .rates
            .lock()
            .unwrap()
            .get(&(from.to_owned(), to.to_owned()))
            .copied()
            .unwrap_or(DEFAULT_RATE))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Message(i64, String),
    Typing(i64),
    Document(i64, PathBuf),
}

/// Messenger keeping what would have been sent.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Message(chat_id, text.to_owned()));
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Typing(chat_id));
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, path: &Path) -> Result<()> {
        assert!(path.is_file(), "document must exist when sent");
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Document(chat_id, path.to_path_buf()));
        Ok(())
    }
}

pub fn light_argon2() -> Argon2 {
    Argon2 {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    }
}

/// Tracking request as the NLU would annotate it.
pub fn tracking(amount: &str, description: Option<&str>) -> NluResponse {
    NluResponse {
        text: String::new(),
        entities: Entities {
            amount: vec![Entity::new(amount)],
            description: description.map(Entity::new).into_iter().collect(),
            ..Default::default()
        },
    }
}

/// Total request for `period`.
pub fn total(period: &str) -> NluResponse {
    NluResponse {
        text: String::new(),
        entities: Entities {
            total_spent: vec![Entity::new(period)],
            ..Default::default()
        },
    }
}

/// Fully wired bot over in-memory collaborators, clock pinned to 2018-03-12.
pub struct Harness {
    pub bot: Arc<Bot>,
    pub actions: Arc<Actions>,
    pub cache: Arc<MemoryCache>,
    pub crypto: Arc<Crypto>,
    pub nlu: Arc<ScriptedNlu>,
    pub rates: Arc<FixedRates>,
    pub users: Arc<MemoryUserRepository>,
    pub expenses: Arc<MemoryExpenseRepository>,
    pub messages: Arc<MessageCatalog>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        let crypto = Arc::new(
            Crypto::new(Some(light_argon2()), SECRET_KEY, MIN_RSA_BITS).unwrap(),
        );
        let clock = Arc::new(FixedClock::at(2018, 3, 12));
        let cache = Arc::new(MemoryCache::default());
        let nlu = Arc::new(ScriptedNlu::default());
        let rates = Arc::new(FixedRates::default());
        let users = Arc::new(MemoryUserRepository::default());
        let expenses = Arc::new(MemoryExpenseRepository::default());

        // one template per key makes replies deterministic.
        let messages = Arc::new(MessageCatalog::seeded(7));
        messages.set(MessageKey::TrackingSuccess, vec!["Noted!".into()]);
        messages.set(MessageKey::AskForPassword, vec!["Please enter your password.".into()]);
        messages.set(MessageKey::Default, vec!["Sorry, I didn't get that.".into()]);

        let actions = Arc::new(
            Actions::new(
                UserService::new(users.clone(), Arc::clone(&crypto)),
                SettingService::new(Arc::new(MemorySettingRepository::default())),
                ExpenseService::new(expenses.clone(), clock.clone()),
                cache.clone(),
                rates.clone(),
                clock.clone(),
            )
            .export_dir(unique_dir()),
        );

        let bot = Arc::new(Bot::new(
            Arc::clone(&actions),
            cache.clone(),
            Arc::clone(&crypto),
            nlu.clone(),
            Arc::clone(&messages),
        ));

        Self {
            bot,
            actions,
            cache,
            crypto,
            nlu,
            rates,
            users,
            expenses,
            messages,
            clock,
        }
    }

    pub fn message(telegram_id: i64, text: &str) -> Message {
        Message {
            message_id: 1,
            date: 1520812800,
            text: Some(text.to_owned()),
            from: Some(Sender {
                id: telegram_id,
                first_name: "Test".into(),
                last_name: None,
                username: None,
            }),
            chat: Chat { id: telegram_id },
        }
    }

    /// Send `text` as `telegram_id` and wait for background work.
    pub async fn send(&self, telegram_id: i64, text: &str) -> Turn {
        let mut turn = self.bot.handle(&Self::message(telegram_id, text)).await;
        for task in turn.tasks.drain(..) {
            task.await.unwrap();
        }
        turn
    }

    pub fn reply(&self, key: MessageKey, var: &str) -> String {
        self.messages.get(key, var)
    }

    /// Ten daily expenses of 20.25 USD starting 2018-03-09, plus one on
    /// 2018-02-28 outside every period.
    pub async fn seed_expenses(&self, user: &User) {
        let key = user.public_key().unwrap();
        let dates = (9..19).map(|day| NaiveDate::from_ymd_opt(2018, 3, day).unwrap());
        for date in dates.chain(NaiveDate::from_ymd_opt(2018, 2, 28)) {
            let expense = Expense::new(user.id, date, "lunch", 20.25, 20.25, "USD")
                .encrypt(&key)
                .unwrap();
            self.actions.expenses.save(&expense).await.unwrap();
        }
    }

    /// Whether `cache` holds `key`.
    pub async fn cached(&self, key: &str) -> bool {
        self.cache.get(key).await.unwrap().is_some()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}

/// Export directory private to one harness, tests run in parallel.
fn unique_dir() -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);

    let dir = std::env::temp_dir().join(format!(
        "dennis-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
