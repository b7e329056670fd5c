//! Reply templates.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Placeholder substituted by [`MessageCatalog::get`].
const VAR: &str = "{{var}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    AskForNewPassword,
    ConfirmPassword,
    PasswordRejected,
    AccountCreationFailed,
    DidntUnderstand,
    Outro,
    TrackingSuccess,
    TrackingError,
    AskForPassword,
    InvalidPeriod,
    InvalidPassword,
    Cancel,
    PasswordExpired,
    ExpenseTotal,
    ExpenseTotalError,
    ExportSuccess,
    ExportError,
    CurrencyUpdated,
    InvalidCurrency,
    Default,
    GenericError,
}

fn defaults() -> HashMap<MessageKey, Vec<String>> {
    let entries: &[(MessageKey, &[&str])] = &[
        (MessageKey::AskForNewPassword, &[
            "Hi, I'm Dennis! I keep track of your expenses and encrypt them with a password only you know. Which password do you want to use?",
        ]),
        (MessageKey::ConfirmPassword, &[
            "Your password will be \"{{var}}\". Is that right? (yes/no)",
        ]),
        (MessageKey::PasswordRejected, &[
            "No problem, let's start over. Say hi whenever you are ready.",
        ]),
        (MessageKey::AccountCreationFailed, &[
            "I couldn't create your account. Answer yes to try again.",
        ]),
        (MessageKey::DidntUnderstand, &["Sorry, I didn't understand. Please answer yes or no."]),
        (MessageKey::Outro, &[
            "You're all set! Tell me things like \"20 SGD for lunch\" or ask \"how much did I spend this month?\".",
        ]),
        (MessageKey::TrackingSuccess, &["Got it, expense saved!", "Noted!", "Done, I saved it."]),
        (MessageKey::TrackingError, &[
            "I couldn't make sense of that expense. Try something like \"20 SGD for lunch\".",
        ]),
        (MessageKey::AskForPassword, &["Please enter your password.", "What's your password?"]),
        (MessageKey::InvalidPeriod, &[
            "Sorry, \"{{var}}\" is not a period I know. Try this month, this week or today.",
        ]),
        (MessageKey::InvalidPassword, &["Wrong password. Try again or say cancel."]),
        (MessageKey::Cancel, &["Okay, cancelled."]),
        (MessageKey::PasswordExpired, &["Your password expired, please ask again."]),
        (MessageKey::ExpenseTotal, &["You spent {{var}}"]),
        (MessageKey::ExpenseTotalError, &["Sorry, I couldn't calculate your total."]),
        (MessageKey::ExportSuccess, &["Here are your expenses."]),
        (MessageKey::ExportError, &["Sorry, I couldn't export your expenses."]),
        (MessageKey::CurrencyUpdated, &["Done, totals are now shown in {{var}}."]),
        (MessageKey::InvalidCurrency, &["Sorry, \"{{var}}\" is not a currency I know."]),
        (MessageKey::Default, &[
            "Sorry, I didn't get that. Tell me an expense like \"20 SGD for lunch\" or ask \"how much did I spend this week?\".",
            "Hmm, I'm not sure what you mean. Try \"5 EUR for coffee\" or \"how much did I spend today?\".",
        ]),
        (MessageKey::GenericError, &["Something went wrong on my side, please try again later."]),
    ];

    entries
        .iter()
        .map(|(key, templates)| {
            (*key, templates.iter().map(|t| (*t).to_owned()).collect())
        })
        .collect()
}

/// Mapping from [`MessageKey`] to reply templates, sampled uniformly.
pub struct MessageCatalog {
    templates: RwLock<HashMap<MessageKey, Vec<String>>>,
    rng: Mutex<StdRng>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self {
            templates: RwLock::new(defaults()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl MessageCatalog {
    /// Catalog sampling with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            templates: RwLock::new(defaults()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Replace the templates of `key`. Empty lists are ignored.
    pub fn set(&self, key: MessageKey, templates: Vec<String>) {
        if templates.is_empty() {
            return;
        }

        if let Ok(mut entries) = self.templates.write() {
            entries.insert(key, templates);
        }
    }

    /// Pick a template of `key` and substitute `var` when not empty.
    pub fn get(&self, key: MessageKey, var: &str) -> String {
        let template = {
            let Ok(entries) = self.templates.read() else {
                return String::new();
            };
            let Some(templates) = entries.get(&key) else {
                return String::new();
            };

            let picked = match self.rng.lock() {
                Ok(mut rng) => templates.choose(&mut *rng),
                Err(_) => templates.first(),
            };
            picked.cloned().unwrap_or_default()
        };

        if var.is_empty() {
            template
        } else {
            template.replace(VAR, var)
        }
    }
}
