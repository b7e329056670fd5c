use serde::{Deserialize, Serialize};

use crate::nlu::MessageOverview;

/// Named dialog script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    OnboardUser,
    TrackExpense,
    GetExpenseTotal,
    ExportExpenses,
    SetCurrency,
    GenericResponse,
}

/// Response function of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Ask an unregistered user for a password.
    AskForNewPassword,
    /// Stash the proposed password and echo it back.
    ConfirmPassword,
    /// Read yes or no, create the account on yes.
    ConfirmAccount,
    SayOutro,
    ConfirmExpense,
    /// Stash the period, prompt for the password unless one is cached.
    AskForPassword,
    ValidatePassword,
    CalculateTotal,
    ExportCsv,
    UpdateCurrency,
    DefaultMessage,
}

impl Intent {
    pub fn steps(self) -> &'static [Step] {
        match self {
            Intent::OnboardUser => &[
                Step::AskForNewPassword,
                Step::ConfirmPassword,
                Step::ConfirmAccount,
                Step::SayOutro,
            ],
            Intent::TrackExpense => &[Step::ConfirmExpense],
            Intent::GetExpenseTotal => &[
                Step::AskForPassword,
                Step::ValidatePassword,
                Step::CalculateTotal,
            ],
            Intent::ExportExpenses => &[
                Step::AskForPassword,
                Step::ValidatePassword,
                Step::ExportCsv,
            ],
            Intent::SetCurrency => &[Step::UpdateCurrency],
            Intent::GenericResponse => &[Step::DefaultMessage],
        }
    }

    /// Intent hinted by the NLU, if any.
    pub fn from_overview(overview: MessageOverview) -> Option<Self> {
        match overview {
            MessageOverview::TrackingError | MessageOverview::TrackingSuccess => {
                Some(Intent::TrackExpense)
            },
            MessageOverview::ExpenseTotalSuccess => Some(Intent::GetExpenseTotal),
            MessageOverview::UnknownRequest => None,
        }
    }

    /// Intent triggered by a `/command`, if any.
    pub fn from_command(text: &str) -> Option<Self> {
        match text.split_whitespace().next()? {
            "/currency" => Some(Intent::SetCurrency),
            "/export" => Some(Intent::ExportExpenses),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_lengths() {
        assert_eq!(Intent::OnboardUser.steps().len(), 4);
        assert_eq!(Intent::TrackExpense.steps().len(), 1);
        assert_eq!(Intent::GetExpenseTotal.steps().len(), 3);
        assert_eq!(Intent::ExportExpenses.steps().len(), 3);
        assert_eq!(Intent::SetCurrency.steps().len(), 1);
        assert_eq!(Intent::GenericResponse.steps().len(), 1);
    }

    #[test]
    fn test_inference() {
        assert_eq!(
            Intent::from_overview(MessageOverview::TrackingError),
            Some(Intent::TrackExpense)
        );
        assert_eq!(
            Intent::from_overview(MessageOverview::TrackingSuccess),
            Some(Intent::TrackExpense)
        );
        assert_eq!(
            Intent::from_overview(MessageOverview::ExpenseTotalSuccess),
            Some(Intent::GetExpenseTotal)
        );
        assert_eq!(Intent::from_overview(MessageOverview::UnknownRequest), None);

        assert_eq!(Intent::from_command("/currency sgd"), Some(Intent::SetCurrency));
        assert_eq!(Intent::from_command("/export month"), Some(Intent::ExportExpenses));
        assert_eq!(Intent::from_command("/start"), None);
        assert_eq!(Intent::from_command("currency sgd"), None);
    }

    #[test]
    fn test_cached_name() {
        assert_eq!(
            serde_json::to_string(&Intent::GetExpenseTotal).unwrap(),
            "\"GetExpenseTotal\""
        );
    }
}
