//! Parsers turning free text into amounts, currencies, descriptions and dates.

use std::sync::LazyLock;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use regex_lite::Regex;

use crate::error::{Result, ServerError};

/// Fiat ISO 4217 codes followed by major crypto-currencies.
const CURRENCIES: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN",
    "BAM", "BBD", "BDT", "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BRL",
    "BSD", "BTN", "BWP", "BYN", "BZD", "CAD", "CDF", "CHF", "CLP", "CNY",
    "COP", "CRC", "CUP", "CVE", "CZK", "DJF", "DKK", "DOP", "DZD", "EGP",
    "ERN", "ETB", "EUR", "FJD", "FKP", "GBP", "GEL", "GHS", "GIP", "GMD",
    "GNF", "GTQ", "GYD", "HKD", "HNL", "HRK", "HTG", "HUF", "IDR", "ILS",
    "INR", "IQD", "IRR", "ISK", "JMD", "JOD", "JPY", "KES", "KGS", "KHR",
    "KMF", "KPW", "KRW", "KWD", "KYD", "KZT", "LAK", "LBP", "LKR", "LRD",
    "LSL", "LYD", "MAD", "MDL", "MGA", "MKD", "MMK", "MNT", "MOP", "MRU",
    "MUR", "MVR", "MWK", "MXN", "MYR", "MZN", "NAD", "NGN", "NIO", "NOK",
    "NPR", "NZD", "OMR", "PAB", "PEN", "PGK", "PHP", "PKR", "PLN", "PYG",
    "QAR", "RON", "RSD", "RUB", "RWF", "SAR", "SBD", "SCR", "SDG", "SEK",
    "SGD", "SHP", "SLL", "SOS", "SRD", "SSP", "STN", "SYP", "SZL", "THB",
    "TJS", "TMT", "TND", "TOP", "TRY", "TTD", "TWD", "TZS", "UAH", "UGX",
    "USD", "UYU", "UZS", "VES", "VND", "VUV", "WST", "XAF", "XCD", "XOF",
    "XPF", "YER", "ZAR", "ZMW", "ZWL",
    // crypto.
    "BTC", "ETH", "LTC", "XRP", "BCH", "XMR", "DASH", "ZEC", "DOGE", "ADA",
    "DOT", "SOL", "USDT", "USDC",
];

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]+").expect("currency word pattern is valid"));

const DATE_FORMATS: &[&str] =
    &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// Whether `iso` is a supported currency code, as is.
fn is_currency(iso: &str) -> bool {
    CURRENCIES.contains(&iso)
}

/// Validate and normalize a currency code: `" php "` gives `"PHP"`.
pub fn parse_iso(input: &str) -> Result<String> {
    let iso: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if is_currency(&iso) {
        Ok(iso)
    } else {
        Err(ServerError::InvalidCurrency(input.trim().to_owned()))
    }
}

/// Parse `"<number><ISO>"` or `"<number> <ISO>"`.
///
/// Returns `(0, ISO)` when only the currency is readable, `(number, "")` on
/// a bare number and `(0, "")` otherwise.
pub fn parse_amount(input: &str) -> (f64, String) {
    let input = input.to_uppercase();

    let iso = WORD
        .find_iter(&input)
        .map(|m| m.as_str())
        .find(|word| is_currency(word));

    let numeric = |text: &str| -> Option<f64> {
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();
        cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
    };

    match iso {
        Some(iso) => {
            let rest = input.replacen(iso, "", 1);
            (numeric(&rest).unwrap_or_default(), iso.to_owned())
        },
        None => match numeric(&input) {
            Some(amount) => (amount, String::new()),
            None => (0.0, String::new()),
        },
    }
}

/// Strip a leading `for ` from a description.
pub fn parse_description(input: &str) -> String {
    let trimmed = input.trim();

    match trimmed.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("for ") => {
            trimmed[4..].trim_start().to_owned()
        },
        _ => trimmed.to_owned(),
    }
}

/// Parse a date out of free text, token by token.
///
/// The first token that reads as a date wins; `yesterday` is `today - 1`;
/// anything else is `today`.
pub fn parse_date(input: &str, today: NaiveDate) -> NaiveDate {
    for token in input.split_whitespace() {
        let lowered = token.to_lowercase();
        match lowered.as_str() {
            "yesterday" => {
                return today.checked_sub_days(Days::new(1)).unwrap_or(today);
            },
            "today" => return today,
            _ => {},
        }

        if let Some(date) = parse_date_token(token) {
            return date;
        }
    }

    today
}

fn parse_date_token(token: &str) -> Option<NaiveDate> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(token) {
        return Some(datetime.date_naive());
    }

    if let Ok(datetime) =
        NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f")
    {
        return Some(datetime.date());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
}
