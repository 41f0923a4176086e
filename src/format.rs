//! Number parsing and the currency/date formatting shared by the form
//! readouts, the preview and the PDF templates.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?)").unwrap()
});
static CURRENCY_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]{3}$").unwrap());
static LOCALE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}(?:-[A-Za-z]{4})?(?:-(?:[A-Za-z]{2}|\d{3}))?$").unwrap()
});

const NBSP: &str = "\u{a0}";
const NARROW_NBSP: &str = "\u{202f}";

/// Parses the leading decimal number of `value`, ignoring trailing garbage
/// (`"12.5kg"` is 12.5). Returns `fallback` when nothing parses or the
/// result is not finite.
pub fn parse_number(value: &str, fallback: f64) -> f64 {
    LEADING_NUMBER
        .captures(value)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(fallback)
}

/// Same contract as [`parse_number`] for an arbitrary JSON value.
pub fn number_from_value(value: &Value, fallback: f64) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()).unwrap_or(fallback),
        Value::String(s) => parse_number(s, fallback),
        _ => fallback,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grouping {
    Thousands,
    Indian,
}

#[derive(Debug, Clone, Copy)]
struct Conventions {
    grouping: Grouping,
    group_sep: &'static str,
    decimal_sep: &'static str,
    symbol_after: bool,
}

impl Conventions {
    const WESTERN: Conventions = Conventions {
        grouping: Grouping::Thousands,
        group_sep: ",",
        decimal_sep: ".",
        symbol_after: false,
    };

    fn for_locale(locale: &str) -> Self {
        let mut parts = locale.split('-');
        let language = parts.next().unwrap_or_default().to_ascii_lowercase();
        let region = parts
            .filter(|p| p.len() == 2 || (p.len() == 3 && p.chars().all(|c| c.is_ascii_digit())))
            .last()
            .map(|p| p.to_ascii_uppercase());

        if region.as_deref() == Some("IN") {
            return Conventions { grouping: Grouping::Indian, ..Self::WESTERN };
        }
        match language.as_str() {
            "de" | "es" | "it" | "nl" | "pt" | "id" | "tr" => Conventions {
                grouping: Grouping::Thousands,
                group_sep: ".",
                decimal_sep: ",",
                symbol_after: true,
            },
            "fr" => Conventions {
                grouping: Grouping::Thousands,
                group_sep: NARROW_NBSP,
                decimal_sep: ",",
                symbol_after: true,
            },
            // Unknown languages get the default locale's conventions.
            _ => Self::WESTERN,
        }
    }

    fn group(&self, integer: &str) -> String {
        let digits: Vec<char> = integer.chars().collect();
        let mut groups: Vec<String> = Vec::new();
        let mut end = digits.len();
        let mut width = 3;
        while end > 0 {
            let start = end.saturating_sub(width);
            groups.push(digits[start..end].iter().collect());
            end = start;
            if self.grouping == Grouping::Indian {
                width = 2;
            }
        }
        groups.reverse();
        groups.join(self.group_sep)
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    Some(match code {
        "INR" => "₹",
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" => "¥",
        "CNY" => "CN¥",
        "AUD" => "A$",
        "CAD" => "CA$",
        _ => return None,
    })
}

/// Formats `amount` as a two-decimal currency string for `locale`.
///
/// A malformed currency code or locale falls back to `"<amount> <code>"`,
/// an empty code to the bare amount. Non-finite amounts render as zero.
pub fn format_currency(amount: f64, currency_code: &str, locale: &str) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let code = currency_code.trim();
    if code.is_empty() {
        return format!("{amount:.2}");
    }
    if !CURRENCY_CODE.is_match(code) || !LOCALE_TAG.is_match(locale.trim()) {
        return format!("{amount:.2} {code}");
    }

    let code = code.to_ascii_uppercase();
    let conventions = Conventions::for_locale(locale.trim());
    let fixed = format!("{:.2}", amount.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let number = format!("{}{}{}", conventions.group(integer), conventions.decimal_sep, fraction);
    let negative = amount < 0.0 && fixed != "0.00";
    let sign = if negative { "-" } else { "" };

    match (currency_symbol(&code), conventions.symbol_after) {
        (Some(symbol), false) => format!("{sign}{symbol}{number}"),
        (None, false) => format!("{sign}{code}{NBSP}{number}"),
        (Some(symbol), true) => format!("{sign}{number}{NBSP}{symbol}"),
        (None, true) => format!("{sign}{number}{NBSP}{code}"),
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Renders a date as `DD/MM/YYYY` regardless of locale.
///
/// Empty input gives an empty string; anything that does not parse as a
/// date is returned unchanged rather than reported as an error.
pub fn format_date(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    match parse_date(value.trim()) {
        Some(date) => date.format("%d/%m/%Y").to_string(),
        None => value.to_string(),
    }
}
