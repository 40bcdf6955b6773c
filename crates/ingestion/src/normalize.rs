use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use reconap_core::{DateLocale, Money};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFieldError {
    pub code: &'static str,
    pub message: String,
}

fn field_error(code: &'static str, message: impl Into<String>) -> RowFieldError {
    RowFieldError { code, message: message.into() }
}

/// Parses a date in one of ISO 8601, `MM/DD/YYYY`, `DD/MM/YYYY`, or
/// `YYYY.MM.DD`. `NN/NN/YYYY` is ambiguous whenever both halves are ≤ 12;
/// `locale` breaks the tie (US reads it month-first, EU day-first). Forms
/// with one half > 12 are unambiguous regardless of locale.
pub fn normalize_date(raw: &str, locale: DateLocale) -> Result<NaiveDate, RowFieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(field_error("date_empty", "date is empty"));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y.%m.%d") {
        return Ok(date);
    }

    if let Some((a, b, year)) = split_slash_date(raw) {
        let year = normalize_year(year)?;
        return resolve_slash_date(a, b, year, locale, raw);
    }

    Err(field_error("date_unrecognized", format!("could not parse date {raw:?}")))
}

fn split_slash_date(raw: &str) -> Option<(u32, u32, i32)> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let a: u32 = parts[0].parse().ok()?;
    let b: u32 = parts[1].parse().ok()?;
    let year: i32 = parts[2].parse().ok()?;
    Some((a, b, year))
}

fn normalize_year(year: i32) -> Result<i32, RowFieldError> {
    if year < 100 {
        Ok(2000 + year)
    } else {
        Ok(year)
    }
}

fn resolve_slash_date(a: u32, b: u32, year: i32, locale: DateLocale, raw: &str) -> Result<NaiveDate, RowFieldError> {
    let (month, day) = if a > 12 && b <= 12 {
        (b, a)
    } else if b > 12 && a <= 12 {
        (a, b)
    } else if a <= 12 && b <= 12 {
        match locale {
            DateLocale::Us => (a, b),
            DateLocale::Eu => (b, a),
        }
    } else {
        return Err(field_error("date_unrecognized", format!("neither half of {raw:?} is a valid month")));
    };

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| field_error("date_unrecognized", format!("{raw:?} is not a calendar date")))
}

/// Strips currency symbols and thousands separators, rejects negative
/// amounts, and requires the result to have exactly two fractional digits.
pub fn normalize_amount(raw: &str) -> Result<Money, RowFieldError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(field_error("amount_empty", "amount is empty"));
    }
    let is_negative = trimmed.starts_with('-') || (trimmed.starts_with('(') && trimmed.ends_with(')'));
    let stripped: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if stripped.is_empty() {
        return Err(field_error("amount_unrecognized", format!("no digits in {raw:?}")));
    }
    if is_negative {
        return Err(field_error("amount_negative", format!("{raw:?} is negative")));
    }

    let decimal = Decimal::from_str(&stripped).map_err(|_| field_error("amount_unrecognized", format!("could not parse amount {raw:?}")))?;
    if decimal.scale() > 2 {
        return Err(field_error("amount_precision", format!("{raw:?} has more than two fractional digits")));
    }
    Ok(Money::new(decimal.round_dp(2)))
}

/// Uppercases to ISO 4217; falls back to `default_currency` when absent.
pub fn normalize_currency(raw: Option<&str>, default_currency: &str) -> Result<String, RowFieldError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(code) => {
            let upper = code.to_uppercase();
            if upper.len() != 3 || !upper.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(field_error("currency_invalid", format!("{raw:?} is not a 3-letter ISO 4217 code")));
            }
            Ok(upper)
        }
        None => Ok(default_currency.to_uppercase()),
    }
}

/// Trims, collapses internal whitespace, and strips control characters.
pub fn normalize_vendor_name(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().filter(|c| !c.is_control()).collect()
}

/// Trims but preserves case; rejects embedded control characters.
pub fn normalize_invoice_number(raw: &str) -> Result<String, RowFieldError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(field_error("invoice_number_empty", "invoice_number is empty"));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(field_error("invoice_number_invalid", format!("{raw:?} contains control characters")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_date_parses_directly() {
        assert_eq!(normalize_date("2026-01-15", DateLocale::Us).unwrap(), NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }

    #[test]
    fn dotted_date_parses() {
        assert_eq!(normalize_date("2026.01.15", DateLocale::Us).unwrap(), NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }

    #[test]
    fn unambiguous_slash_date_ignores_locale() {
        assert_eq!(normalize_date("25/01/2026", DateLocale::Us).unwrap(), NaiveDate::from_ymd_opt(2026, 1, 25).unwrap());
    }

    #[test]
    fn ambiguous_slash_date_resolves_by_locale() {
        let us = normalize_date("01/02/2026", DateLocale::Us).unwrap();
        let eu = normalize_date("01/02/2026", DateLocale::Eu).unwrap();
        assert_eq!(us, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        assert_eq!(eu, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
    }

    #[test]
    fn amount_strips_currency_symbols_and_separators() {
        assert_eq!(normalize_amount("$1,234.50").unwrap(), Money::parse("1234.50").unwrap());
    }

    #[test]
    fn amount_rejects_negative() {
        assert!(normalize_amount("-50.00").is_err());
    }

    #[test]
    fn amount_rejects_excess_precision() {
        assert!(normalize_amount("10.999").is_err());
    }

    #[test]
    fn currency_defaults_when_absent() {
        assert_eq!(normalize_currency(None, "usd").unwrap(), "USD");
    }

    #[test]
    fn currency_rejects_non_iso_code() {
        assert!(normalize_currency(Some("US"), "usd").is_err());
    }

    #[test]
    fn vendor_name_collapses_whitespace() {
        assert_eq!(normalize_vendor_name("  Acme   Supply \t Co "), "Acme Supply Co");
    }

    #[test]
    fn invoice_number_rejects_control_characters() {
        assert!(normalize_invoice_number("INV-1\u{0}").is_err());
    }
}
