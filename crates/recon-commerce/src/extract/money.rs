use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use super::paths::{at, first_str};

/// An amount and currency pulled out of an upstream money representation.
/// Either side may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Money {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

const AMOUNT_KEYS: [&str; 3] = ["amount", "value", "total"];
const CURRENCY_KEYS: [&str; 2] = ["currency", "currencyCode"];

/// Reads money from `value`, which may be a bare number, a numeric string, or
/// an object carrying `amount`/`value`/`total` plus `currency`/`currencyCode`.
/// Objects are followed one level deep.
///
/// `fallback_amount` is consulted when `value` yields no amount, and
/// `fallback_currency` when it yields no currency.
#[must_use]
pub fn extract_money(
    value: &Value,
    fallback_amount: Option<&Value>,
    fallback_currency: Option<&str>,
) -> Money {
    let mut money = money_from(value, 0);
    if money.amount.is_none() {
        money.amount = fallback_amount.and_then(scalar_amount);
    }
    if money.currency.is_none() {
        money.currency = fallback_currency
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
    }
    money
}

fn money_from(value: &Value, depth: u8) -> Money {
    match value {
        Value::Object(_) => {
            let currency = first_str(value, &CURRENCY_KEYS);
            let inner = AMOUNT_KEYS.iter().find_map(|key| at(value, key));
            match inner {
                Some(nested @ Value::Object(_)) if depth == 0 => {
                    let nested = money_from(nested, depth + 1);
                    Money {
                        amount: nested.amount,
                        currency: currency.or(nested.currency),
                    }
                }
                Some(scalar) => Money {
                    amount: scalar_amount(scalar),
                    currency,
                },
                None => Money {
                    amount: None,
                    currency,
                },
            }
        }
        other => Money {
            amount: scalar_amount(other),
            currency: None,
        },
    }
}

fn scalar_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let rendered = n.to_string();
            Decimal::from_str(&rendered)
                .or_else(|_| Decimal::from_scientific(&rendered))
                .ok()
        }
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Parses a human-formatted amount such as `"1 234,56"`, `"1.234,56"`,
/// `"1,234.56"`, `"1'234.56"` or `"12.50 лв."`.
///
/// When both `,` and `.` appear the later one is the decimal separator. A lone
/// comma followed by exactly three digits is a thousands separator, otherwise
/// it is a decimal comma. Repeated dots are thousands separators.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '\u{a0}' | '\u{202f}' | '\'' | '’'))
        .collect();
    let trimmed = compact
        .trim_start_matches(|c: char| !c.is_ascii_digit() && !matches!(c, '-' | '+' | '.' | ','))
        .trim_end_matches(|c: char| !c.is_ascii_digit());
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
    {
        return None;
    }

    let commas = trimmed.matches(',').count();
    let dots = trimmed.matches('.').count();
    let canonical = match (commas, dots) {
        (0, 0 | 1) => trimmed.to_string(),
        (0, _) => trimmed.replace('.', ""),
        (_, 0) => {
            let after_last = trimmed.rsplit(',').next().unwrap_or_default();
            if commas == 1 && after_last.len() != 3 {
                trimmed.replace(',', ".")
            } else {
                trimmed.replace(',', "")
            }
        }
        _ => {
            let last_comma = trimmed.rfind(',');
            let last_dot = trimmed.rfind('.');
            if last_comma > last_dot {
                trimmed.replace('.', "").replace(',', ".")
            } else {
                trimmed.replace(',', "")
            }
        }
    };
    Decimal::from_str(&canonical).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn spaced_comma_decimal_string_with_currency() {
        let money = extract_money(&json!({ "amount": "1 234,56", "currency": "BGN" }), None, None);
        assert_eq!(money.amount, Some(dec("1234.56")));
        assert_eq!(money.currency.as_deref(), Some("BGN"));
    }

    #[test]
    fn bare_number_in_object_without_currency() {
        let money = extract_money(&json!({ "amount": 1234.56 }), None, None);
        assert_eq!(money.amount, Some(dec("1234.56")));
        assert!(money.currency.is_none());
    }

    #[test]
    fn nested_total_object() {
        let money = extract_money(
            &json!({ "total": { "value": 1234.56, "currency": "BGN" } }),
            None,
            None,
        );
        assert_eq!(money.amount, Some(dec("1234.56")));
        assert_eq!(money.currency.as_deref(), Some("BGN"));
    }

    #[test]
    fn recursion_stops_after_one_level() {
        let money = extract_money(
            &json!({ "total": { "value": { "amount": 5 } } }),
            None,
            None,
        );
        assert!(money.amount.is_none());
    }

    #[test]
    fn bare_scalars() {
        assert_eq!(extract_money(&json!(12), None, None).amount, Some(dec("12")));
        assert_eq!(
            extract_money(&json!("19.90"), None, None).amount,
            Some(dec("19.90"))
        );
    }

    #[test]
    fn fallbacks_fill_missing_parts() {
        let money = extract_money(&Value::Null, Some(&json!("7,50")), Some("EUR"));
        assert_eq!(money.amount, Some(dec("7.50")));
        assert_eq!(money.currency.as_deref(), Some("EUR"));

        let money = extract_money(&json!({ "amount": "3", "currency": "BGN" }), None, Some("EUR"));
        assert_eq!(money.currency.as_deref(), Some("BGN"));
    }

    #[test]
    fn unparseable_amount_is_none() {
        assert!(extract_money(&json!("n/a"), None, None).amount.is_none());
        assert!(extract_money(&json!({ "amount": true }), None, None)
            .amount
            .is_none());
        assert!(extract_money(&json!([1, 2]), None, None).amount.is_none());
        assert!(extract_money(&json!("1-2-3"), None, None).amount.is_none());
    }

    #[test]
    fn separator_heuristics() {
        assert_eq!(parse_amount("1,234"), Some(dec("1234")));
        assert_eq!(parse_amount("12,5"), Some(dec("12.5")));
        assert_eq!(parse_amount("1.234.567"), Some(dec("1234567")));
        assert_eq!(parse_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1'234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1\u{a0}234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("-4.20"), Some(dec("-4.20")));
        assert_eq!(parse_amount("12.50 лв."), Some(dec("12.50")));
        assert_eq!(parse_amount("€ 9,99"), Some(dec("9.99")));
    }
}
