//! Amount extraction and normalization for Lithuanian invoices.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{AMOUNT_GROUPED, AMOUNT_PLAIN};

const MIN_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01
const MAX_AMOUNT: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

/// Find the first amount-shaped token in a line, as printed.
pub fn extract_amount(line: &str) -> Option<String> {
    AMOUNT_GROUPED
        .find(line)
        .or_else(|| AMOUNT_PLAIN.find(line))
        .map(|m| m.as_str().to_string())
}

/// Normalize a printed amount to a dot-decimal string.
///
/// The trailing `.`/`,` followed by 1-3 digits is the decimal separator;
/// every other separator (including spaces) is a thousands grouping and is
/// stripped.
pub fn normalize_amount(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let decimal_sep = cleaned
        .char_indices()
        .rev()
        .find(|(_, c)| *c == '.' || *c == ',')
        .filter(|(i, _)| {
            let trailing = cleaned.len() - i - 1;
            (1..=3).contains(&trailing)
                && cleaned[i + 1..].chars().all(|c| c.is_ascii_digit())
        })
        .map(|(i, _)| i);

    let normalized = match decimal_sep {
        Some(sep) => {
            let int_part: String = cleaned[..sep]
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            let frac_part = &cleaned[sep + 1..];
            if int_part.is_empty() {
                format!("0.{}", frac_part)
            } else {
                format!("{}.{}", int_part, frac_part)
            }
        }
        // No decimal part; everything else is grouping.
        None => cleaned.chars().filter(|c| c.is_ascii_digit()).collect(),
    };

    Some(normalized)
}

/// Whether a normalized amount is inside the accepted range.
pub fn is_valid_amount(s: &str) -> bool {
    match Decimal::from_str(s) {
        Ok(v) => v >= MIN_AMOUNT && v <= MAX_AMOUNT,
        Err(_) => false,
    }
}

/// Parse a printed amount into a decimal, if it normalizes and validates.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let normalized = normalize_amount(raw)?;
    if !is_valid_amount(&normalized) {
        return None;
    }
    Decimal::from_str(&normalized).ok()
}

/// Extract, normalize and validate the first amount on a line.
pub fn extract_amount_normalized(line: &str) -> Option<String> {
    let raw = extract_amount(line)?;
    let normalized = normalize_amount(&raw)?;
    is_valid_amount(&normalized).then_some(normalized)
}

/// All valid amounts on a line, normalized.
pub fn extract_all_amounts(line: &str) -> Vec<Decimal> {
    let mut found = Vec::new();
    for m in AMOUNT_GROUPED.find_iter(line).chain(AMOUNT_PLAIN.find_iter(line)) {
        if let Some(v) = parse_amount(m.as_str()) {
            if !found.contains(&v) {
                found.push(v);
            }
        }
    }
    found
}
