//! Post-hoc field validation and match-quality scoring.

use std::collections::HashSet;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::invoice::rules::amounts::{is_valid_amount, normalize_amount};
use crate::models::invoice::{FieldKey, VatRate};

lazy_static! {
    static ref VAT_SHAPE: Regex = Regex::new(r"^(LT)?[0-9A-Z]{8,12}$").unwrap();
    static ref COMPANY_SHAPE: Regex = Regex::new(r"^[0-9]{7,14}$").unwrap();
}

const MAX_ID_LEN: usize = 100;
const MAX_NAME_LEN: usize = 200;

/// Syntactic validation of a claimed field value.
pub fn validate_field(field: FieldKey, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    match field {
        FieldKey::Date => {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
                || super::rules::extract_date(value).is_some()
        }
        FieldKey::AmountWithoutVat | FieldKey::VatAmount => normalize_amount(value)
            .map(|n| is_valid_amount(&n))
            .unwrap_or(false),
        FieldKey::VatRate => VatRate::from_str(value).is_some(),
        FieldKey::VatNumber => {
            let cleaned: String = value
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_uppercase();
            VAT_SHAPE.is_match(&cleaned)
        }
        FieldKey::CompanyNumber => {
            let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
            COMPANY_SHAPE.is_match(&cleaned)
        }
        FieldKey::InvoiceId => value.chars().count() <= MAX_ID_LEN,
        FieldKey::CompanyName => value.chars().count() <= MAX_NAME_LEN,
    }
}

/// How well a claimed value matches the OCR text it was located in.
///
/// 1.0 exact (case/trim-insensitive), 0.8 substring either direction,
/// 0.7 equal after stripping everything but alphanumerics and `.`/`,`,
/// otherwise the Jaccard similarity of the character sets.
pub fn match_quality(claimed: &str, matched: &str) -> f32 {
    let a = claimed.trim().to_lowercase();
    let b = matched.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.8;
    }

    let stripped_a = strip_punct(&a);
    let stripped_b = strip_punct(&b);
    if !stripped_a.is_empty() && stripped_a == stripped_b {
        return 0.7;
    }

    jaccard(&a, &b)
}

fn strip_punct(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || *c == '.' || *c == ',')
        .collect()
}

fn jaccard(a: &str, b: &str) -> f32 {
    let set_a: HashSet<char> = a.chars().filter(|c| !c.is_whitespace()).collect();
    let set_b: HashSet<char> = b.chars().filter(|c| !c.is_whitespace()).collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f32;
    let union = set_a.union(&set_b).count() as f32;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_field_shapes() {
        assert!(validate_field(FieldKey::Date, "2024-01-15"));
        assert!(validate_field(FieldKey::Date, "15.01.2024"));
        assert!(!validate_field(FieldKey::Date, "not a date"));

        assert!(validate_field(FieldKey::AmountWithoutVat, "1 234,56"));
        assert!(!validate_field(FieldKey::AmountWithoutVat, "0,001"));

        assert!(validate_field(FieldKey::VatNumber, "LT100001919017"));
        assert!(validate_field(FieldKey::VatNumber, "119511515"));
        assert!(!validate_field(FieldKey::VatNumber, "LT12"));

        assert!(validate_field(FieldKey::CompanyNumber, "304123456"));
        assert!(!validate_field(FieldKey::CompanyNumber, "30412"));

        assert!(validate_field(FieldKey::VatRate, "21"));
        assert!(!validate_field(FieldKey::VatRate, "23"));

        assert!(validate_field(FieldKey::CompanyName, "KESKO"));
        assert!(!validate_field(FieldKey::CompanyName, "   "));
    }

    #[test]
    fn test_match_quality_tiers() {
        assert_eq!(match_quality("UAB Pavyzdys", "uab pavyzdys"), 1.0);
        assert_eq!(match_quality("Pavyzdys", "UAB Pavyzdys"), 0.8);
        assert_eq!(match_quality("LT-100001", "LT 100001"), 0.7);

        let q = match_quality("abcdef", "abcxyz");
        assert!(q > 0.0 && q < 0.7);
    }
}
