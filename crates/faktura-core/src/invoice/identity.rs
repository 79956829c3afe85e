//! Company identity normalization and fuzzy comparison.
//!
//! Used to keep the caller's own company out of every extracted
//! counterparty field. The comparison is deliberately permissive: a false
//! exclusion loses one field, a false inclusion leaks the user's own
//! identity into the bookkeeping.

use crate::invoice::rules::keywords::LEGAL_FORM_STRIP;
use crate::models::invoice::OwnCompanyIdentity;

/// Fold a Lithuanian accented letter to its base Latin letter, lowercased.
fn fold_char(c: char) -> char {
    match c.to_lowercase().next().unwrap_or(c) {
        'ą' => 'a',
        'č' => 'c',
        'ę' | 'ė' => 'e',
        'į' => 'i',
        'š' => 's',
        'ų' | 'ū' => 'u',
        'ž' => 'z',
        other => other,
    }
}

/// Normalize a company name for equality comparison.
///
/// Trims, strips quotes and punctuation, folds diacritics, lowercases,
/// drops legal-form tokens as whole words and collapses whitespace.
/// Idempotent: normalizing a normalized name is a no-op.
pub fn normalize_for_compare(name: &str) -> String {
    let folded: String = name.chars().map(fold_char).collect();
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|tok| !tok.is_empty())
        .filter(|tok| !LEGAL_FORM_STRIP.contains(tok))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether two names refer to the same company.
///
/// Equal under normalization, or (when both are at least five characters
/// normalized) one contains the other. The substring rule tolerates a name
/// recorded with or without its legal suffix or an appended identifier.
/// Not transitive by design.
pub fn is_same_company(a: &str, b: &str) -> bool {
    let na = normalize_for_compare(a);
    let nb = normalize_for_compare(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na == nb {
        return true;
    }
    na.chars().count() >= 5
        && nb.chars().count() >= 5
        && (na.contains(&nb) || nb.contains(&na))
}

/// Whether a candidate name is the caller's own company.
pub fn is_own_company(candidate: &str, own: &OwnCompanyIdentity) -> bool {
    own.name
        .as_deref()
        .map(|own_name| is_same_company(candidate, own_name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_strips_legal_form_and_quotes() {
        assert_eq!(normalize_for_compare("UAB \"Ąžuolas\""), "azuolas");
        assert_eq!(normalize_for_compare("„Statyba“, AB"), "statyba");
        assert_eq!(normalize_for_compare("  Pavyzdys   LTD "), "pavyzdys");
    }

    #[test]
    fn test_normalize_idempotent() {
        for name in ["UAB \"Ąžuolas\"", "Šviesos namai, MB", "plain name"] {
            let once = normalize_for_compare(name);
            assert_eq!(normalize_for_compare(&once), once);
        }
    }

    #[test]
    fn test_same_company_substring() {
        assert!(is_same_company("UAB Ąžuolo medis", "Ąžuolo medis"));
        assert!(is_same_company("Ąžuolo medis 304123456", "UAB Ąžuolo medis"));
        // below the 5-char floor, only exact matches count
        assert!(is_same_company("UAB Ole", "Ole"));
        assert!(!is_same_company("UAB Ole", "Olegas"));
    }

    #[test]
    fn test_different_companies() {
        assert!(!is_same_company("UAB Ąžuolas", "UAB Beržas"));
        assert!(!is_same_company("", "UAB Beržas"));
    }
}
