//! VAT payer code extraction for Lithuanian invoices.

use super::patterns::VAT_CODE;

/// Lithuanian bank codes that open a domestic account number. Used to
/// reject long digit runs that are bank accounts, not identifiers.
const BANK_CODE_PREFIXES: &[&str] = &["70440", "73000", "72300", "71800", "40100", "21400"];

/// Normalize an identifier for comparison: uppercase, no spaces.
pub fn normalize_id(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Whether a digit run is shaped like a bank account rather than a VAT
/// code: `LT` followed by a long digit run, or a run opening with a known
/// bank code. Printed IBANs group digits by four, so only four-digit
/// groups extend the run; a trailing nine-digit company code does not.
pub fn is_iban_like(run: &str) -> bool {
    let mut tokens = run.split_whitespace();
    let Some(first) = tokens.next() else {
        return false;
    };
    let first = first.to_uppercase();
    let has_lt = first.starts_with("LT");
    let body = if has_lt { &first[2..] } else { first.as_str() };
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let mut digits = body.to_string();
    for tok in tokens {
        if tok.len() == 4 && tok.chars().all(|c| c.is_ascii_digit()) {
            digits.push_str(tok);
        } else {
            break;
        }
    }

    if has_lt && digits.len() >= 14 {
        return true;
    }
    digits.len() >= 16 && BANK_CODE_PREFIXES.iter().any(|p| digits.starts_with(p))
}

/// Extract a VAT payer code from a line.
///
/// The national `LT` prefix is mandatory; a bare digit string never
/// qualifies. The caller's own VAT code is excluded, and matches that are
/// part of a bank-account digit run are rejected.
pub fn extract_vat_number(line: &str, exclude: Option<&str>) -> Option<String> {
    let excluded = exclude.map(normalize_id);

    for m in VAT_CODE.find_iter(line) {
        // Extend the match over any trailing digits/spaces to see the
        // whole run the way it is printed.
        let run: String = line[m.start()..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == ' ')
            .collect();
        if is_iban_like(&run) {
            continue;
        }

        let code = normalize_id(m.as_str());
        if excluded.as_deref() == Some(code.as_str()) {
            continue;
        }
        return Some(code);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_vat_number() {
        assert_eq!(
            extract_vat_number("PVM mokėtojo kodas: LT100001919017", None),
            Some("LT100001919017".to_string())
        );
        assert_eq!(
            extract_vat_number("PVM kodas LT 119511515", None),
            Some("LT119511515".to_string())
        );
    }

    #[test]
    fn test_bare_digits_never_match() {
        assert_eq!(extract_vat_number("kodas 119511515", None), None);
    }

    #[test]
    fn test_own_vat_excluded() {
        assert_eq!(
            extract_vat_number("PVM kodas LT119511515", Some("lt 119511515")),
            None
        );
        assert_eq!(
            extract_vat_number("LT119511515", Some("LT999999999")),
            Some("LT119511515".to_string())
        );
    }

    #[test]
    fn test_iban_rejected() {
        assert!(is_iban_like("LT60 1010 0123 4567 8901"));
        assert!(is_iban_like("7044 0600 0123 4567 89"));
        assert!(!is_iban_like("LT119511515"));
        // a VAT code followed by a company code is not an account number
        assert!(!is_iban_like("LT119511515 304123456"));
        assert_eq!(
            extract_vat_number("Sąskaita: LT6010 1001 2345 6789 01", None),
            None
        );
    }
}
