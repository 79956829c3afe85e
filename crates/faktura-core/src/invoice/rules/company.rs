//! Company registration number extraction for Lithuanian invoices.

use super::patterns::COMPANY_CODE;
use super::vat::normalize_id;

/// Extract a company registration number from a line.
///
/// The national shape is nine digits with a leading 1-4. A match equal to
/// the digit body of an already-found VAT code is skipped (it is the same
/// identifier printed twice), as is the caller's own company number.
pub fn extract_company_number(
    line: &str,
    exclude_vat_digits: Option<&str>,
    exclude_own: Option<&str>,
) -> Option<String> {
    company_number_candidates(line)
        .into_iter()
        .find(|code| !is_excluded(code, exclude_vat_digits, exclude_own))
}

/// All company-number-shaped matches on a line, in print order.
pub fn company_number_candidates(line: &str) -> Vec<String> {
    COMPANY_CODE
        .captures_iter(line)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub(crate) fn is_excluded(
    code: &str,
    exclude_vat_digits: Option<&str>,
    exclude_own: Option<&str>,
) -> bool {
    if let Some(vat) = exclude_vat_digits {
        let vat_digits: String = vat.chars().filter(|c| c.is_ascii_digit()).collect();
        if vat_digits == code || vat_digits.starts_with(code) {
            return true;
        }
    }
    if let Some(own) = exclude_own {
        if normalize_id(own) == *code {
            return true;
        }
    }
    false
}
