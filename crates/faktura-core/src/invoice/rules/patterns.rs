//! Common regex patterns for Lithuanian invoice extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Date patterns
    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\b"
    ).unwrap();

    // Amount patterns (Lithuanian format: 1 234,56 / 1.234,56 / 1234.56)
    pub static ref AMOUNT_GROUPED: Regex = Regex::new(
        r"\b\d{1,3}(?:[ \u{00a0}.,]\d{3})*[.,]\d{1,3}\b"
    ).unwrap();

    pub static ref AMOUNT_PLAIN: Regex = Regex::new(
        r"\b\d+[.,]\d{1,3}\b"
    ).unwrap();

    // VAT payer code: LT prefix followed by 8-12 alphanumerics.
    // A bare digit run is never a VAT code.
    pub static ref VAT_CODE: Regex = Regex::new(
        r"(?i)\bLT\s?([0-9A-Z]{8,12})\b"
    ).unwrap();

    // Company registration number: 9 digits starting with 1-4.
    pub static ref COMPANY_CODE: Regex = Regex::new(
        r"\b([1-4]\d{8})\b"
    ).unwrap();

    // Invoice series token after the series label.
    pub static ref SERIES_LABEL: Regex = Regex::new(
        r"(?i)\bserija\b"
    ).unwrap();

    pub static ref SERIES_TOKEN: Regex = Regex::new(
        r"\b([0-9A-Za-z]{2,6})\b"
    ).unwrap();

    // Invoice number token: 3-15 digits, long enough to never be a
    // day or month component.
    pub static ref NUMBER_TOKEN: Regex = Regex::new(
        r"\b(\d{3,15})\b"
    ).unwrap();

    // Fallback invoice id: "Nr." followed by an alphanumeric token.
    pub static ref INVOICE_NO_FALLBACK: Regex = Regex::new(
        r"(?i)\bnr\.?\s*:?\s*([0-9A-Za-z][0-9A-Za-z\-/]{5,})"
    ).unwrap();
}
