//! Rule-based field extractors for Lithuanian invoices.

pub mod amounts;
pub mod company;
pub mod dates;
pub mod keywords;
pub mod patterns;
pub mod vat;

pub use amounts::{
    extract_amount, extract_amount_normalized, is_valid_amount, normalize_amount, parse_amount,
};
pub use company::{company_number_candidates, extract_company_number};
pub use dates::extract_date;
pub use keywords::{has_legal_form, is_amount_in_words, is_section_label, normalize_key};
pub use vat::{extract_vat_number, is_iban_like};
