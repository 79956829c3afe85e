//! Lithuanian label vocabulary for field recognition.
//!
//! The tables map each target field to its label synonyms, with
//! diacritic-less variants included because OCR output frequently drops
//! Lithuanian diacritics. Keywords only decide which extractor to try on a
//! line; values are never taken from the keyword itself.

use crate::models::invoice::{FieldKey, Section};

pub const VAT_NUMBER_LABELS: &[&str] = &[
    "pvm mokėtojo kodas",
    "pvm moketojo kodas",
    "pvm mok. kodas",
    "pvm kodas",
];

pub const COMPANY_NUMBER_LABELS: &[&str] = &[
    "įmonės kodas",
    "imones kodas",
    "juridinio asmens kodas",
    "reg. kodas",
    "į.k.",
    "i.k.",
];

pub const INVOICE_ID_LABELS: &[&str] = &[
    "serija",
    "sąskaitos nr",
    "saskaitos nr",
    "sąskaita faktūra",
    "saskaita faktura",
    "faktūros nr",
    "fakturos nr",
];

pub const DATE_LABELS: &[&str] = &["išrašymo data", "israsymo data", "data"];

pub const NET_AMOUNT_LABELS: &[&str] = &[
    "suma be pvm",
    "be pvm",
    "apmokestinamoji vertė",
    "apmokestinamoji verte",
    "tarpinė suma",
    "tarpine suma",
];

pub const VAT_AMOUNT_LABELS: &[&str] = &[
    "pvm suma",
    "pvm (21",
    "pvm 21",
    "pvm 9",
    "pvm 5",
];

pub const SELLER_KEYWORDS: &[&str] = &[
    "pardavėjas",
    "pardavejas",
    "tiekėjas",
    "tiekejas",
    "paslaugų teikėjas",
    "paslaugu teikejas",
];

pub const BUYER_KEYWORDS: &[&str] = &[
    "pirkėjas",
    "pirkejas",
    "gavėjas",
    "gavejas",
    "mokėtojas",
    "moketojas",
    "užsakovas",
    "uzsakovas",
];

/// The word that introduces a company registration number. Counted only
/// when not part of a longer label (VAT code, postal code).
pub const CODE_WORD: &str = "kodas";

const CODE_WORD_EXCLUSIONS: &[&str] =
    &["pvm", "mokėtojo", "moketojo", "mok.", "pašto", "pasto"];

/// Legal-form abbreviations matched case-insensitively as whole tokens.
pub const LEGAL_FORM_TOKENS: &[&str] = &[
    "uab", "všį", "vsi", "iį", "mb", "tūb", "kūb", "žūb", "zūb",
    "ltd", "llc", "inc", "gmbh", "sia", "oü",
];

/// Short ambiguous legal forms accepted only when printed in uppercase.
pub const LEGAL_FORM_UPPER: &[&str] = &["AB", "AS", "OY"];

/// Legal-form tokens stripped during identity normalization. The input is
/// already lowercased and diacritic-folded at that point, so the folded
/// variants of every token above must appear here.
pub const LEGAL_FORM_STRIP: &[&str] = &[
    "uab", "vsi", "ii", "mb", "tub", "kub", "zub",
    "ltd", "llc", "inc", "gmbh", "sia", "ou",
    "ab", "as", "oy",
];

/// Amount-in-words vocabulary. A candidate company-name line containing
/// both a euro word and a cent word is spelled-out money, not a name.
pub const EURO_WORDS: &[&str] = &["eurai", "eurų", "euru", "euras"];
pub const CENT_WORDS: &[&str] = &["centai", "centų", "centu", "centas", "ct"];

/// Keywords marking the totals area of the document.
pub const TOTAL_KEYWORDS: &[&str] = &[
    "iš viso", "is viso", "viso", "mokėti", "moketi", "suma", "eur", "€",
];

/// Invoice vocabulary that disqualifies a company-name candidate.
pub const INVOICE_VOCAB: &[&str] = &["sąskaita", "saskaita", "faktūra", "faktura"];

pub const NUMBER_LABELS: &[&str] = &["numeris", "nr"];

/// Resolve which field a line is declaring, if any.
///
/// The most specific label families are checked first so that
/// "PVM mokėtojo kodas" never resolves as a bare company code.
pub fn normalize_key(line: &str) -> Option<FieldKey> {
    let lower = line.to_lowercase();
    let contains_any = |labels: &[&str]| labels.iter().any(|l| lower.contains(l));

    if contains_any(VAT_NUMBER_LABELS) {
        return Some(FieldKey::VatNumber);
    }
    if contains_any(VAT_AMOUNT_LABELS) {
        return Some(FieldKey::VatAmount);
    }
    if contains_any(NET_AMOUNT_LABELS) {
        return Some(FieldKey::AmountWithoutVat);
    }
    if contains_any(COMPANY_NUMBER_LABELS) {
        return Some(FieldKey::CompanyNumber);
    }
    if contains_any(INVOICE_ID_LABELS) {
        return Some(FieldKey::InvoiceId);
    }
    if contains_any(SELLER_KEYWORDS) || contains_any(BUYER_KEYWORDS) {
        return Some(FieldKey::CompanyName);
    }
    if contains_any(DATE_LABELS) {
        return Some(FieldKey::Date);
    }
    None
}

/// Whether the line carries the bare "kodas" label introducing a company
/// registration number.
pub fn has_company_code_label(line: &str) -> Option<usize> {
    let lower = line.to_lowercase();
    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find(CODE_WORD) {
        let pos = search_from + rel;
        let prefix = &lower[..pos];
        let excluded = CODE_WORD_EXCLUSIONS
            .iter()
            .any(|w| prefix.trim_end().ends_with(w));
        if !excluded {
            return Some(pos);
        }
        search_from = pos + CODE_WORD.len();
    }
    None
}

/// Which buyer/seller section a line mentions; when it mentions both,
/// the earlier occurrence wins.
pub fn line_section(line: &str) -> Option<Section> {
    let lower = line.to_lowercase();
    let seller = SELLER_KEYWORDS.iter().filter_map(|k| lower.find(k)).min();
    let buyer = BUYER_KEYWORDS.iter().filter_map(|k| lower.find(k)).min();
    match (seller, buyer) {
        (Some(s), Some(b)) if s <= b => Some(Section::Seller),
        (Some(_), Some(_)) => Some(Section::Buyer),
        (Some(_), None) => Some(Section::Seller),
        (None, Some(_)) => Some(Section::Buyer),
        (None, None) => None,
    }
}

/// Whether the line is nothing but a buyer/seller section header.
pub fn is_section_label(line: &str) -> bool {
    let trimmed = line
        .trim()
        .trim_matches(|c: char| c == ':' || c == '.' || c.is_whitespace())
        .to_lowercase();
    if trimmed.is_empty() || trimmed.chars().count() > 30 {
        return false;
    }
    SELLER_KEYWORDS
        .iter()
        .chain(BUYER_KEYWORDS.iter())
        .any(|k| trimmed == *k || (trimmed.starts_with(k) && trimmed.len() <= k.len() + 4))
}

/// Whether the text contains a recognized legal-form token.
pub fn has_legal_form(text: &str) -> bool {
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        let lower = raw.to_lowercase();
        if LEGAL_FORM_TOKENS.contains(&lower.as_str()) {
            return true;
        }
        if LEGAL_FORM_UPPER.contains(&raw) {
            return true;
        }
    }
    false
}

/// Amount-in-words heuristic: the line spells out euros and cents.
pub fn is_amount_in_words(line: &str) -> bool {
    let lower = line.to_lowercase();
    let has_euro = EURO_WORDS.iter().any(|w| lower.contains(w));
    let has_cent = CENT_WORDS.iter().any(|w| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|tok| tok == *w)
            || (w.len() > 2 && lower.contains(w))
    });
    has_euro && has_cent
}
