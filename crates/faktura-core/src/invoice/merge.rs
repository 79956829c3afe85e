//! Merging per-page extraction results into one invoice.
//!
//! Multi-page documents are parsed page by page; the merge stitches the
//! page results together. Identifier fields take the first usable value in
//! priority order. Amount fields always take the last usable value, since
//! running totals repeat across pages and the final page carries the
//! figures that count.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::invoice::{Direction, ExtractedInvoice, FieldKey, OwnCompanyIdentity};

use super::parser::HeuristicParser;

/// Which page's value wins for identifier fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Header fields usually sit on the first page.
    #[default]
    PreferFirst,
    /// Some layouts repeat a corrected header on the last page.
    PreferLast,
}

const IDENTIFIER_FIELDS: [FieldKey; 5] = [
    FieldKey::InvoiceId,
    FieldKey::Date,
    FieldKey::CompanyName,
    FieldKey::VatNumber,
    FieldKey::CompanyNumber,
];

const AMOUNT_FIELDS: [FieldKey; 3] = [
    FieldKey::AmountWithoutVat,
    FieldKey::VatAmount,
    FieldKey::VatRate,
];

/// Merge per-page results into a single invoice.
///
/// Blanks left after the field-wise merge get one more chance: the pages'
/// lines are concatenated in document order and parsed as one document.
pub fn merge(
    results: &[ExtractedInvoice],
    strategy: MergeStrategy,
    own: &OwnCompanyIdentity,
    direction: Direction,
) -> ExtractedInvoice {
    let mut lines = Vec::new();
    for result in results {
        lines.extend(result.lines.iter().cloned());
    }
    let mut merged = ExtractedInvoice::with_lines(lines);

    let ordered: Vec<&ExtractedInvoice> = match strategy {
        MergeStrategy::PreferFirst => results.iter().collect(),
        MergeStrategy::PreferLast => results.iter().rev().collect(),
    };
    for key in IDENTIFIER_FIELDS {
        for result in &ordered {
            merged.fill_from(key, result);
        }
    }
    for key in AMOUNT_FIELDS {
        for result in results.iter().rev() {
            merged.fill_from(key, result);
        }
    }

    if !merged.missing_fields().is_empty() && !merged.lines.is_empty() {
        debug!(missing = ?merged.missing_fields(), "re-parsing merged pages");
        let reparsed = HeuristicParser::new()
            .with_own_identity(own.clone())
            .with_direction(direction)
            .parse(&merged.lines);
        for key in FieldKey::ALL {
            merged.fill_from(key, &reparsed);
        }
    }

    if merged.is_empty() {
        merged.message = Some("no fields could be extracted from any page".to_string());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(lines: &[&str]) -> ExtractedInvoice {
        ExtractedInvoice::with_lines(lines.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_amounts_take_last_page() {
        let mut p1 = page(&["puslapis 1"]);
        p1.amount_without_vat = Some("50.00".to_string());
        let p2 = page(&["puslapis 2"]);
        let mut p3 = page(&["puslapis 3"]);
        p3.amount_without_vat = Some("123.45".to_string());

        for strategy in [MergeStrategy::PreferFirst, MergeStrategy::PreferLast] {
            let merged = merge(
                &[p1.clone(), p2.clone(), p3.clone()],
                strategy,
                &OwnCompanyIdentity::default(),
                Direction::Unknown,
            );
            assert_eq!(merged.amount_without_vat.as_deref(), Some("123.45"));
        }
    }

    #[test]
    fn test_identifier_priority_order() {
        let mut p1 = page(&[]);
        p1.invoice_id = Some("AAA111".to_string());
        let mut p2 = page(&[]);
        p2.invoice_id = Some("BBB222".to_string());

        let first = merge(
            &[p1.clone(), p2.clone()],
            MergeStrategy::PreferFirst,
            &OwnCompanyIdentity::default(),
            Direction::Unknown,
        );
        assert_eq!(first.invoice_id.as_deref(), Some("AAA111"));

        let last = merge(
            &[p1, p2],
            MergeStrategy::PreferLast,
            &OwnCompanyIdentity::default(),
            Direction::Unknown,
        );
        assert_eq!(last.invoice_id.as_deref(), Some("BBB222"));
    }

    #[test]
    fn test_blank_values_skipped() {
        let mut p1 = page(&[]);
        p1.invoice_id = Some("  ".to_string());
        let mut p2 = page(&[]);
        p2.invoice_id = Some("BBB222".to_string());

        let merged = merge(
            &[p1, p2],
            MergeStrategy::PreferFirst,
            &OwnCompanyIdentity::default(),
            Direction::Unknown,
        );
        assert_eq!(merged.invoice_id.as_deref(), Some("BBB222"));
    }

    #[test]
    fn test_reparse_spans_page_boundary() {
        // The series and the number land on different pages; only the
        // stitched text yields the composed id.
        let p1 = page(&["Serija 25DF"]);
        let p2 = page(&["Numeris 2569"]);

        let merged = merge(
            &[p1, p2],
            MergeStrategy::PreferFirst,
            &OwnCompanyIdentity::default(),
            Direction::Unknown,
        );
        assert_eq!(merged.invoice_id.as_deref(), Some("25DF2569"));
    }

    #[test]
    fn test_all_empty_produces_message() {
        let merged = merge(
            &[page(&[]), page(&[])],
            MergeStrategy::PreferFirst,
            &OwnCompanyIdentity::default(),
            Direction::Unknown,
        );
        assert!(merged.is_empty());
        assert!(merged.message.is_some());
    }
}
