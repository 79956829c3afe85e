//! Applying a learned template to a new document.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::invoice::rules::{
    extract_amount_normalized, extract_company_number, extract_date, extract_vat_number,
};
use crate::invoice::validate::validate_field;
use crate::invoice::{identity, HeuristicParser};
use crate::models::fragment::{sorted_reading_order, PositionedFragment};
use crate::models::invoice::{Direction, ExtractedInvoice, FieldKey, OwnCompanyIdentity, VatRate};

use super::Template;

/// A template-read company name needs at least this much region
/// confidence; unlike heuristic candidates it skips the legal-form gate.
const NAME_CONFIDENCE_FLOOR: f32 = 0.5;

/// Read field values out of a document using the learned regions.
///
/// Regions are applied highest-confidence first and every region is
/// tried; a miss on one field never stops the rest. Values that fail
/// their field's validation are dropped.
pub fn match_template(
    template: &Template,
    fragments: &[PositionedFragment],
    width: u32,
    height: u32,
) -> Result<BTreeMap<FieldKey, String>> {
    if width == 0 || height == 0 {
        return Err(ExtractionError::InvalidDimensions { width, height });
    }

    let mut values = BTreeMap::new();
    for region in template.by_confidence() {
        let target = region.padded_pixel_box(width, height);
        let selected: Vec<PositionedFragment> = fragments
            .iter()
            .filter(|f| {
                f.bbox.as_ref().is_some_and(|b| {
                    let (cx, cy) = b.center();
                    b.intersects(&target) || target.contains_point(cx, cy)
                })
            })
            .filter(|f| !f.text.trim().is_empty())
            .cloned()
            .collect();
        if selected.is_empty() {
            continue;
        }

        let text = sorted_reading_order(&selected)
            .iter()
            .map(|f| f.text.trim())
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(value) = refine_value(region.field, &text, region.confidence) {
            debug!(field = region.field.name(), "field read from template region");
            values.insert(region.field, value);
        }
    }
    Ok(values)
}

/// Reduce the region's concatenated text to a field value.
fn refine_value(field: FieldKey, text: &str, confidence: f32) -> Option<String> {
    let value = match field {
        FieldKey::AmountWithoutVat | FieldKey::VatAmount => extract_amount_normalized(text),
        FieldKey::VatNumber => extract_vat_number(text, None),
        FieldKey::CompanyNumber => extract_company_number(text, None, None),
        FieldKey::Date => extract_date(text).map(|d| d.to_string()),
        FieldKey::VatRate => VatRate::from_str(text).map(|r| r.percent().to_string()),
        FieldKey::CompanyName => {
            if confidence < NAME_CONFIDENCE_FLOOR {
                return None;
            }
            Some(text.to_string())
        }
        FieldKey::InvoiceId => Some(text.to_string()),
    }?;
    validate_field(field, &value).then_some(value)
}

/// Extract a document using a template when one is known, with the
/// heuristic parser filling whatever the regions did not produce.
///
/// Template values win over heuristic ones, but the own-company exclusion
/// applies to them all the same.
pub fn parse_with_template(
    fragments: &[PositionedFragment],
    width: u32,
    height: u32,
    template: Option<&Template>,
    own: &OwnCompanyIdentity,
    direction: Direction,
) -> Result<ExtractedInvoice> {
    let lines: Vec<String> = sorted_reading_order(fragments)
        .iter()
        .map(|f| f.text.clone())
        .collect();
    let mut invoice = HeuristicParser::new()
        .with_own_identity(own.clone())
        .with_direction(direction)
        .with_max_name_len(200)
        .parse(&lines);

    let Some(template) = template else {
        return Ok(invoice);
    };

    let values = match_template(template, fragments, width, height)?;
    for (field, value) in values {
        if is_own_value(field, &value, own) {
            debug!(field = field.name(), "template value matches own company, dropped");
            continue;
        }
        apply_value(&mut invoice, field, value);
    }
    Ok(invoice)
}

fn is_own_value(field: FieldKey, value: &str, own: &OwnCompanyIdentity) -> bool {
    let same_id = |known: &Option<String>| {
        known
            .as_deref()
            .map(|k| {
                crate::invoice::rules::vat::normalize_id(k)
                    == crate::invoice::rules::vat::normalize_id(value)
            })
            .unwrap_or(false)
    };
    match field {
        FieldKey::CompanyName => identity::is_own_company(value, own),
        FieldKey::VatNumber => same_id(&own.vat_number),
        FieldKey::CompanyNumber => same_id(&own.company_number),
        _ => false,
    }
}

fn apply_value(invoice: &mut ExtractedInvoice, field: FieldKey, value: String) {
    match field {
        FieldKey::InvoiceId => invoice.invoice_id = Some(value),
        FieldKey::Date => invoice.date = extract_date(&value).or(invoice.date),
        FieldKey::CompanyName => invoice.company_name = Some(value),
        FieldKey::AmountWithoutVat => invoice.amount_without_vat = Some(value),
        FieldKey::VatAmount => invoice.vat_amount = Some(value),
        FieldKey::VatRate => invoice.vat_rate = VatRate::from_str(&value).or(invoice.vat_rate),
        FieldKey::VatNumber => invoice.vat_number = Some(value),
        FieldKey::CompanyNumber => invoice.company_number = Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fragment::BoundingBox;
    use crate::template::FieldRegion;

    fn frag(text: &str, left: f32, top: f32, right: f32, bottom: f32) -> PositionedFragment {
        PositionedFragment::new(text, Some(BoundingBox::new(left, top, right, bottom)))
    }

    fn template_with(field: FieldKey, l: f32, t: f32, r: f32, b: f32) -> Template {
        let mut template = Template::default();
        template
            .regions
            .insert(field, FieldRegion::new(field, l, t, r, b).unwrap());
        template
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let template = Template::default();
        assert!(match_template(&template, &[], 1000, 0).is_err());
    }

    #[test]
    fn test_region_reads_fragment() {
        let template = template_with(FieldKey::InvoiceId, 0.1, 0.1, 0.3, 0.15);
        let fragments = vec![
            frag("LS0012345", 120.0, 105.0, 290.0, 145.0),
            frag("kitur esantis tekstas", 600.0, 600.0, 900.0, 640.0),
        ];
        let values = match_template(&template, &fragments, 1000, 1000).unwrap();
        assert_eq!(values.get(&FieldKey::InvoiceId).map(String::as_str), Some("LS0012345"));
    }

    #[test]
    fn test_template_accepts_name_without_legal_form() {
        // "KESKO" carries no legal form, so the heuristics reject it; a
        // confident learned region vouches for it instead.
        let template = template_with(FieldKey::CompanyName, 0.1, 0.1, 0.4, 0.15);
        let fragments = vec![frag("KESKO", 120.0, 105.0, 350.0, 145.0)];

        let invoice = parse_with_template(
            &fragments,
            1000,
            1000,
            Some(&template),
            &OwnCompanyIdentity::default(),
            Direction::Unknown,
        )
        .unwrap();
        assert_eq!(invoice.company_name.as_deref(), Some("KESKO"));
    }

    #[test]
    fn test_low_confidence_name_rejected() {
        let mut template = template_with(FieldKey::CompanyName, 0.1, 0.1, 0.4, 0.15);
        if let Some(region) = template.regions.get_mut(&FieldKey::CompanyName) {
            region.confidence = 0.2;
        }
        let fragments = vec![frag("KESKO", 120.0, 105.0, 350.0, 145.0)];
        let values = match_template(&template, &fragments, 1000, 1000).unwrap();
        assert!(!values.contains_key(&FieldKey::CompanyName));
    }

    #[test]
    fn test_heuristics_fill_fields_without_regions() {
        let template = template_with(FieldKey::CompanyName, 0.1, 0.1, 0.4, 0.15);
        let fragments = vec![
            frag("KESKO", 120.0, 105.0, 350.0, 145.0),
            frag("Išrašymo data: 2024-03-02", 120.0, 300.0, 500.0, 340.0),
        ];
        let invoice = parse_with_template(
            &fragments,
            1000,
            1000,
            Some(&template),
            &OwnCompanyIdentity::default(),
            Direction::Unknown,
        )
        .unwrap();
        assert_eq!(invoice.company_name.as_deref(), Some("KESKO"));
        assert_eq!(
            invoice.date,
            chrono::NaiveDate::from_ymd_opt(2024, 3, 2)
        );
    }

    #[test]
    fn test_own_company_template_value_dropped() {
        let template = template_with(FieldKey::CompanyName, 0.1, 0.1, 0.4, 0.15);
        let fragments = vec![frag("UAB Ąžuolo medis", 120.0, 105.0, 350.0, 145.0)];
        let own = OwnCompanyIdentity::new(None, None, Some("UAB Ąžuolo medis".to_string()));

        let invoice = parse_with_template(
            &fragments,
            1000,
            1000,
            Some(&template),
            &own,
            Direction::Unknown,
        )
        .unwrap();
        assert_eq!(invoice.company_name, None);
    }

    #[test]
    fn test_no_template_falls_back_to_heuristics() {
        let fragments = vec![frag("Serija 25DF Nr. 002569", 100.0, 100.0, 600.0, 140.0)];
        let invoice = parse_with_template(
            &fragments,
            1000,
            1000,
            None,
            &OwnCompanyIdentity::default(),
            Direction::Unknown,
        )
        .unwrap();
        assert_eq!(invoice.invoice_id.as_deref(), Some("25DF002569"));
    }
}
