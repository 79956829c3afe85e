//! Learning field regions from confirmed extractions.
//!
//! After the user confirms the extracted values, each value is located
//! among the positioned OCR fragments and its footprint is folded into the
//! counterparty's template.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::invoice::validate::match_quality;
use crate::models::fragment::{BoundingBox, PositionedFragment};
use crate::models::invoice::FieldKey;

use super::{FieldRegion, Template, OUTLIER_DISTANCE};

/// A located value must resemble the confirmed text at least this much.
const MIN_MATCH_QUALITY: f32 = 0.5;

/// Learn an updated template from one confirmed document.
///
/// Returns `Ok(None)` when nothing changed: no value could be located, or
/// every located region was rejected as an outlier against the existing
/// template. Zero image dimensions are a contract violation.
pub fn learn_template(
    fragments: &[PositionedFragment],
    width: u32,
    height: u32,
    confirmed: &BTreeMap<FieldKey, String>,
    existing: Option<&Template>,
) -> Result<Option<Template>> {
    if width == 0 || height == 0 {
        return Err(ExtractionError::InvalidDimensions { width, height });
    }

    let mut template = existing.cloned().unwrap_or_default();
    let mut changed = false;

    for (&field, value) in confirmed {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let Some(bbox) = locate_value(fragments, value) else {
            debug!(field = field.name(), "confirmed value not located");
            continue;
        };
        let region = match FieldRegion::from_pixels(field, &bbox, width, height) {
            Ok(region) => region,
            Err(err) => {
                debug!(field = field.name(), %err, "skipping degenerate footprint");
                continue;
            }
        };

        match template.regions.get_mut(&field) {
            None => {
                template.regions.insert(field, region);
                changed = true;
            }
            Some(known) => {
                let d = known.distance(&region);
                if d > OUTLIER_DISTANCE {
                    debug!(field = field.name(), distance = d, "layout outlier, keeping region");
                } else {
                    known.absorb(&region);
                    changed = true;
                }
            }
        }
    }

    Ok(changed.then_some(template))
}

/// Locate a confirmed value among the fragments and return the union of
/// the matching boxes.
///
/// The cascade runs from strict to permissive: exact text, substring with
/// a spatial coherence filter, token coverage across distinct fragments,
/// punctuation-stripped equality, numeric equality. Whatever matched must
/// still clear the match-quality floor.
fn locate_value(fragments: &[PositionedFragment], value: &str) -> Option<BoundingBox> {
    let boxed: Vec<(&str, &BoundingBox)> = fragments
        .iter()
        .filter_map(|f| f.bbox.as_ref().map(|b| (f.text.as_str(), b)))
        .filter(|(text, _)| !text.trim().is_empty())
        .collect();
    if boxed.is_empty() {
        return None;
    }

    let matched = exact_matches(&boxed, value)
        .or_else(|| substring_matches(&boxed, value))
        .or_else(|| token_coverage_matches(&boxed, value))
        .or_else(|| stripped_matches(&boxed, value))
        .or_else(|| numeric_matches(&boxed, value))?;

    let joined = matched
        .iter()
        .map(|(text, _)| *text)
        .collect::<Vec<_>>()
        .join(" ");
    if match_quality(value, &joined) < MIN_MATCH_QUALITY {
        debug!(value, matched = %joined, "located text below quality floor");
        return None;
    }

    matched
        .iter()
        .map(|(_, b)| **b)
        .reduce(|acc, b| acc.union(&b))
}

type Match<'a> = Vec<(&'a str, &'a BoundingBox)>;

fn exact_matches<'a>(boxed: &Match<'a>, value: &str) -> Option<Match<'a>> {
    let target = value.trim().to_lowercase();
    let hits: Match<'a> = boxed
        .iter()
        .filter(|(text, _)| text.trim().to_lowercase() == target)
        .copied()
        .collect();
    (!hits.is_empty()).then_some(hits)
}

/// Substring hits, kept only when spatially coherent. Far-away stray
/// repetitions of the text stay out.
fn substring_matches<'a>(boxed: &Match<'a>, value: &str) -> Option<Match<'a>> {
    let target = value.trim().to_lowercase();
    if target.chars().count() < 3 {
        return None;
    }
    let hits: Match<'a> = boxed
        .iter()
        .filter(|(text, _)| {
            let lower = text.trim().to_lowercase();
            !lower.is_empty() && (lower.contains(&target) || target.contains(&lower))
        })
        .copied()
        .collect();
    if hits.is_empty() {
        return None;
    }
    Some(coherent_group(&hits))
}

/// Distinct fragments covering at least half of the value's tokens. The
/// hits pass through the same coherence filter as substring matches, and
/// coverage is counted over the surviving fragments only, so scattered
/// partial hits never union into an oversized region.
fn token_coverage_matches<'a>(boxed: &Match<'a>, value: &str) -> Option<Match<'a>> {
    let tokens: Vec<String> = value
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    if tokens.len() < 2 {
        return None;
    }

    let mut hits: Match<'a> = Vec::new();
    for token in &tokens {
        let found = boxed.iter().find(|(text, b)| {
            text.to_lowercase().contains(token)
                && !hits.iter().any(|(_, known)| std::ptr::eq(*known, *b))
        });
        if let Some(hit) = found {
            hits.push(*hit);
        }
    }
    if hits.is_empty() {
        return None;
    }

    let coherent = coherent_group(&hits);
    let covered = tokens
        .iter()
        .filter(|token| {
            coherent
                .iter()
                .any(|(text, _)| text.to_lowercase().contains(token.as_str()))
        })
        .count();
    (covered * 2 >= tokens.len()).then_some(coherent)
}

/// Starting from the first hit, a hit joins the group when it lies within
/// twice the average hit extent of a hit already in the group.
fn coherent_group<'a>(hits: &Match<'a>) -> Match<'a> {
    let avg_extent =
        hits.iter().map(|(_, b)| b.width().max(b.height())).sum::<f32>() / hits.len() as f32;
    let reach = 2.0 * avg_extent;
    let mut group: Match<'a> = vec![hits[0]];
    for hit in &hits[1..] {
        if group
            .iter()
            .any(|(_, kept)| kept.center_distance(hit.1) <= reach)
        {
            group.push(*hit);
        }
    }
    group
}

fn stripped_matches<'a>(boxed: &Match<'a>, value: &str) -> Option<Match<'a>> {
    let target = strip_to_alnum(value);
    if target.is_empty() {
        return None;
    }
    let hits: Match<'a> = boxed
        .iter()
        .filter(|(text, _)| strip_to_alnum(text) == target)
        .copied()
        .collect();
    (!hits.is_empty()).then_some(hits)
}

fn numeric_matches<'a>(boxed: &Match<'a>, value: &str) -> Option<Match<'a>> {
    let target = Decimal::from_str(value.trim()).ok()?;
    let tolerance = Decimal::new(1, 2);
    let hits: Match<'a> = boxed
        .iter()
        .filter(|(text, _)| {
            crate::invoice::rules::parse_amount(text)
                .map(|v| (v - target).abs() < tolerance)
                .unwrap_or(false)
        })
        .copied()
        .collect();
    (!hits.is_empty()).then_some(hits)
}

fn strip_to_alnum(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, left: f32, top: f32, right: f32, bottom: f32) -> PositionedFragment {
        PositionedFragment::new(text, Some(BoundingBox::new(left, top, right, bottom)))
    }

    fn confirm(entries: &[(FieldKey, &str)]) -> BTreeMap<FieldKey, String> {
        entries
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect()
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let result = learn_template(&[], 0, 1000, &BTreeMap::new(), None);
        assert!(matches!(
            result,
            Err(ExtractionError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_learn_new_template() {
        let fragments = vec![
            frag("LS0012345", 100.0, 100.0, 300.0, 150.0),
            frag("2024-03-02", 100.0, 200.0, 300.0, 250.0),
        ];
        let confirmed = confirm(&[
            (FieldKey::InvoiceId, "LS0012345"),
            (FieldKey::Date, "2024-03-02"),
        ]);
        let template = learn_template(&fragments, 1000, 1000, &confirmed, None)
            .unwrap()
            .unwrap();

        let region = &template.regions[&FieldKey::InvoiceId];
        assert!((region.left - 0.1).abs() < 1e-6);
        assert!((region.right - 0.3).abs() < 1e-6);
        assert_eq!(template.regions.len(), 2);
    }

    #[test]
    fn test_outlier_keeps_existing_region() {
        let mut existing = Template::default();
        existing.regions.insert(
            FieldKey::InvoiceId,
            FieldRegion::new(FieldKey::InvoiceId, 0.10, 0.10, 0.30, 0.15).unwrap(),
        );

        // The same value now shows up in the opposite page corner.
        let fragments = vec![frag("LS0012345", 700.0, 700.0, 900.0, 750.0)];
        let confirmed = confirm(&[(FieldKey::InvoiceId, "LS0012345")]);
        let result =
            learn_template(&fragments, 1000, 1000, &confirmed, Some(&existing)).unwrap();

        assert!(result.is_none());
        let region = &existing.regions[&FieldKey::InvoiceId];
        assert!((region.left - 0.10).abs() < 1e-6);
    }

    #[test]
    fn test_repeat_observation_absorbed() {
        let fragments = vec![frag("LS0012345", 100.0, 100.0, 300.0, 150.0)];
        let confirmed = confirm(&[(FieldKey::InvoiceId, "LS0012345")]);
        let first = learn_template(&fragments, 1000, 1000, &confirmed, None)
            .unwrap()
            .unwrap();

        let shifted = vec![frag("LS0012399", 120.0, 100.0, 320.0, 150.0)];
        let confirmed = confirm(&[(FieldKey::InvoiceId, "LS0012399")]);
        let second = learn_template(&shifted, 1000, 1000, &confirmed, Some(&first))
            .unwrap()
            .unwrap();

        let region = &second.regions[&FieldKey::InvoiceId];
        assert_eq!(region.samples, 2);
        assert!((region.left - 0.11).abs() < 1e-6);
    }

    #[test]
    fn test_value_split_across_fragments() {
        let fragments = vec![
            frag("UAB", 100.0, 100.0, 160.0, 130.0),
            frag("Ąžuolo", 170.0, 100.0, 280.0, 130.0),
            frag("medis", 290.0, 100.0, 380.0, 130.0),
        ];
        let confirmed = confirm(&[(FieldKey::CompanyName, "UAB Ąžuolo medis")]);
        let template = learn_template(&fragments, 1000, 1000, &confirmed, None)
            .unwrap()
            .unwrap();

        let region = &template.regions[&FieldKey::CompanyName];
        assert!((region.left - 0.10).abs() < 1e-6);
        assert!((region.right - 0.38).abs() < 1e-6);
    }

    #[test]
    fn test_scattered_token_hits_not_unioned() {
        // Each distant fragment carries part of the name; unioning them
        // would learn a near-full-page region.
        let fragments = vec![
            frag("Ąžuolo gatvė 5", 10.0, 10.0, 200.0, 40.0),
            frag("medis UAB", 860.0, 950.0, 995.0, 990.0),
        ];
        let confirmed = confirm(&[(FieldKey::CompanyName, "UAB Ąžuolo medis")]);
        let result = learn_template(&fragments, 1000, 1000, &confirmed, None).unwrap();

        if let Some(template) = result {
            let region = &template.regions[&FieldKey::CompanyName];
            assert!(region.left > 0.5, "distant hits must not be unioned");
            assert!(region.top > 0.5, "distant hits must not be unioned");
        }
    }

    #[test]
    fn test_unlocated_value_is_no_change() {
        let fragments = vec![frag("visai kitas tekstas", 10.0, 10.0, 200.0, 40.0)];
        let confirmed = confirm(&[(FieldKey::InvoiceId, "LS0012345")]);
        let result = learn_template(&fragments, 1000, 1000, &confirmed, None).unwrap();
        assert!(result.is_none());
    }
}
