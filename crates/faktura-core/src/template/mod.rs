//! Learned spatial layout templates.
//!
//! A template records, per field, where on the page a counterparty's
//! invoices carry that field's value. Coordinates are normalized to
//! `[0, 1]` so templates survive resolution changes. Templates are plain
//! serde data; persistence mechanics stay with the caller.

pub mod learner;
pub mod matcher;

pub use learner::learn_template;
pub use matcher::{match_template, parse_with_template};

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::invoice::identity::normalize_for_compare;
use crate::models::fragment::{BoundingBox, PositionedFragment};
use crate::models::invoice::FieldKey;

/// A learned region and a freshly observed one further apart than this
/// are treated as a layout change, not a refinement.
pub const OUTLIER_DISTANCE: f32 = 0.15;

/// A learned field location: a normalized box with a confidence weight
/// and the number of observations folded into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRegion {
    pub field: FieldKey,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub confidence: f32,
    pub samples: u32,
}

impl FieldRegion {
    /// Build a region, enforcing the normalized-box invariant.
    pub fn new(field: FieldKey, left: f32, top: f32, right: f32, bottom: f32) -> Result<Self> {
        let in_range = (0.0..=1.0).contains(&left)
            && (0.0..=1.0).contains(&top)
            && (0.0..=1.0).contains(&right)
            && (0.0..=1.0).contains(&bottom);
        if !in_range || left >= right || top >= bottom {
            return Err(ExtractionError::InvalidRegion {
                field: field.name().to_string(),
                reason: format!("box [{left}, {top}, {right}, {bottom}] is not a normalized box"),
            });
        }
        Ok(Self {
            field,
            left,
            top,
            right,
            bottom,
            confidence: 1.0,
            samples: 1,
        })
    }

    /// Normalize a pixel-space box against the image dimensions.
    pub fn from_pixels(
        field: FieldKey,
        bbox: &BoundingBox,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let w = width as f32;
        let h = height as f32;
        Self::new(
            field,
            (bbox.left / w).clamp(0.0, 1.0),
            (bbox.top / h).clamp(0.0, 1.0),
            (bbox.right / w).clamp(0.0, 1.0),
            (bbox.bottom / h).clamp(0.0, 1.0),
        )
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    pub fn area(&self) -> f32 {
        (self.right - self.left) * (self.bottom - self.top)
    }

    /// Layout distance between two regions: weighted center offset plus
    /// relative area difference.
    pub fn distance(&self, other: &FieldRegion) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        let center = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();

        let max_area = self.area().max(other.area());
        let area = if max_area > f32::EPSILON {
            (self.area() - other.area()).abs() / max_area
        } else {
            0.0
        };

        0.7 * center + 0.3 * area
    }

    /// Fold a new observation into this region, weighting by the number
    /// of samples already absorbed.
    pub fn absorb(&mut self, other: &FieldRegion) {
        let n = self.samples as f32;
        self.left = (self.left * n + other.left) / (n + 1.0);
        self.top = (self.top * n + other.top) / (n + 1.0);
        self.right = (self.right * n + other.right) / (n + 1.0);
        self.bottom = (self.bottom * n + other.bottom) / (n + 1.0);
        self.confidence = (self.confidence * n + other.confidence) / (n + 1.0);
        self.samples += 1;
    }

    /// The region denormalized to pixel space, padded by 10% of each
    /// image dimension, growing toward 15% as confidence drops to zero.
    pub fn padded_pixel_box(&self, width: u32, height: u32) -> BoundingBox {
        let w = width as f32;
        let h = height as f32;
        let scale = 1.0 + 0.5 * (1.0 - self.confidence.clamp(0.0, 1.0));
        let pad_x = 0.10 * w * scale;
        let pad_y = 0.10 * h * scale;
        BoundingBox::new(
            (self.left * w - pad_x).max(0.0),
            (self.top * h - pad_y).max(0.0),
            (self.right * w + pad_x).min(w),
            (self.bottom * h + pad_y).min(h),
        )
    }
}

/// A counterparty's learned page layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Template {
    pub regions: BTreeMap<FieldKey, FieldRegion>,
}

impl Template {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions ordered by descending confidence.
    pub fn by_confidence(&self) -> Vec<&FieldRegion> {
        let mut regions: Vec<&FieldRegion> = self.regions.values().collect();
        regions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        regions
    }
}

/// Templates indexed by counterparty identity keys (VAT code, company
/// number, normalized name). A template is stored under every key it was
/// learned with, so any one identifier recalls it later.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateStore {
    templates: HashMap<String, Template>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The template stored under the first key that resolves.
    pub fn find(&self, keys: &[String]) -> Option<&Template> {
        keys.iter()
            .map(|k| normalize_for_compare(k))
            .filter(|k| !k.is_empty())
            .find_map(|k| self.templates.get(&k))
    }

    /// Store a template under every supplied key.
    pub fn insert(&mut self, keys: &[String], template: Template) {
        for key in keys {
            let key = normalize_for_compare(key);
            if !key.is_empty() {
                self.templates.insert(key, template.clone());
            }
        }
    }

    /// Learn from one confirmed document and persist the updated template
    /// under every key. Returns whether anything changed. A document with
    /// no identity keys has nowhere to be filed and is skipped.
    pub fn learn(
        &mut self,
        keys: &[String],
        fragments: &[PositionedFragment],
        width: u32,
        height: u32,
        confirmed: &BTreeMap<FieldKey, String>,
    ) -> Result<bool> {
        if keys.iter().all(|k| normalize_for_compare(k).is_empty()) {
            debug!("no identity keys, discarding layout observation");
            return Ok(false);
        }
        let existing = self.find(keys);
        let Some(updated) = learn_template(fragments, width, height, confirmed, existing)? else {
            return Ok(false);
        };
        self.insert(keys, updated);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_invariant() {
        assert!(FieldRegion::new(FieldKey::Date, 0.1, 0.1, 0.4, 0.2).is_ok());
        assert!(FieldRegion::new(FieldKey::Date, 0.4, 0.1, 0.1, 0.2).is_err());
        assert!(FieldRegion::new(FieldKey::Date, 0.1, 0.1, 1.4, 0.2).is_err());
        assert!(FieldRegion::new(FieldKey::Date, 0.1, 0.2, 0.4, 0.2).is_err());
    }

    #[test]
    fn test_distance_and_absorb() {
        let a = FieldRegion::new(FieldKey::InvoiceId, 0.10, 0.10, 0.30, 0.15).unwrap();
        let far = FieldRegion::new(FieldKey::InvoiceId, 0.70, 0.70, 0.90, 0.75).unwrap();
        assert!(a.distance(&far) > OUTLIER_DISTANCE);

        let near = FieldRegion::new(FieldKey::InvoiceId, 0.12, 0.10, 0.32, 0.15).unwrap();
        assert!(a.distance(&near) <= OUTLIER_DISTANCE);

        let mut merged = a.clone();
        merged.absorb(&near);
        assert!((merged.left - 0.11).abs() < 1e-6);
        assert_eq!(merged.samples, 2);
    }

    #[test]
    fn test_store_recall_under_any_key() {
        let mut store = TemplateStore::new();
        let mut template = Template::default();
        template.regions.insert(
            FieldKey::Date,
            FieldRegion::new(FieldKey::Date, 0.1, 0.1, 0.3, 0.15).unwrap(),
        );
        store.insert(
            &["LT100001919017".to_string(), "UAB Pavyzdys".to_string()],
            template,
        );

        assert!(store.find(&["UAB \"Pavyzdys\"".to_string()]).is_some());
        assert!(store.find(&["lt100001919017".to_string()]).is_some());
        assert!(store.find(&["UAB Kitas".to_string()]).is_none());
    }

    #[test]
    fn test_template_serde_round_trip() {
        let mut template = Template::default();
        template.regions.insert(
            FieldKey::VatNumber,
            FieldRegion::new(FieldKey::VatNumber, 0.5, 0.2, 0.8, 0.25).unwrap(),
        );
        let json = serde_json::to_string(&template).unwrap();
        let back: Template = serde_json::from_str(&json).unwrap();
        assert_eq!(back.regions, template.regions);
    }
}
