//! Positioned text fragments produced by an OCR backend.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Get the center point of the box.
    pub fn center(&self) -> (f32, f32) {
        ((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Euclidean distance between box centers.
    pub fn center_distance(&self, other: &BoundingBox) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.top <= other.bottom
            && other.top <= self.bottom
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// A piece of recognized text with an optional position on the page.
///
/// A single field value may be split across several fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionedFragment {
    /// Recognized text content.
    pub text: String,

    /// Bounding box, when the OCR backend reports positions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl PositionedFragment {
    pub fn new(text: impl Into<String>, bbox: Option<BoundingBox>) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// Sort fragments into reading order: rows top-to-bottom, then left-to-right
/// within a row. Fragments without a box keep their input order at the end.
pub fn sorted_reading_order(fragments: &[PositionedFragment]) -> Vec<&PositionedFragment> {
    let mut boxed: Vec<(&BoundingBox, &PositionedFragment)> = fragments
        .iter()
        .filter_map(|f| f.bbox.as_ref().map(|b| (b, f)))
        .collect();

    // Row height for grouping: half the average fragment height.
    let avg_height = if boxed.is_empty() {
        0.0
    } else {
        boxed.iter().map(|(b, _)| b.height()).sum::<f32>() / boxed.len() as f32
    };
    let row_height = (avg_height / 2.0).max(1.0);

    boxed.sort_by(|(ba, _), (bb, _)| {
        let row_a = (ba.top / row_height) as i32;
        let row_b = (bb.top / row_height) as i32;
        row_a.cmp(&row_b).then(
            ba.left
                .partial_cmp(&bb.left)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });

    let mut ordered: Vec<&PositionedFragment> = boxed.into_iter().map(|(_, f)| f).collect();
    ordered.extend(fragments.iter().filter(|f| f.bbox.is_none()));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 20.0, 12.0);
        let u = a.union(&b);
        assert_eq!(u, BoundingBox::new(0.0, 0.0, 20.0, 12.0));
        assert!(a.intersects(&b));

        let c = BoundingBox::new(30.0, 30.0, 40.0, 40.0);
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_reading_order() {
        let frags = vec![
            PositionedFragment::new("right", Some(BoundingBox::new(100.0, 10.0, 150.0, 22.0))),
            PositionedFragment::new("below", Some(BoundingBox::new(10.0, 50.0, 60.0, 62.0))),
            PositionedFragment::new("left", Some(BoundingBox::new(10.0, 11.0, 60.0, 23.0))),
        ];
        let ordered: Vec<&str> = sorted_reading_order(&frags)
            .iter()
            .map(|f| f.text.as_str())
            .collect();
        assert_eq!(ordered, vec!["left", "right", "below"]);
    }
}
