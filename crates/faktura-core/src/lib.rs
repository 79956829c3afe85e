//! Core library for Lithuanian invoice field extraction.
//!
//! This crate provides:
//! - Heuristic multi-pass parsing of OCR text lines (invoice id, date,
//!   counterparty, amounts, VAT rate, VAT and company codes)
//! - Learned spatial region templates per counterparty, with matching
//!   over positioned OCR fragments
//! - Multi-page result merging
//! - Invoice data models with own-company exclusion throughout

pub mod error;
pub mod models;
pub mod invoice;
pub mod template;

pub use error::{ExtractionError, Result};
pub use models::fragment::{sorted_reading_order, BoundingBox, PositionedFragment};
pub use models::invoice::{
    Direction, ExtractedInvoice, FieldKey, OwnCompanyIdentity, Section, VatRate,
};
pub use invoice::{merge, parse, HeuristicParser, MergeStrategy};
pub use template::{
    learn_template, match_template, parse_with_template, FieldRegion, Template, TemplateStore,
};
