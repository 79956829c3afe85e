//! Heuristic invoice parsing: vocabulary, rule extractors, the multi-pass
//! parser and the multi-page merge.

pub mod identity;
pub mod merge;
pub mod parser;
pub mod rules;
pub mod validate;

pub use merge::{merge, MergeStrategy};
pub use parser::HeuristicParser;
pub use validate::{match_quality, validate_field};

use crate::models::invoice::{Direction, ExtractedInvoice, OwnCompanyIdentity};

/// Parse one document's text lines with the given own-company identity
/// and direction.
pub fn parse(
    lines: &[String],
    own: &OwnCompanyIdentity,
    direction: Direction,
) -> ExtractedInvoice {
    HeuristicParser::new()
        .with_own_identity(own.clone())
        .with_direction(direction)
        .parse(lines)
}
