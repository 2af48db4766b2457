//! Structural plausibility check for candidate tables.

use crate::error::ExtractionError;
use scraper::ElementRef;

/// A candidate table with its flattened text.
#[derive(Debug, Clone)]
pub struct RawCandidate<'a> {
    pub element: ElementRef<'a>,
    /// All text content of the table, concatenated
    pub notice: String,
    pub child_count: usize,
}

impl<'a> RawCandidate<'a> {
    pub fn new(element: ElementRef<'a>) -> Self {
        Self {
            notice: element.text().collect::<String>(),
            child_count: child_element_count(element),
            element,
        }
    }
}

/// Counts the direct child elements of a table.
///
/// Row groups (`tbody`, `thead`, `tfoot`) are looked through, since the HTML
/// parser inserts a `tbody` around bare rows.
pub fn child_element_count(element: ElementRef<'_>) -> usize {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .map(|child| match child.value().name() {
            "tbody" | "thead" | "tfoot" => child.children().filter_map(ElementRef::wrap).count(),
            _ => 1,
        })
        .sum()
}

/// Rejects tables with more than `max_children` rows. A schedule entry has 8
/// or 9; anything bigger is layout.
pub fn validate_candidate(
    element: ElementRef<'_>,
    max_children: usize,
) -> Result<RawCandidate<'_>, ExtractionError> {
    let candidate = RawCandidate::new(element);
    if candidate.child_count > max_children {
        return Err(ExtractionError::StructuralRejection {
            children: candidate.child_count,
            limit: max_children,
        });
    }
    Ok(candidate)
}
