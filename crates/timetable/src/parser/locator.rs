//! Finds candidate schedule entries in a timetable document.

use crate::error::TimetableError;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static TABLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());

/// Returns every `<table>` element of the document in document order.
///
/// Fails with `NoCandidatesFound` if there are none; an empty timetable
/// usually means the page is a login or error page.
pub fn locate_candidates(document: &Html) -> Result<Vec<ElementRef<'_>>, TimetableError> {
    let tables = locate_candidates_lenient(document);
    if tables.is_empty() {
        return Err(TimetableError::NoCandidatesFound);
    }
    Ok(tables)
}

/// Like [`locate_candidates`], but an empty result is not an error.
pub fn locate_candidates_lenient(document: &Html) -> Vec<ElementRef<'_>> {
    document.select(&TABLE_SELECTOR).collect()
}
