//! Timetable HTML parsing
//!
//! Locates candidate tables, drops the ones that can't be schedule entries and
//! extracts a [`Course`] from each of the rest. A candidate that fails is
//! skipped with a warning; it never stops the batch.
mod fields;
mod locator;
mod validator;

pub use fields::*;
pub use locator::{locate_candidates, locate_candidates_lenient};
pub use validator::{child_element_count, validate_candidate, RawCandidate};

use crate::config::PipelineConfig;
use crate::course::Course;
use crate::error::{ExtractionError, TimetableError};
use crate::source::Source;
use chrono_tz::Tz;
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

/// A candidate table that did not become a course.
#[derive(Debug, Clone)]
pub struct SkippedCandidate {
    /// Position of the table among all tables of the document
    pub index: usize,
    pub error: ExtractionError,
}

/// Result of running the extraction over one document.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub courses: Vec<Course>,
    pub skipped: Vec<SkippedCandidate>,
}

/// Extracts all courses from a timetable document.
///
/// # Arguments
/// * `source` - The parsed document or a stream holding its HTML
/// * `config` - Pipeline configuration (time zone, plausibility limit)
///
/// # Returns
/// * `Ok(Vec<Course>)` - Courses in document order
/// * `Err(NoCandidatesFound)` - If the document has no tables (unless
///   `allow_empty` is set)
/// * `Err` - If the source can't be read or the time zone is unknown
pub fn extract_courses(source: Source, config: &PipelineConfig) -> Result<Vec<Course>, TimetableError> {
    Ok(extract_report(source, config)?.courses)
}

/// Like [`extract_courses`], but also returns the skipped candidates.
pub fn extract_report(source: Source, config: &PipelineConfig) -> Result<ExtractionReport, TimetableError> {
    let timezone = config.source_timezone()?;
    let document = source.into_document()?;
    parse_document(&document, config, timezone)
}

fn parse_document(
    document: &Html,
    config: &PipelineConfig,
    timezone: Tz,
) -> Result<ExtractionReport, TimetableError> {
    let candidates = if config.allow_empty {
        let tables = locate_candidates_lenient(document);
        if tables.is_empty() {
            warn!("Timetable contains no tables, producing an empty calendar");
        }
        tables
    } else {
        locate_candidates(document)?
    };

    info!(candidates = candidates.len(), "Located candidate tables");

    let mut report = ExtractionReport::default();
    for (index, element) in candidates.into_iter().enumerate() {
        match parse_candidate(element, config.max_children, timezone) {
            Ok(course) => {
                debug!(index, title = %course.title(), "Parsed course");
                report.courses.push(course);
            }
            Err(error) => {
                warn!(index, "Skipped unparseable table element: {}", error);
                report.skipped.push(SkippedCandidate { index, error });
            }
        }
    }

    info!(
        courses = report.courses.len(),
        skipped = report.skipped.len(),
        "Finished extracting courses"
    );

    Ok(report)
}

/// Validates and extracts one candidate.
pub fn parse_candidate(
    element: ElementRef<'_>,
    max_children: usize,
    timezone: Tz,
) -> Result<Course, ExtractionError> {
    let candidate = validate_candidate(element, max_children)?;
    extract_course(&candidate, timezone)
}
