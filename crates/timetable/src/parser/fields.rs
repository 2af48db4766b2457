//! Field extractors for a single schedule entry.
//!
//! Every extractor is a plain function from the candidate's notice string (or,
//! for the title, its element) to the field value. A failing extractor
//! discards the whole candidate.

use super::validator::RawCandidate;
use crate::course::{ClockTime, Course, CourseData, SessionType};
use crate::error::ExtractionError;
use chrono::NaiveDate;
use chrono_tz::Tz;
use regex::{Captures, Regex};
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

// The title anchor sits in a cell styled "klein"; some pages use "plan" instead.
static SMALL_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.klein a").unwrap());
static PLAN_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.plan a").unwrap());

static START_DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Start|Beginn)\s*:[^\d\n]*(\d{2})\.(\d{2})\.(\d{4})").unwrap()
});
static END_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:Ende|End)\s*:[^\d\n]*(\d{2})\.(\d{2})\.(\d{4})").unwrap());
static TIME_RANGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2}):(\d{2})\s*[-–]\s*(\d{2}):(\d{2}),").unwrap());
static INTERVAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}:\d{2}\s*[-–]\s*\d{2}:\d{2},[^\S\n]*(\w+)").unwrap()
});
static LOCATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:Raum|Room)\s*:[^\S\n]*(.*)").unwrap());
static TYPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:Vorlesung|Übung|Lecture|Exercise)\b").unwrap());
static LECTURER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Lehrperson(?:en)?|Lecturer(?:s|\(s\))?)\s*:[^\S\n]*(.*)").unwrap()
});
// The portal prints "missing_department" where the faculty should be.
static FACULTY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:missing_department|Fakultät\s*:|Faculty\s*:)[^\S\n]*(.*)").unwrap()
});

/// Builds a course from a validated candidate.
pub fn extract_course(candidate: &RawCandidate<'_>, timezone: Tz) -> Result<Course, ExtractionError> {
    let notice = candidate.notice.as_str();
    let (start_time, end_time) = time_range(notice)?;

    let data = CourseData {
        title: title(candidate.element)?,
        start_date: start_date(notice)?,
        end_date: end_date(notice)?,
        start_time,
        end_time,
        location: location(notice)?,
        session_type: session_type(notice)?,
        interval: interval(notice)?,
        lecturer: lecturer(notice)?,
        faculty: faculty(notice)?,
    };

    Ok(Course::new(data, timezone))
}

/// Title from the single anchor in a `td.klein` cell, or failing that in a
/// `td.plan` cell.
///
/// More than one anchor in `td.klein` is ambiguous and fails without trying
/// `td.plan`.
pub fn title(element: ElementRef<'_>) -> Result<String, ExtractionError> {
    for selector in [&*SMALL_TITLE_SELECTOR, &*PLAN_TITLE_SELECTOR] {
        let anchors: Vec<_> = element.select(selector).collect();
        match anchors.as_slice() {
            [] => continue,
            [anchor] => {
                let text = anchor.text().collect::<String>().trim().to_string();
                if text.is_empty() {
                    return Err(ExtractionError::field("title", "title anchor is empty"));
                }
                return Ok(text);
            }
            _ => {
                return Err(ExtractionError::field(
                    "title",
                    format!("{} candidate anchors", anchors.len()),
                ))
            }
        }
    }

    Err(ExtractionError::field("title", "no title anchor"))
}

pub fn start_date(notice: &str) -> Result<NaiveDate, ExtractionError> {
    date_with(&START_DATE_REGEX, notice, "start_date")
}

pub fn end_date(notice: &str) -> Result<NaiveDate, ExtractionError> {
    date_with(&END_DATE_REGEX, notice, "end_date")
}

/// Start and end of the `HH:MM - HH:MM,` range.
pub fn time_range(notice: &str) -> Result<(ClockTime, ClockTime), ExtractionError> {
    let caps = TIME_RANGE_REGEX
        .captures(notice)
        .ok_or_else(|| ExtractionError::field("start_time", "no time range"))?;

    let start = clock_time(&caps, 1, "start_time")?;
    let end = clock_time(&caps, 3, "end_time")?;
    Ok((start, end))
}

/// The word right after the time range, e.g. `wtl`.
pub fn interval(notice: &str) -> Result<String, ExtractionError> {
    capture(&INTERVAL_REGEX, notice, "interval")
}

pub fn location(notice: &str) -> Result<String, ExtractionError> {
    capture(&LOCATION_REGEX, notice, "location")
}

pub fn session_type(notice: &str) -> Result<SessionType, ExtractionError> {
    TYPE_REGEX
        .find(notice)
        .and_then(|m| SessionType::from_token(m.as_str()))
        .ok_or_else(|| ExtractionError::field("type", "no Vorlesung/Übung marker"))
}

pub fn lecturer(notice: &str) -> Result<String, ExtractionError> {
    capture(&LECTURER_REGEX, notice, "lecturer")
}

/// May be empty; only a missing marker is an error.
pub fn faculty(notice: &str) -> Result<String, ExtractionError> {
    capture(&FACULTY_REGEX, notice, "faculty")
}

fn capture(regex: &Regex, notice: &str, field: &'static str) -> Result<String, ExtractionError> {
    regex
        .captures(notice)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| ExtractionError::field(field, "label not found"))
}

fn date_with(regex: &Regex, notice: &str, field: &'static str) -> Result<NaiveDate, ExtractionError> {
    let caps = regex
        .captures(notice)
        .ok_or_else(|| ExtractionError::field(field, "label not found"))?;

    let day = number(&caps, 1, field)?;
    let month = number(&caps, 2, field)?;
    let year = number(&caps, 3, field)?;

    NaiveDate::from_ymd_opt(year as i32, month, day).ok_or_else(|| {
        ExtractionError::field(field, format!("{day:02}.{month:02}.{year} is not a date"))
    })
}

fn clock_time(
    caps: &Captures<'_>,
    first_group: usize,
    field: &'static str,
) -> Result<ClockTime, ExtractionError> {
    let hour = number(caps, first_group, field)?;
    let minute = number(caps, first_group + 1, field)?;
    if hour > 23 || minute > 59 {
        return Err(ExtractionError::field(
            field,
            format!("{hour:02}:{minute:02} is not a time of day"),
        ));
    }
    Ok(ClockTime::new(hour, minute))
}

fn number(caps: &Captures<'_>, group: usize, field: &'static str) -> Result<u32, ExtractionError> {
    caps.get(group)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .ok_or_else(|| ExtractionError::field(field, "malformed digits"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::SessionKind;
    use scraper::Html;

    const NOTICE: &str = "Datenbanksysteme I\n\
        Vorlesung\n\
        Mi. 09:00 - 10:30, wtl\n\
        Start :\u{a0}01.10.2025\n\
        Ende :\u{a0}14.01.2026\n\
        Raum: A301\n\
        Lehrperson: Dr. Smith\n\
        missing_department Fakultät für Wirtschaftsinformatik\n";

    fn first_table(document: &Html) -> ElementRef<'_> {
        let selector = Selector::parse("table").unwrap();
        document.select(&selector).next().unwrap()
    }

    #[test]
    fn test_english_labels() {
        let notice = "Lecture\nStart: 01.10.2025\nEnd: 16.01.2026\nRoom: A301\n\
                      09:00 - 10:30, weekly\nLecturer: Dr. Smith\nFaculty: CS\n";
        assert_eq!(start_date(notice).unwrap(), NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(end_date(notice).unwrap(), NaiveDate::from_ymd_opt(2026, 1, 16).unwrap());
        assert_eq!(location(notice).unwrap(), "A301");
        assert_eq!(
            time_range(notice).unwrap(),
            (ClockTime::new(9, 0), ClockTime::new(10, 30))
        );
        assert_eq!(interval(notice).unwrap(), "weekly");
        assert_eq!(lecturer(notice).unwrap(), "Dr. Smith");
        assert_eq!(faculty(notice).unwrap(), "CS");
        assert_eq!(session_type(notice).unwrap().label, "Lecture");
    }

    #[test]
    fn test_german_labels() {
        assert_eq!(start_date(NOTICE).unwrap(), NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(end_date(NOTICE).unwrap(), NaiveDate::from_ymd_opt(2026, 1, 14).unwrap());
        assert_eq!(interval(NOTICE).unwrap(), "wtl");
        assert_eq!(location(NOTICE).unwrap(), "A301");
        assert_eq!(lecturer(NOTICE).unwrap(), "Dr. Smith");
        assert_eq!(faculty(NOTICE).unwrap(), "Fakultät für Wirtschaftsinformatik");
        assert_eq!(session_type(NOTICE).unwrap().label, "Vorlesung");
    }

    #[test]
    fn test_plural_lecturer_label() {
        let notice = "Lehrpersonen: Prof. A, Prof. B\n";
        assert_eq!(lecturer(notice).unwrap(), "Prof. A, Prof. B");
        assert_eq!(lecturer("Lecturer(s): Dr. X").unwrap(), "Dr. X");
    }

    #[test]
    fn test_start_label_does_not_match_end() {
        let notice = "Ende : 14.01.2026\n";
        assert!(start_date(notice).is_err());
        assert!(end_date(notice).is_ok());
    }

    #[test]
    fn test_invalid_date_fails() {
        let err = start_date("Start: 31.02.2026").unwrap_err();
        assert_eq!(err.field_name(), Some("start_date"));
    }

    #[test]
    fn test_missing_label_fails() {
        assert_eq!(location("no room here").unwrap_err().field_name(), Some("location"));
        assert_eq!(faculty("Raum: A301").unwrap_err().field_name(), Some("faculty"));
    }

    #[test]
    fn test_empty_faculty_is_accepted() {
        assert_eq!(faculty("Raum: A301\nmissing_department").unwrap(), "");
    }

    #[test]
    fn test_out_of_range_time_fails() {
        let err = time_range("25:00 - 26:30, wtl").unwrap_err();
        assert_eq!(err.field_name(), Some("start_time"));
        let err = time_range("09:00 - 10:75, wtl").unwrap_err();
        assert_eq!(err.field_name(), Some("end_time"));
    }

    #[test]
    fn test_lecturer_label_is_not_a_session_type() {
        let notice = "Lecturer: Dr. Smith\nExercise\n";
        let session = session_type(notice).unwrap();
        assert_eq!(session.label, "Exercise");
        assert_eq!(session.kind, SessionKind::Exercise);

        let err = session_type("Lecturers: Dr. Smith\n").unwrap_err();
        assert_eq!(err.field_name(), Some("type"));
    }

    #[test]
    fn test_empty_value_stops_at_line_end() {
        assert_eq!(location("Raum:\nLehrperson: Dr. X\n").unwrap(), "");
        assert_eq!(lecturer("Lehrperson: \nmissing_department\n").unwrap(), "");
        assert_eq!(faculty("missing_department\nRaum: A301\n").unwrap(), "");
    }

    #[test]
    fn test_first_session_type_wins() {
        let notice = "Übung zur Vorlesung Analysis";
        assert_eq!(session_type(notice).unwrap().label, "Übung");
    }

    #[test]
    fn test_title_single_small_anchor() {
        let document = Html::parse_document(
            r##"<table><tr><td class="klein"><a href="#"> Datenbanksysteme I </a></td></tr></table>"##,
        );
        assert_eq!(title(first_table(&document)).unwrap(), "Datenbanksysteme I");
    }

    #[test]
    fn test_title_ambiguous() {
        let document = Html::parse_document(
            r#"<table><tr><td class="klein"><a>One</a></td><td class="klein"><a>Two</a></td></tr>
               <tr><td class="plan"><a>Three</a></td></tr></table>"#,
        );
        let err = title(first_table(&document)).unwrap_err();
        assert_eq!(err.field_name(), Some("title"));
    }

    #[test]
    fn test_title_plan_fallback() {
        let document = Html::parse_document(
            r#"<table><tr><td class="plan"><a>Statistik II</a></td></tr></table>"#,
        );
        assert_eq!(title(first_table(&document)).unwrap(), "Statistik II");
    }

    #[test]
    fn test_title_missing() {
        let document = Html::parse_document(r#"<table><tr><td><a>Link</a></td></tr></table>"#);
        assert!(title(first_table(&document)).is_err());
    }

    #[test]
    fn test_extract_course() {
        let html = format!(
            r#"<table><tr><td class="klein"><a>Datenbanksysteme I</a></td></tr>
               <tr><td><pre>{NOTICE}</pre></td></tr></table>"#
        );
        let document = Html::parse_document(&html);
        let candidate = RawCandidate::new(first_table(&document));
        let course = extract_course(&candidate, chrono_tz::Europe::Berlin).unwrap();

        assert_eq!(course.title(), "Datenbanksysteme I");
        assert_eq!(course.start_time(), ClockTime::new(9, 0));
        assert_eq!(course.end_time(), ClockTime::new(10, 30));
        assert_eq!(course.interval(), "wtl");
        assert_eq!(course.location(), "A301");
    }

    #[test]
    fn test_extract_course_any_failure_discards() {
        let notice = NOTICE.replace("Raum: A301\n", "");
        let html = format!(
            r#"<table><tr><td class="klein"><a>Datenbanksysteme I</a></td></tr>
               <tr><td><pre>{notice}</pre></td></tr></table>"#
        );
        let document = Html::parse_document(&html);
        let candidate = RawCandidate::new(first_table(&document));
        let err = extract_course(&candidate, chrono_tz::Europe::Berlin).unwrap_err();
        assert_eq!(err.field_name(), Some("location"));
    }
}
