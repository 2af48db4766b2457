//! Converts a university HTML class timetable into an iCalendar file.
//!
//! The pipeline has two steps:
//!
//! 1. [`extract_courses`] finds every `<table>` of the timetable page, skips
//!    the ones that aren't schedule entries and parses the rest into
//!    [`Course`] records.
//! 2. [`compile_calendar`] turns the courses into a [`CalendarDocument`] with
//!    one weekly (or single) event per course, each with a reminder alarm.
//!    [`CalendarDocument::to_ics`] serializes it.
//!
//! ```no_run
//! use timetable::{compile_calendar, extract_courses, PipelineConfig, Source};
//!
//! let config = PipelineConfig::default();
//! let source = Source::from_path("stundenplan.html".as_ref())?;
//! let courses = extract_courses(source, &config)?;
//! let calendar = compile_calendar(&courses, &config)?;
//! std::fs::write("stundenplan.ics", calendar.to_ics())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod calendar;
pub mod config;
pub mod course;
pub mod error;
pub mod parser;
pub mod source;

pub use calendar::{compile_calendar, CalendarDocument, Event, RecurrenceSpec};
pub use config::PipelineConfig;
pub use course::{ClockTime, Course, CourseData, SessionKind, SessionType};
pub use error::{ExtractionError, TimetableError};
pub use parser::{extract_courses, extract_report, ExtractionReport};
pub use source::{FileSource, PortalSource, Source};
