//! Calendar compilation: one event per course, with recurrence and alarm.

mod ics;
mod recurrence;

pub use ics::{escape_text, fold_line};
pub use recurrence::{compile_recurrence, RecurrenceSpec};

use crate::config::PipelineConfig;
use crate::course::Course;
use crate::error::TimetableError;
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, info};

/// A calendar ready to be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDocument {
    pub product_id: String,
    /// Zone all event times are expressed in
    pub timezone: Tz,
    pub events: Vec<Event>,
}

/// One course as a (possibly recurring) calendar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub summary: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub location: String,
    pub description: String,
    pub recurrence: RecurrenceSpec,
    pub alarm: Alarm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub minutes_before: u32,
    pub action: AlarmAction,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmAction {
    Audio,
}

impl AlarmAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmAction::Audio => "AUDIO",
        }
    }
}

/// Compiles courses into a calendar, keeping their order.
///
/// Identical courses still become separate events.
///
/// # Returns
/// * `Ok(CalendarDocument)` - One event per course
/// * `Err(UnknownIntervalTag)` - If any course has an interval we can't map;
///   no partial calendar is returned
pub fn compile_calendar(
    courses: &[Course],
    config: &PipelineConfig,
) -> Result<CalendarDocument, TimetableError> {
    let timezone = config.source_timezone()?;

    let events = courses
        .iter()
        .map(|course| compile_event(course, config, timezone))
        .collect::<Result<Vec<_>, _>>()?;

    info!(events = events.len(), "Compiled calendar");

    Ok(CalendarDocument {
        product_id: config.product_id.clone(),
        timezone,
        events,
    })
}

fn compile_event(
    course: &Course,
    config: &PipelineConfig,
    timezone: Tz,
) -> Result<Event, TimetableError> {
    let recurrence = match compile_recurrence(course, &config.intervals)? {
        RecurrenceSpec::Weekly { until } => RecurrenceSpec::Weekly {
            until: until.with_timezone(&timezone),
        },
        RecurrenceSpec::Single => RecurrenceSpec::Single,
    };

    let summary = format!("{}: {}", course.session_type(), course.title());
    debug!(summary = %summary, recurring = recurrence.is_recurring(), "Compiling event");

    Ok(Event {
        start: course.first_event_start().with_timezone(&timezone),
        end: course.first_event_end().with_timezone(&timezone),
        location: course.location().to_string(),
        description: format!(
            "Lecturer: {}\nFaculty: {}",
            course.lecturer(),
            course.faculty()
        ),
        recurrence,
        alarm: Alarm {
            minutes_before: config.alarm_minutes_before,
            action: AlarmAction::Audio,
            description: summary.clone(),
        },
        summary,
    })
}

impl CalendarDocument {
    /// Serializes the calendar as RFC 5545 text.
    pub fn to_ics(&self) -> String {
        ics::write_calendar(self)
    }
}

impl Event {
    /// All `(start, end)` windows of this event.
    pub fn occurrences(&self) -> Vec<(DateTime<Tz>, DateTime<Tz>)> {
        self.recurrence.occurrences(self.start, self.end)
    }
}
