//! Maps a course's interval tag to recurrence semantics.

use crate::config::IntervalVocabulary;
use crate::course::{localize, Course};
use crate::error::TimetableError;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;

/// How often a course's event repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceSpec {
    /// The event happens once
    Single,
    /// The event repeats every week; `until` is the end of the last occurrence
    Weekly { until: DateTime<Tz> },
}

/// Decides the recurrence of a course from its interval tag.
///
/// An unknown tag is a hard error: guessing would put wrong dates into
/// somebody's calendar.
pub fn compile_recurrence(
    course: &Course,
    intervals: &IntervalVocabulary,
) -> Result<RecurrenceSpec, TimetableError> {
    let tag = course.interval();
    if intervals.weekly.iter().any(|t| t == tag) {
        Ok(RecurrenceSpec::Weekly {
            until: course.last_event_end(),
        })
    } else if intervals.single.iter().any(|t| t == tag) {
        Ok(RecurrenceSpec::Single)
    } else {
        Err(TimetableError::UnknownIntervalTag(tag.to_string()))
    }
}

impl RecurrenceSpec {
    pub fn is_recurring(&self) -> bool {
        matches!(self, RecurrenceSpec::Weekly { .. })
    }

    /// Expands the series starting with the window `[start, end)`.
    ///
    /// Weeks are stepped in local civil time, so a 09:00 course stays at
    /// 09:00 across a DST change. An occurrence is included while its start
    /// is not after `until`.
    pub fn occurrences(
        &self,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Vec<(DateTime<Tz>, DateTime<Tz>)> {
        let until = match self {
            RecurrenceSpec::Single => return vec![(start, end)],
            RecurrenceSpec::Weekly { until } => *until,
        };

        let tz = start.timezone();
        let local_start = start.naive_local();
        let length = end.naive_local() - local_start;

        let mut occurrences = Vec::new();
        let mut week = 0;
        loop {
            let occurrence_start = local_start + Duration::weeks(week);
            let occurrence = localize(tz, occurrence_start);
            if occurrence > until {
                break;
            }
            occurrences.push((occurrence, localize(tz, occurrence_start + length)));
            week += 1;
        }
        occurrences
    }
}
