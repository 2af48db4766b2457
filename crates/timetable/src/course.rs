//! The course record produced by field extraction.
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;
use std::fmt;
use std::sync::OnceLock;

/// Hour and minute as printed in the timetable (e.g. `09:00`).
///
/// `new` does not check ranges. Extraction only builds values with an hour
/// in 0..=23 and a minute in 0..=59; a hand-built value outside that range
/// has each part clamped (hour to 23, minute to 59) when the course is
/// placed on the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    fn to_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour.min(23), self.minute.min(59), 0).unwrap_or_default()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Lecture,
    Exercise,
}

/// Session type of a course, with the word the timetable used for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionType {
    pub kind: SessionKind,
    /// Verbatim token, e.g. "Vorlesung" or "Exercise"
    pub label: String,
}

impl SessionType {
    /// Maps a timetable token to a session type. Returns `None` for words
    /// outside the known vocabulary.
    pub fn from_token(token: &str) -> Option<Self> {
        let kind = match token {
            "Vorlesung" | "Lecture" => SessionKind::Lecture,
            "Übung" | "Exercise" => SessionKind::Exercise,
            _ => return None,
        };
        Some(Self {
            kind,
            label: token.to_string(),
        })
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Field values of a course, before they are bound to a time zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseData {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub location: String,
    pub session_type: SessionType,
    pub interval: String,
    pub lecturer: String,
    pub faculty: String,
}

/// A fully extracted schedule entry.
///
/// Fields can't be changed after construction. The three event timestamps
/// are computed on first access and cached.
#[derive(Debug, Clone)]
pub struct Course {
    data: CourseData,
    timezone: Tz,
    first_event_start: OnceLock<DateTime<Tz>>,
    first_event_end: OnceLock<DateTime<Tz>>,
    last_event_end: OnceLock<DateTime<Tz>>,
}

impl Course {
    pub fn new(data: CourseData, timezone: Tz) -> Self {
        Self {
            data,
            timezone,
            first_event_start: OnceLock::new(),
            first_event_end: OnceLock::new(),
            last_event_end: OnceLock::new(),
        }
    }

    pub fn data(&self) -> &CourseData {
        &self.data
    }

    pub fn title(&self) -> &str {
        &self.data.title
    }

    pub fn start_date(&self) -> NaiveDate {
        self.data.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.data.end_date
    }

    pub fn start_time(&self) -> ClockTime {
        self.data.start_time
    }

    pub fn end_time(&self) -> ClockTime {
        self.data.end_time
    }

    pub fn location(&self) -> &str {
        &self.data.location
    }

    pub fn session_type(&self) -> &SessionType {
        &self.data.session_type
    }

    pub fn interval(&self) -> &str {
        &self.data.interval
    }

    pub fn lecturer(&self) -> &str {
        &self.data.lecturer
    }

    pub fn faculty(&self) -> &str {
        &self.data.faculty
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Start of the first event: start date at start time.
    pub fn first_event_start(&self) -> DateTime<Tz> {
        *self
            .first_event_start
            .get_or_init(|| self.time_from(self.data.start_date, self.data.start_time))
    }

    /// End of the first event: start date at end time.
    pub fn first_event_end(&self) -> DateTime<Tz> {
        *self
            .first_event_end
            .get_or_init(|| self.time_from(self.data.start_date, self.data.end_time))
    }

    /// End of the last event: end date at end time.
    pub fn last_event_end(&self) -> DateTime<Tz> {
        *self
            .last_event_end
            .get_or_init(|| self.time_from(self.data.end_date, self.data.end_time))
    }

    fn time_from(&self, date: NaiveDate, time: ClockTime) -> DateTime<Tz> {
        localize(self.timezone, date.and_time(time.to_naive()))
    }
}

/// Binds a wall-clock time to `tz`.
///
/// Times repeated by a DST fold resolve to the earlier instant. Times skipped
/// by a DST gap are read with the offset in force before the gap, so
/// 02:30 on a spring-forward night becomes 03:30 summer time.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(naive - Duration::days(1)))
                .fix()
                .local_minus_utc();
            tz.from_utc_datetime(&(naive - Duration::seconds(i64::from(before))))
        }
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} [", self.data.session_type, self.data.title)?;
        writeln!(
            f,
            "  start time: {}, end time: {}",
            self.data.start_time, self.data.end_time
        )?;
        writeln!(
            f,
            "  start date: {}, end date: {}",
            self.data.start_date, self.data.end_date
        )?;
        writeln!(f, "  location: {}", self.data.location)?;
        writeln!(f, "  interval: {}", self.data.interval)?;
        writeln!(f, "  lecturer: {}", self.data.lecturer)?;
        write!(f, "  faculty: {}", self.data.faculty)
    }
}
