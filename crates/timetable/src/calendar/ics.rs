//! RFC 5545 serialization of a [`CalendarDocument`].
//!
//! Output is deterministic: UIDs and DTSTAMPs are derived from the events
//! themselves, never from the clock.

use super::{CalendarDocument, Event, RecurrenceSpec};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::{OffsetComponents, Tz};
use std::fmt::Write;

/// Maximum line length in octets, excluding the CRLF.
const MAX_LINE_OCTETS: usize = 75;
const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

pub(super) fn write_calendar(calendar: &CalendarDocument) -> String {
    let mut out = String::new();

    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{}", calendar.product_id));
    push_line(&mut out, "CALSCALE:GREGORIAN");

    if let Some((first, last)) = year_span(&calendar.events) {
        write_timezone(&mut out, calendar.timezone, first, last);
    }

    for (index, event) in calendar.events.iter().enumerate() {
        write_event(&mut out, index, event, calendar.timezone);
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

fn write_event(out: &mut String, index: usize, event: &Event, tz: Tz) {
    let tzid = tz.name();
    let start_utc = utc_stamp(&event.start);

    push_line(out, "BEGIN:VEVENT");
    push_line(out, &format!("UID:{:04}-{}@timetable", index + 1, start_utc));
    push_line(out, &format!("DTSTAMP:{}", start_utc));
    push_line(out, &format!("SUMMARY:{}", escape_text(&event.summary)));
    push_line(
        out,
        &format!("DTSTART;TZID={}:{}", tzid, event.start.with_timezone(&tz).format(LOCAL_FORMAT)),
    );
    push_line(
        out,
        &format!("DTEND;TZID={}:{}", tzid, event.end.with_timezone(&tz).format(LOCAL_FORMAT)),
    );
    push_line(out, &format!("LOCATION:{}", escape_text(&event.location)));
    push_line(
        out,
        &format!("DESCRIPTION:{}", escape_text(&event.description)),
    );
    if let RecurrenceSpec::Weekly { until } = event.recurrence {
        // UNTIL must be UTC when DTSTART carries a TZID
        push_line(
            out,
            &format!("RRULE:FREQ=WEEKLY;UNTIL={}", utc_stamp(&until)),
        );
    }

    push_line(out, "BEGIN:VALARM");
    push_line(out, &format!("ACTION:{}", event.alarm.action.as_str()));
    push_line(out, &format!("TRIGGER:-PT{}M", event.alarm.minutes_before));
    push_line(
        out,
        &format!("DESCRIPTION:{}", escape_text(&event.alarm.description)),
    );
    push_line(out, "END:VALARM");
    push_line(out, "END:VEVENT");
}

/// First and last calendar year any event touches, including recurrences.
fn year_span(events: &[Event]) -> Option<(i32, i32)> {
    let first = events.iter().map(|e| e.start.year()).min()?;
    let last = events
        .iter()
        .map(|e| match e.recurrence {
            RecurrenceSpec::Weekly { until } => until.year().max(e.end.year()),
            RecurrenceSpec::Single => e.end.year(),
        })
        .max()?;
    Some((first, last))
}

/// An offset change of the zone.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Transition {
    at: NaiveDateTime,
    offset_from: i32,
    offset_to: i32,
    name: String,
    daylight: bool,
}

/// Writes a VTIMEZONE with every transition from the year before `first`
/// through `last`.
fn write_timezone(out: &mut String, tz: Tz, first: i32, last: i32) {
    push_line(out, "BEGIN:VTIMEZONE");
    push_line(out, &format!("TZID:{}", tz.name()));

    let transitions = transitions(tz, first - 1, last);
    if transitions.is_empty() {
        let start = NaiveDate::from_ymd_opt(first - 1, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        let offset = tz.offset_from_utc_datetime(&start);
        let seconds = offset.fix().local_minus_utc();
        push_line(out, "BEGIN:STANDARD");
        push_line(out, &format!("DTSTART:{}", start.format(LOCAL_FORMAT)));
        push_line(out, &format!("TZOFFSETFROM:{}", format_offset(seconds)));
        push_line(out, &format!("TZOFFSETTO:{}", format_offset(seconds)));
        push_line(out, &format!("TZNAME:{}", offset));
        push_line(out, "END:STANDARD");
    }

    for transition in transitions {
        let kind = if transition.daylight { "DAYLIGHT" } else { "STANDARD" };
        // Observance DTSTART is local time in the offset before the change
        let local = transition.at + Duration::seconds(i64::from(transition.offset_from));
        push_line(out, &format!("BEGIN:{}", kind));
        push_line(out, &format!("DTSTART:{}", local.format(LOCAL_FORMAT)));
        push_line(
            out,
            &format!("TZOFFSETFROM:{}", format_offset(transition.offset_from)),
        );
        push_line(
            out,
            &format!("TZOFFSETTO:{}", format_offset(transition.offset_to)),
        );
        push_line(out, &format!("TZNAME:{}", transition.name));
        push_line(out, &format!("END:{}", kind));
    }

    push_line(out, "END:VTIMEZONE");
}

/// Finds offset changes by comparing the offset at each UTC midnight, then
/// bisecting the day down to the second.
fn transitions(tz: Tz, first_year: i32, last_year: i32) -> Vec<Transition> {
    let utc_offset = |at: &NaiveDateTime| tz.offset_from_utc_datetime(at).fix().local_minus_utc();

    let (Some(mut day), Some(end)) = (
        NaiveDate::from_ymd_opt(first_year, 1, 1),
        NaiveDate::from_ymd_opt(last_year + 1, 1, 1),
    ) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    while day < end {
        let (Some(lo), Some(next)) = (day.and_hms_opt(0, 0, 0), day.succ_opt()) else {
            break;
        };
        let Some(hi) = next.and_hms_opt(0, 0, 0) else {
            break;
        };

        let before = utc_offset(&lo);
        let after = utc_offset(&hi);
        if before != after {
            let (mut lo, mut hi) = (lo, hi);
            while hi - lo > Duration::seconds(1) {
                let mid = lo + (hi - lo) / 2;
                if utc_offset(&mid) == before {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            let offset = tz.offset_from_utc_datetime(&hi);
            found.push(Transition {
                at: hi,
                offset_from: before,
                offset_to: after,
                name: offset.to_string(),
                daylight: offset.dst_offset() != Duration::zero(),
            });
        }
        day = next;
    }
    found
}

fn format_offset(seconds: i32) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.abs();
    let (hours, minutes, rest) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if rest == 0 {
        format!("{sign}{hours:02}{minutes:02}")
    } else {
        format!("{sign}{hours:02}{minutes:02}{rest:02}")
    }
}

/// Escapes a TEXT value (RFC 5545 section 3.3.11).
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Folds a content line into physical lines of at most 75 octets, never
/// splitting a UTF-8 sequence. Continuation lines start with a space.
pub fn fold_line(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = line;
    let mut limit = MAX_LINE_OCTETS;

    while rest.len() > limit {
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        parts.push(head);
        rest = tail;
        // Leave room for the leading space
        limit = MAX_LINE_OCTETS - 1;
    }
    parts.push(rest);
    parts
}

fn push_line(out: &mut String, line: &str) {
    for (i, part) in fold_line(line).into_iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        // Writing to a String can't fail
        let _ = write!(out, "{}\r\n", part);
    }
}

/// UTC timestamp of `dt` in iCalendar basic format.
fn utc_stamp(dt: &DateTime<Tz>) -> String {
    dt.with_timezone(&Utc).format(UTC_FORMAT).to_string()
}
