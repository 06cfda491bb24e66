//! iCalendar (RFC 5545) attachments for scheduled meetings.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Meeting;

pub const CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

const MAX_LINE_OCTETS: usize = 75;

#[derive(Debug, Clone)]
pub struct CalendarSettings {
    /// Right-hand side of every event UID.
    pub domain: String,
    /// Address put into the ORGANIZER property.
    pub organizer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarAttachment {
    pub filename: String,
    pub content: String,
}

/// Builds the calendar entry for `meeting`, or `None` while it has no
/// start and end time.
pub fn calendar_for(
    meeting: &Meeting,
    settings: &CalendarSettings,
    now: DateTime<Utc>,
) -> Option<CalendarAttachment> {
    let (start, end) = (meeting.start_time?, meeting.end_time?);

    let (method, status) = if meeting.deleted {
        ("CANCEL", "CANCELLED")
    } else {
        ("REQUEST", "CONFIRMED")
    };

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//evendemy//meetings//EN".to_string(),
        format!("METHOD:{method}"),
        "BEGIN:VEVENT".to_string(),
        format!("UID:evendemy-{}@{}", meeting.mid, settings.domain),
        format!("DTSTAMP:{}", timestamp(now)),
        format!("DTSTART:{}", timestamp(start)),
        format!("DTEND:{}", timestamp(end)),
        format!("SUMMARY:{}", escape(&meeting.title)),
        format!("STATUS:{status}"),
        format!("ORGANIZER:mailto:{}", settings.organizer),
    ];
    if let Some(text) = meeting
        .short_description
        .as_deref()
        .or(meeting.description.as_deref())
    {
        lines.push(format!("DESCRIPTION:{}", escape(text)));
    }
    if let Some(location) = &meeting.location {
        lines.push(format!("LOCATION:{}", escape(location)));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let content = lines
        .iter()
        .map(|line| fold(line))
        .collect::<Vec<_>>()
        .join("\r\n")
        + "\r\n";

    Some(CalendarAttachment {
        filename: format!("meeting-{}.ics", meeting.mid),
        content,
    })
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            c => escaped.push(c),
        }
    }
    escaped
}

/// Splits a content line into continuation lines of at most 75 octets
/// without cutting a UTF-8 sequence.
fn fold(line: &str) -> String {
    let mut folded = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            folded.push_str("\r\n ");
            // the leading space counts towards the next line
            width = 1;
        }
        folded.push(c);
        width += len;
    }
    folded
}
