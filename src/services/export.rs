use chrono::{DateTime, Utc};

use crate::models::Booking;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const HEADER: [&str; 8] = [
    "username",
    "firstname",
    "lastname",
    "email",
    "externals",
    "tookPart",
    "dateOfRegistration",
    "dateOfConfirmation",
];

/// Quotes a field when it contains a separator, a quote or a line break.
fn field(value: &str) -> String {
    if value.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn timestamp(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339()).unwrap_or_default()
}

/// Attendee list of one meeting as CSV, one row per booking.
pub fn attendees_csv(bookings: &[Booking]) -> String {
    let mut out = HEADER.join(",");
    out.push_str("\r\n");

    for booking in bookings {
        let attendance = &booking.attendance;
        let (firstname, lastname, email) = booking
            .user
            .as_ref()
            .map(|u| (u.firstname.as_str(), u.lastname.as_str(), u.email.as_str()))
            .unwrap_or_default();

        let row = [
            field(&attendance.username),
            field(firstname),
            field(lastname),
            field(email),
            attendance.externals.to_string(),
            attendance.took_part.to_string(),
            timestamp(Some(attendance.date_of_registration)),
            timestamp(attendance.date_of_confirmation),
        ];
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

pub fn filename(mid: i64) -> String {
    format!("meeting-{mid}-attendees.csv")
}
