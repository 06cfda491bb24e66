use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{Meeting, User};

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format(DATE_FORMAT).to_string()
}

/// Human-readable schedule used as `{{text}}` of a time change.
pub fn schedule_text(meeting: &Meeting) -> String {
    match (meeting.start_time, meeting.end_time) {
        (Some(start), Some(end)) if start.date_naive() == end.date_naive() => {
            format!("{} - {}", format_time(start), end.format("%H:%M"))
        }
        (Some(start), Some(end)) => format!("{} - {}", format_time(start), format_time(end)),
        (Some(start), None) => format_time(start),
        _ => "a date to be announced".to_string(),
    }
}

/// Values available to mail templates as `{{name}}`.
pub fn context(
    meeting: &Meeting,
    actor: Option<&User>,
    text: Option<&str>,
) -> HashMap<&'static str, String> {
    let mut values = HashMap::new();
    values.insert("mid", meeting.mid.to_string());
    values.insert("title", meeting.title.clone());
    values.insert(
        "shortDescription",
        meeting.short_description.clone().unwrap_or_default(),
    );
    values.insert("description", meeting.description.clone().unwrap_or_default());
    values.insert("location", meeting.location.clone().unwrap_or_default());
    values.insert("costCenter", meeting.cost_center.clone().unwrap_or_default());
    values.insert("owner", meeting.username.clone());
    values.insert(
        "startTime",
        meeting.start_time.map(format_time).unwrap_or_default(),
    );
    values.insert(
        "endTime",
        meeting.end_time.map(format_time).unwrap_or_default(),
    );
    if let Some(user) = actor {
        values.insert("username", user.username.clone());
        values.insert("firstname", user.firstname.clone());
        values.insert("lastname", user.lastname.clone());
    }
    values.insert("text", text.unwrap_or_default().to_string());
    values
}

/// Replaces every `{{name}}` with its value. Unknown names render empty,
/// an unterminated `{{` is kept verbatim.
pub fn render(template: &str, values: &HashMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let name = after[..close].trim();
                if let Some(value) = values.get(name) {
                    out.push_str(value);
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
