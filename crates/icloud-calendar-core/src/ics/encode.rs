//! VCALENDAR generation for new events.

use chrono::{DateTime, Utc};

use crate::event::EventDraft;

const CRLF: &str = "\r\n";

/// Formats a timestamp as an iCalendar UTC date-time (`20250205T143000Z`).
pub fn format_utc_basic(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Renders a complete VCALENDAR document holding a single VEVENT.
///
/// Text values are written as given. `;`, `,`, `\` and line breaks are not
/// escaped, so callers must not pass them in summaries, descriptions or
/// attendee names.
pub fn encode_event(uid: &str, draft: &EventDraft) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}", uid),
        format!("SUMMARY:{}", draft.summary),
        format!("DESCRIPTION:{}", draft.description),
    ];

    for attendee in &draft.attendees {
        lines.push(format!(
            "ATTENDEE;CN={}:mailto:{}",
            attendee.name, attendee.email
        ));
    }

    lines.push(format!("DTSTART:{}", format_utc_basic(draft.start)));
    lines.push(format!("DTEND:{}", format_utc_basic(draft.end)));
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut out = lines.join(CRLF);
    out.push_str(CRLF);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Attendee;
    use chrono::TimeZone;

    fn draft() -> EventDraft {
        EventDraft::new(
            "Test event",
            Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2021, 1, 1, 13, 0, 0).unwrap(),
        )
        .with_description("Test description")
        .with_attendee(Attendee::new("John Doe", "john@doe.test"))
    }

    #[test]
    fn encodes_exact_layout() {
        let ics = encode_event("1234567890@zaptime.app", &draft());

        assert_eq!(
            ics,
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:1234567890@zaptime.app\r\n\
             SUMMARY:Test event\r\nDESCRIPTION:Test description\r\n\
             ATTENDEE;CN=John Doe:mailto:john@doe.test\r\n\
             DTSTART:20210101T120000Z\r\nDTEND:20210101T130000Z\r\n\
             END:VEVENT\r\nEND:VCALENDAR\r\n"
        );
    }

    #[test]
    fn empty_description_still_emits_line() {
        let draft = EventDraft::new(
            "Solo",
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        );
        let ics = encode_event("x@zaptime.app", &draft);

        assert!(ics.contains("\r\nDESCRIPTION:\r\n"));
        assert!(!ics.contains("ATTENDEE"));
    }

    #[test]
    fn attendees_follow_input_order() {
        let draft = draft().with_attendees([
            Attendee::new("B", "b@example.test"),
            Attendee::new("A", "a@example.test"),
        ]);
        let ics = encode_event("x@zaptime.app", &draft);

        let b = ics.find("CN=B").unwrap();
        let a = ics.find("CN=A").unwrap();
        assert!(b < a);
        assert!(a < ics.find("DTSTART").unwrap());
    }

    #[test]
    fn text_is_not_escaped() {
        let draft = draft().with_description("one, two; three");
        let ics = encode_event("x@zaptime.app", &draft);
        assert!(ics.contains("DESCRIPTION:one, two; three\r\n"));
    }

    #[test]
    fn utc_basic_format() {
        let dt = Utc.with_ymd_and_hms(2025, 2, 5, 14, 30, 0).unwrap();
        assert_eq!(format_utc_basic(dt), "20250205T143000Z");
    }
}
