//! Line-oriented VEVENT parser.
//!
//! Input is scanned line by line. Each line is trimmed, `BEGIN:VEVENT` /
//! `END:VEVENT` delimit events, and every other line inside an event is split
//! at its first colon into a key and a value. `DTSTART` / `DTEND` become
//! timezone-aware timestamps; everything else is kept as text.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::calendar::Attendee;
use crate::event::Event;

static TZID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TZID=([^:;]+)[^:]*:(.+)").expect("TZID regex should be valid"));

const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";
const DATE_FORMAT: &str = "%Y%m%d";

/// How the parser treats input it cannot make sense of.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Drop malformed lines, bad dates and unterminated events silently.
    #[default]
    Lenient,
    /// Report the first problem as a [`ParseError`].
    Strict,
}

/// Problems reported in [`ParseMode::Strict`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `BEGIN:VEVENT` without a matching `END:VEVENT`.
    #[error("VEVENT is not terminated")]
    UnterminatedEvent,

    /// A line inside a VEVENT without a `key:value` separator.
    #[error("line without a colon inside VEVENT: {line}")]
    MissingColon { line: String },

    /// A `DTSTART` / `DTEND` value that does not match the expected format.
    #[error("invalid {property} value: {value}")]
    InvalidDate { property: String, value: String },

    /// A `TZID` that is not in the IANA database.
    #[error("unknown timezone: {tzid}")]
    UnknownTimezone { tzid: String },
}

/// Parses calendar text leniently, returning every complete VEVENT.
pub fn parse_calendar_text(text: &str) -> Vec<Event> {
    match parse_calendar_text_with(text, ParseMode::Lenient) {
        Ok(events) => events,
        // Lenient parsing never fails.
        Err(_) => Vec::new(),
    }
}

/// Parses calendar text with the given [`ParseMode`].
pub fn parse_calendar_text_with(text: &str, mode: ParseMode) -> Result<Vec<Event>, ParseError> {
    let mut parser = Parser {
        mode,
        events: Vec::new(),
        current: None,
        nested_depth: 0,
    };

    for line in text.split('\n') {
        parser.line(line.trim())?;
    }

    parser.finish()
}

struct Parser {
    mode: ParseMode,
    events: Vec<Event>,
    /// The event being accumulated; `Some` while inside a VEVENT.
    current: Option<Event>,
    /// Depth of sub-components (VALARM and friends) inside the current event.
    nested_depth: usize,
}

impl Parser {
    fn line(&mut self, line: &str) -> Result<(), ParseError> {
        if line == "BEGIN:VEVENT" {
            if self.current.is_some() {
                self.reject(ParseError::UnterminatedEvent)?;
            }
            self.current = Some(Event::default());
            self.nested_depth = 0;
            return Ok(());
        }

        if line == "END:VEVENT" {
            if let Some(event) = self.current.take() {
                self.events.push(event);
            }
            return Ok(());
        }

        if self.current.is_none() {
            return Ok(());
        }

        if line.starts_with("BEGIN:") {
            self.nested_depth += 1;
            return Ok(());
        }
        if self.nested_depth > 0 {
            if line.starts_with("END:") {
                self.nested_depth -= 1;
            }
            return Ok(());
        }

        let Some((key, value)) = line.split_once(':') else {
            if !line.is_empty() {
                self.reject(ParseError::MissingColon {
                    line: line.to_string(),
                })?;
            }
            return Ok(());
        };

        self.property(line, key, value)
    }

    fn property(&mut self, line: &str, key: &str, value: &str) -> Result<(), ParseError> {
        let mode = self.mode;
        let Some(event) = self.current.as_mut() else {
            return Ok(());
        };

        let mut key = key.to_string();
        let mut value = value.to_string();

        if key.contains(";TZID=")
            && let Some(caps) = TZID_PATTERN.captures(line)
        {
            let tzid = &caps[1];
            key = key.replace(&format!(";TZID={}", tzid), "");
            event.timezone = Some(tzid.to_string());
            value = caps[2].to_string();
        }

        match key.as_str() {
            "DTSTART" | "DTEND" => {
                let parsed = resolve_zone(event.timezone.as_deref(), mode).and_then(|zone| {
                    parse_date_time(&value, zone).ok_or_else(|| ParseError::InvalidDate {
                        property: key.clone(),
                        value: value.clone(),
                    })
                });
                store_timestamp(event, &key, parsed, mode)?;
            }
            "DTSTART;VALUE=DATE" | "DTEND;VALUE=DATE" => {
                let property = key.trim_end_matches(";VALUE=DATE").to_string();
                let parsed = resolve_zone(event.timezone.as_deref(), mode).and_then(|zone| {
                    parse_date(&value, zone).ok_or_else(|| ParseError::InvalidDate {
                        property: property.clone(),
                        value: value.clone(),
                    })
                });
                store_timestamp(event, &property, parsed, mode)?;
            }
            _ => store_text(event, &key, value),
        }

        Ok(())
    }

    fn finish(self) -> Result<Vec<Event>, ParseError> {
        if self.current.is_some() {
            if self.mode == ParseMode::Strict {
                return Err(ParseError::UnterminatedEvent);
            }
            debug!("Dropping unterminated VEVENT");
        }
        Ok(self.events)
    }

    fn reject(&self, error: ParseError) -> Result<(), ParseError> {
        match self.mode {
            ParseMode::Strict => Err(error),
            ParseMode::Lenient => {
                debug!(error = %error, "Ignoring malformed iCalendar input");
                Ok(())
            }
        }
    }
}

/// Stores a parsed timestamp, or drops it (lenient) / fails (strict).
fn store_timestamp(
    event: &mut Event,
    property: &str,
    parsed: Result<DateTime<Tz>, ParseError>,
    mode: ParseMode,
) -> Result<(), ParseError> {
    let dt = match parsed {
        Ok(dt) => dt,
        Err(e) if mode == ParseMode::Strict => return Err(e),
        Err(e) => {
            warn!(error = %e, "Skipping unparseable date property");
            return Ok(());
        }
    };

    if property == "DTSTART" {
        event.dtstart = Some(dt);
    } else {
        event.dtend = Some(dt);
    }
    Ok(())
}

fn store_text(event: &mut Event, key: &str, value: String) {
    let lower = key.to_lowercase();
    match lower.as_str() {
        "summary" => event.summary = Some(value),
        "description" => event.description = Some(value),
        _ => {
            if lower.starts_with("attendee")
                && let Some(attendee) = parse_attendee(key, &value)
            {
                event.attendees.push(attendee);
            }
            event.properties.insert(lower, value);
        }
    }
}

/// Extracts an attendee from `ATTENDEE;CN=<name>[;...]` / `mailto:<email>`.
fn parse_attendee(key: &str, value: &str) -> Option<Attendee> {
    let name = key
        .split(';')
        .skip(1)
        .find_map(|param| {
            let (k, v) = param.split_once('=')?;
            k.eq_ignore_ascii_case("CN").then(|| v.trim_matches('"'))
        })?;

    let email = value
        .get(..7)
        .filter(|scheme| scheme.eq_ignore_ascii_case("mailto:"))
        .map(|_| &value[7..])?;

    Some(Attendee::new(name, email))
}

/// Resolves the event timezone, falling back to UTC when unset.
///
/// An unknown TZID is an error in strict mode and UTC in lenient mode.
fn resolve_zone(tzid: Option<&str>, mode: ParseMode) -> Result<Tz, ParseError> {
    let Some(tzid) = tzid else {
        return Ok(Tz::UTC);
    };

    match tzid.trim_matches('"').parse::<Tz>() {
        Ok(zone) => Ok(zone),
        Err(_) if mode == ParseMode::Strict => Err(ParseError::UnknownTimezone {
            tzid: tzid.to_string(),
        }),
        Err(_) => {
            warn!(tzid = %tzid, "Unknown timezone, interpreting times as UTC");
            Ok(Tz::UTC)
        }
    }
}

/// Parses `YYYYMMDDThhmmss` in `zone`, or `YYYYMMDDThhmmssZ` as UTC.
fn parse_date_time(value: &str, zone: Tz) -> Option<DateTime<Tz>> {
    let (value, zone) = match value.strip_suffix('Z') {
        Some(utc) => (utc, Tz::UTC),
        None => (value, zone),
    };
    let naive = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT).ok()?;
    Some(localize(zone, naive))
}

/// Parses `YYYYMMDD` as the start of that day in `zone`.
fn parse_date(value: &str, zone: Tz) -> Option<DateTime<Tz>> {
    let date = NaiveDate::parse_from_str(value, DATE_FORMAT).ok()?;
    Some(localize(zone, date.and_hms_opt(0, 0, 0)?))
}

/// Pins a wall-clock time to `zone`.
///
/// Ambiguous times take the earlier instant; times inside a DST gap are
/// moved forward by an hour.
fn localize(zone: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => zone
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| zone.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDraft;
    use crate::ics::encode_event;
    use chrono::{Timelike, Utc};

    fn wrap(body: &str) -> String {
        format!("BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\n{body}\nEND:VEVENT\nEND:VCALENDAR\n")
    }

    fn prague() -> Tz {
        "Europe/Prague".parse().unwrap()
    }

    #[test]
    fn parses_basic_event() {
        let text = wrap(
            "UID:event1@example.com\n\
             SUMMARY:Team Meeting\n\
             DESCRIPTION:Weekly sync\n\
             DTSTART:20250205T100000\n\
             DTEND:20250205T110000\n\
             LOCATION:Room A",
        );
        let events = parse_calendar_text(&text);

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.summary.as_deref(), Some("Team Meeting"));
        assert_eq!(event.description.as_deref(), Some("Weekly sync"));
        assert_eq!(event.uid(), Some("event1@example.com"));
        assert_eq!(event.property("location"), Some("Room A"));
        assert_eq!(
            event.dtstart,
            Some(Tz::UTC.with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap())
        );
        assert_eq!(
            event.dtend,
            Some(Tz::UTC.with_ymd_and_hms(2025, 2, 5, 11, 0, 0).unwrap())
        );
        assert!(event.timezone.is_none());
    }

    #[test]
    fn tzid_applies_to_both_timestamps() {
        let text = wrap(
            "DTSTART;TZID=Europe/Prague:20210101T120000\n\
             DTEND;TZID=Europe/Prague:20210101T130000",
        );
        let events = parse_calendar_text(&text);

        let event = &events[0];
        assert_eq!(event.timezone.as_deref(), Some("Europe/Prague"));
        assert_eq!(
            event.dtstart,
            Some(prague().with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            event.start_utc(),
            Some(Utc.with_ymd_and_hms(2021, 1, 1, 11, 0, 0).unwrap())
        );
        assert_eq!(
            event.end_utc(),
            Some(Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn tzid_seen_first_carries_to_later_plain_timestamp() {
        let text = wrap(
            "DTSTART;TZID=Europe/Prague:20210101T120000\n\
             DTEND:20210101T130000",
        );
        let event = &parse_calendar_text(&text)[0];

        assert_eq!(
            event.dtend,
            Some(prague().with_ymd_and_hms(2021, 1, 1, 13, 0, 0).unwrap())
        );
    }

    #[test]
    fn last_tzid_wins() {
        let text = wrap(
            "DTSTART;TZID=Europe/Prague:20210101T120000\n\
             DTEND;TZID=America/New_York:20210101T130000",
        );
        let event = &parse_calendar_text(&text)[0];

        assert_eq!(event.timezone.as_deref(), Some("America/New_York"));
        assert_eq!(event.dtstart.unwrap().timezone(), prague());
    }

    #[test]
    fn date_only_is_start_of_day_utc() {
        let text = wrap("DTSTART;VALUE=DATE:20210101\nDTEND;VALUE=DATE:20210102");
        let event = &parse_calendar_text(&text)[0];

        assert_eq!(
            event.dtstart,
            Some(Tz::UTC.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            event.dtend,
            Some(Tz::UTC.with_ymd_and_hms(2021, 1, 2, 0, 0, 0).unwrap())
        );
        assert!(!event.properties.contains_key("dtstart;value=date"));
    }

    #[test]
    fn date_only_uses_earlier_tzid() {
        let text = wrap(
            "DTEND;TZID=Europe/Prague:20210101T130000\n\
             DTSTART;VALUE=DATE:20210101",
        );
        let event = &parse_calendar_text(&text)[0];

        let start = event.dtstart.unwrap();
        assert_eq!(start.timezone(), prague());
        assert_eq!(start.hour(), 0);
    }

    #[test]
    fn value_date_with_trailing_tzid() {
        let text = wrap("DTSTART;VALUE=DATE;TZID=Europe/Prague:20210101");
        let event = &parse_calendar_text(&text)[0];

        assert_eq!(
            event.dtstart,
            Some(prague().with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(event.timezone.as_deref(), Some("Europe/Prague"));
        assert!(event.properties.is_empty());
    }

    #[test]
    fn tzid_followed_by_other_parameters() {
        let text = wrap("DTSTART;TZID=Europe/Prague;VALUE=DATE:20210101");
        let event = &parse_calendar_text(&text)[0];

        assert_eq!(event.timezone.as_deref(), Some("Europe/Prague"));
        assert_eq!(
            event.dtstart,
            Some(prague().with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn value_keeps_colons_after_the_first() {
        let text = wrap("URL:https://example.test/meeting?id=1:2");
        let event = &parse_calendar_text(&text)[0];
        assert_eq!(event.property("url"), Some("https://example.test/meeting?id=1:2"));
    }

    #[test]
    fn utc_suffix_forces_utc() {
        let text = wrap(
            "DTSTART;TZID=Europe/Prague:20210101T120000\n\
             DTEND:20210101T130000Z",
        );
        let event = &parse_calendar_text(&text)[0];

        assert_eq!(
            event.dtend,
            Some(Tz::UTC.with_ymd_and_hms(2021, 1, 1, 13, 0, 0).unwrap())
        );
    }

    #[test]
    fn unterminated_event_yields_nothing() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nSUMMARY:Lost\nDTSTART:20210101T120000\n";
        assert!(parse_calendar_text(text).is_empty());
    }

    #[test]
    fn unterminated_event_after_complete_one() {
        let text = "BEGIN:VEVENT\nSUMMARY:Kept\nEND:VEVENT\nBEGIN:VEVENT\nSUMMARY:Lost\n";
        let events = parse_calendar_text(text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary.as_deref(), Some("Kept"));
    }

    #[test]
    fn restarted_event_discards_partial_state() {
        let text = "BEGIN:VEVENT\nSUMMARY:First\nBEGIN:VEVENT\nDESCRIPTION:Second\nEND:VEVENT\n";
        let events = parse_calendar_text(text);

        assert_eq!(events.len(), 1);
        assert!(events[0].summary.is_none());
        assert_eq!(events[0].description.as_deref(), Some("Second"));
    }

    #[test]
    fn ignores_lines_outside_events_and_without_colon() {
        let text = "PRODID:-//Apple Inc.//iCloud//EN\n\
                    BEGIN:VEVENT\n\
                    garbage line\n\
                    SUMMARY:Kept\n\
                    END:VEVENT\n\
                    SUMMARY:Outside";
        let events = parse_calendar_text(text);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary.as_deref(), Some("Kept"));
        assert!(events[0].property("prodid").is_none());
    }

    #[test]
    fn handles_crlf_and_indentation() {
        let text = "BEGIN:VCALENDAR\r\n  BEGIN:VEVENT\r\n    SUMMARY:Indented\r\n  END:VEVENT\r\nEND:VCALENDAR\r\n";
        let events = parse_calendar_text(text);
        assert_eq!(events[0].summary.as_deref(), Some("Indented"));
    }

    #[test]
    fn nested_alarm_does_not_override_event_fields() {
        let text = wrap(
            "SUMMARY:Dentist\n\
             DESCRIPTION:Checkup\n\
             BEGIN:VALARM\n\
             ACTION:DISPLAY\n\
             DESCRIPTION:Reminder\n\
             END:VALARM\n\
             LOCATION:Clinic",
        );
        let event = &parse_calendar_text(&text)[0];

        assert_eq!(event.description.as_deref(), Some("Checkup"));
        assert!(event.property("action").is_none());
        assert_eq!(event.property("location"), Some("Clinic"));
    }

    #[test]
    fn collects_attendees() {
        let text = wrap(
            "ATTENDEE;CN=John Doe:mailto:john@doe.test\n\
             ATTENDEE;ROLE=REQ-PARTICIPANT;CN=\"Jane Roe\":MAILTO:jane@roe.test\n\
             ATTENDEE:mailto:anon@example.test",
        );
        let event = &parse_calendar_text(&text)[0];

        assert_eq!(
            event.attendees,
            vec![
                Attendee::new("John Doe", "john@doe.test"),
                Attendee::new("Jane Roe", "jane@roe.test"),
            ]
        );
        assert_eq!(
            event.property("attendee;cn=john doe"),
            Some("mailto:john@doe.test")
        );
    }

    #[test]
    fn multiple_events_in_order() {
        let text = "BEGIN:VEVENT\nSUMMARY:One\nEND:VEVENT\nBEGIN:VEVENT\nSUMMARY:Two\nEND:VEVENT\n";
        let summaries: Vec<_> = parse_calendar_text(text)
            .into_iter()
            .filter_map(|e| e.summary)
            .collect();
        assert_eq!(summaries, ["One", "Two"]);
    }

    #[test]
    fn lenient_drops_bad_dates_and_unknown_zones() {
        let text = wrap(
            "DTSTART;TZID=Mars/Olympus:20210101T120000\n\
             DTEND:not-a-date",
        );
        let event = &parse_calendar_text(&text)[0];

        assert_eq!(event.timezone.as_deref(), Some("Mars/Olympus"));
        assert_eq!(
            event.dtstart,
            Some(Tz::UTC.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap())
        );
        assert!(event.dtend.is_none());
    }

    #[test]
    fn strict_reports_unterminated_event() {
        let text = "BEGIN:VEVENT\nSUMMARY:Lost\n";
        assert_eq!(
            parse_calendar_text_with(text, ParseMode::Strict),
            Err(ParseError::UnterminatedEvent)
        );
    }

    #[test]
    fn strict_reports_missing_colon() {
        let text = wrap("garbage line");
        assert_eq!(
            parse_calendar_text_with(&text, ParseMode::Strict),
            Err(ParseError::MissingColon {
                line: "garbage line".to_string()
            })
        );
    }

    #[test]
    fn strict_reports_invalid_date() {
        let text = wrap("DTSTART:2021-01-01");
        assert_eq!(
            parse_calendar_text_with(&text, ParseMode::Strict),
            Err(ParseError::InvalidDate {
                property: "DTSTART".to_string(),
                value: "2021-01-01".to_string()
            })
        );
    }

    #[test]
    fn strict_reports_unknown_timezone() {
        let text = wrap("DTSTART;TZID=Mars/Olympus:20210101T120000");
        assert_eq!(
            parse_calendar_text_with(&text, ParseMode::Strict),
            Err(ParseError::UnknownTimezone {
                tzid: "Mars/Olympus".to_string()
            })
        );
    }

    #[test]
    fn strict_accepts_well_formed_input() {
        let text = wrap("SUMMARY:Fine\nDTSTART:20210101T120000Z");
        let events = parse_calendar_text_with(&text, ParseMode::Strict).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn dst_gap_moves_forward() {
        // 02:30 does not exist in Prague on 2021-03-28.
        let text = wrap("DTSTART;TZID=Europe/Prague:20210328T023000");
        let start = parse_calendar_text(&text)[0].dtstart.unwrap();
        assert_eq!(start.hour(), 3);
        assert_eq!(start.minute(), 30);
    }

    #[test]
    fn encoder_output_parses_back() {
        let draft = EventDraft::new(
            "Planning",
            Utc.with_ymd_and_hms(2024, 3, 10, 9, 15, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 10, 45, 30).unwrap(),
        )
        .with_description("Quarterly goals")
        .with_attendee(Attendee::new("Ann", "ann@example.test"));

        let events = parse_calendar_text(&encode_event("abc@zaptime.app", &draft));

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.summary.as_deref(), Some("Planning"));
        assert_eq!(event.description.as_deref(), Some("Quarterly goals"));
        assert_eq!(event.start_utc(), Some(draft.start));
        assert_eq!(event.end_utc(), Some(draft.end));
        assert_eq!(event.uid(), Some("abc@zaptime.app"));
        assert_eq!(event.attendees, draft.attendees);
    }
}
