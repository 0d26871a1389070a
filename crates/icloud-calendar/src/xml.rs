//! XML bodies and multistatus parsing for PROPFIND and REPORT.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use icloud_calendar_core::format_utc_basic;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Writer};

use crate::error::{CalendarError, Result};
use crate::transport::{CALDAV_NS, DAV_NS, DavResource, PropName, PropValue};

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Generates a PROPFIND body requesting `props`.
pub fn propfind_body(props: &[PropName]) -> Result<String> {
    render(|writer| {
        let mut propfind = BytesStart::new("d:propfind");
        propfind.push_attribute(("xmlns:d", DAV_NS));
        propfind.push_attribute(("xmlns:c", CALDAV_NS));
        writer.write_event(Event::Start(propfind))?;
        writer.write_event(Event::Start(BytesStart::new("d:prop")))?;

        for prop in props {
            writer.write_event(Event::Empty(prop_element(prop)))?;
        }

        writer.write_event(Event::End(BytesEnd::new("d:prop")))?;
        writer.write_event(Event::End(BytesEnd::new("d:propfind")))?;
        Ok(())
    })
}

/// Generates a calendar-query REPORT body for VEVENTs overlapping the range.
pub fn calendar_query_body(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<String> {
    render(|writer| {
        let mut query = BytesStart::new("c:calendar-query");
        query.push_attribute(("xmlns:d", DAV_NS));
        query.push_attribute(("xmlns:c", CALDAV_NS));
        writer.write_event(Event::Start(query))?;

        writer.write_event(Event::Start(BytesStart::new("d:prop")))?;
        writer.write_event(Event::Empty(BytesStart::new("d:getetag")))?;
        writer.write_event(Event::Empty(BytesStart::new("c:calendar-data")))?;
        writer.write_event(Event::End(BytesEnd::new("d:prop")))?;

        writer.write_event(Event::Start(BytesStart::new("c:filter")))?;
        let mut vcalendar = BytesStart::new("c:comp-filter");
        vcalendar.push_attribute(("name", "VCALENDAR"));
        writer.write_event(Event::Start(vcalendar))?;
        let mut vevent = BytesStart::new("c:comp-filter");
        vevent.push_attribute(("name", "VEVENT"));
        writer.write_event(Event::Start(vevent))?;

        let mut time_range = BytesStart::new("c:time-range");
        time_range.push_attribute(("start", format_utc_basic(start).as_str()));
        time_range.push_attribute(("end", format_utc_basic(end).as_str()));
        writer.write_event(Event::Empty(time_range))?;

        writer.write_event(Event::End(BytesEnd::new("c:comp-filter")))?;
        writer.write_event(Event::End(BytesEnd::new("c:comp-filter")))?;
        writer.write_event(Event::End(BytesEnd::new("c:filter")))?;
        writer.write_event(Event::End(BytesEnd::new("c:calendar-query")))?;
        Ok(())
    })
}

fn render<F>(body: F) -> Result<String>
where
    F: FnOnce(&mut XmlWriter) -> std::result::Result<(), quick_xml::Error>,
{
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_document(&mut writer, body).map_err(|e| {
        CalendarError::invalid_request(format!("Failed to build XML body: {}", e)).with_source(e)
    })?;

    Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
}

fn write_document<F>(writer: &mut XmlWriter, body: F) -> std::result::Result<(), quick_xml::Error>
where
    F: FnOnce(&mut XmlWriter) -> std::result::Result<(), quick_xml::Error>,
{
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    body(writer)
}

/// `d:` / `c:` prefixed element for the well-known namespaces, an inline
/// declaration for anything else.
fn prop_element(prop: &PropName) -> BytesStart<'static> {
    match prop.namespace {
        DAV_NS => BytesStart::new(format!("d:{}", prop.name)),
        CALDAV_NS => BytesStart::new(format!("c:{}", prop.name)),
        other => {
            let mut element = BytesStart::new(format!("x:{}", prop.name));
            element.push_attribute(("xmlns:x", other));
            element
        }
    }
}

/// A property being read, from its start tag to its end tag.
struct Capture {
    name: PropName,
    /// Element stack depth of the property element itself.
    depth: usize,
    text: String,
    href: Option<String>,
    children: Vec<String>,
}

impl Capture {
    fn into_value(self) -> (PropName, PropValue) {
        let value = if let Some(href) = self.href {
            PropValue::Href(href)
        } else if !self.children.is_empty() {
            PropValue::ResourceTypes(self.children)
        } else if !self.text.is_empty() {
            PropValue::Text(self.text)
        } else {
            PropValue::Empty
        };
        (self.name, value)
    }
}

#[derive(Default)]
struct ResponseState {
    href: Option<String>,
    props: Vec<(PropName, PropValue)>,
    propstat_props: Vec<(PropName, PropValue)>,
    propstat_status: Option<u16>,
}

/// Parses a `207 Multi-Status` body.
///
/// Only the properties listed in `requested` are collected, and only from
/// propstats whose status is 2xx (or missing). Resources come back in
/// document order.
pub fn parse_multistatus(xml: &str, requested: &[PropName]) -> Result<Vec<DavResource>> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut resources = Vec::new();
    let mut stack: Vec<(String, String)> = Vec::new();
    let mut response: Option<ResponseState> = None;
    let mut capture: Option<Capture> = None;
    let mut buf = Vec::new();

    loop {
        let (resolved, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| {
                CalendarError::invalid_response(format!("Malformed multistatus XML: {}", e))
                    .with_source(e)
            })?;
        let namespace = namespace_of(&resolved);

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let is_empty = matches!(event, Event::Empty(_));

                if namespace == DAV_NS {
                    match local.as_str() {
                        "response" => response = Some(ResponseState::default()),
                        "propstat" => {
                            if let Some(state) = response.as_mut() {
                                state.propstat_props.clear();
                                state.propstat_status = None;
                            }
                        }
                        _ => {}
                    }
                }

                if let Some(cap) = capture.as_mut() {
                    if stack.len() == cap.depth && !(namespace == DAV_NS && local == "href") {
                        cap.children.push(format!("{{{}}}{}", namespace, local));
                    }
                } else if parent_is(&stack, DAV_NS, "prop")
                    && let Some(name) = requested.iter().find(|p| p.matches(&namespace, &local))
                {
                    let cap = Capture {
                        name: *name,
                        depth: stack.len() + 1,
                        text: String::new(),
                        href: None,
                        children: Vec::new(),
                    };
                    if is_empty {
                        if let Some(state) = response.as_mut() {
                            state.propstat_props.push(cap.into_value());
                        }
                    } else {
                        capture = Some(cap);
                    }
                }

                if !is_empty {
                    stack.push((namespace, local));
                }
            }
            Event::Text(ref e) => {
                let text = e.unescape().map_err(|err| {
                    CalendarError::invalid_response(format!("Invalid XML text: {}", err))
                        .with_source(err)
                })?;
                handle_text(&text, &stack, response.as_mut(), capture.as_mut());
            }
            Event::CData(ref e) => {
                let text = String::from_utf8_lossy(e);
                handle_text(&text, &stack, response.as_mut(), capture.as_mut());
            }
            Event::End(_) => {
                let depth = stack.len();
                let (ns, local) = stack.pop().unwrap_or_default();

                if capture.as_ref().is_some_and(|cap| cap.depth == depth)
                    && let Some(cap) = capture.take()
                    && let Some(state) = response.as_mut()
                {
                    state.propstat_props.push(cap.into_value());
                }

                if ns == DAV_NS {
                    match local.as_str() {
                        "propstat" => {
                            if let Some(state) = response.as_mut() {
                                let ok = state
                                    .propstat_status
                                    .is_none_or(|s| (200..300).contains(&s));
                                let props = std::mem::take(&mut state.propstat_props);
                                if ok {
                                    state.props.extend(props);
                                }
                            }
                        }
                        "response" => {
                            if let Some(state) = response.take()
                                && let Some(href) = state.href
                            {
                                resources.push(DavResource {
                                    href,
                                    props: state.props,
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(resources)
}

fn handle_text(
    text: &str,
    stack: &[(String, String)],
    response: Option<&mut ResponseState>,
    capture: Option<&mut Capture>,
) {
    let in_href = stack
        .last()
        .is_some_and(|(ns, local)| ns == DAV_NS && local == "href");

    if let Some(cap) = capture {
        if in_href {
            cap.href = Some(text.trim().to_string());
        } else if stack.len() == cap.depth {
            cap.text.push_str(text);
        }
        return;
    }

    let Some(state) = response else {
        return;
    };

    if in_href && parent_is(&stack[..stack.len() - 1], DAV_NS, "response") {
        state.href = Some(text.trim().to_string());
    } else if stack
        .last()
        .is_some_and(|(ns, local)| ns == DAV_NS && local == "status")
        && parent_is(&stack[..stack.len() - 1], DAV_NS, "propstat")
    {
        state.propstat_status = parse_status_line(text);
    }
}

/// Whether the innermost open element is `{namespace}local`.
fn parent_is(stack: &[(String, String)], namespace: &str, local: &str) -> bool {
    stack
        .last()
        .is_some_and(|(ns, name)| ns == namespace && name == local)
}

/// Extracts the code from `HTTP/1.1 200 OK`.
fn parse_status_line(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1)?.parse().ok()
}

fn namespace_of(resolved: &ResolveResult<'_>) -> String {
    match resolved {
        ResolveResult::Bound(Namespace(ns)) => String::from_utf8_lossy(ns).into_owned(),
        _ => String::new(),
    }
}
