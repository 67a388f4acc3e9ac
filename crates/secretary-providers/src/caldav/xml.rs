//! WebDAV/CalDAV request bodies and multistatus parsing.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use secretary_core::time::format_ical_datetime;
use secretary_core::{Component, TimeWindow};

use crate::error::{ProviderError, ProviderResult};

pub const DAV_NS: &str = "DAV:";
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";
/// CalendarServer namespace (Apple extensions such as `getctag`).
pub const CS_NS: &str = "http://calendarserver.org/ns/";

/// A calendar collection found by PROPFIND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCalendar {
    pub href: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub ctag: Option<String>,
}

/// One object returned by a calendar-query REPORT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub href: String,
    pub etag: Option<String>,
    pub data: String,
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn xml_error(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::internal(format!("XML error: {e}"))
}

fn start(writer: &mut XmlWriter, element: BytesStart<'_>) -> ProviderResult<()> {
    writer.write_event(Event::Start(element)).map_err(xml_error)
}

fn end(writer: &mut XmlWriter, name: &str) -> ProviderResult<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

fn empty(writer: &mut XmlWriter, element: BytesStart<'_>) -> ProviderResult<()> {
    writer.write_event(Event::Empty(element)).map_err(xml_error)
}

fn root(name: &str, with_cs: bool) -> BytesStart<'_> {
    let mut element = BytesStart::new(name);
    element.push_attribute(("xmlns:d", DAV_NS));
    element.push_attribute(("xmlns:c", CALDAV_NS));
    if with_cs {
        element.push_attribute(("xmlns:cs", CS_NS));
    }
    element
}

fn finish(writer: XmlWriter) -> ProviderResult<String> {
    String::from_utf8(writer.into_inner().into_inner()).map_err(xml_error)
}

/// PROPFIND body asking for the properties that identify calendars.
pub fn propfind_calendars_body() -> ProviderResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    start(&mut writer, root("d:propfind", true))?;
    start(&mut writer, BytesStart::new("d:prop"))?;
    for name in [
        "d:displayname",
        "d:resourcetype",
        "c:calendar-description",
        "cs:getctag",
    ] {
        empty(&mut writer, BytesStart::new(name))?;
    }
    end(&mut writer, "d:prop")?;
    end(&mut writer, "d:propfind")?;
    finish(writer)
}

/// PROPFIND body for principal and calendar-home discovery.
pub fn propfind_home_body() -> ProviderResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    start(&mut writer, root("d:propfind", false))?;
    start(&mut writer, BytesStart::new("d:prop"))?;
    empty(&mut writer, BytesStart::new("d:current-user-principal"))?;
    empty(&mut writer, BytesStart::new("c:calendar-home-set"))?;
    end(&mut writer, "d:prop")?;
    end(&mut writer, "d:propfind")?;
    finish(writer)
}

/// calendar-query REPORT body selecting one component type.
///
/// With a window the server filters by time range; with `expand` it also
/// returns one instance per occurrence of recurring objects.
pub fn calendar_query_body(
    component: Component,
    window: Option<TimeWindow>,
    expand: bool,
) -> ProviderResult<String> {
    let range = window.map(|w| (format_ical_datetime(w.start), format_ical_datetime(w.end)));
    let time_range = |name: &'static str| {
        range.as_ref().map(|(from, to)| {
            let mut element = BytesStart::new(name);
            element.push_attribute(("start", from.as_str()));
            element.push_attribute(("end", to.as_str()));
            element
        })
    };

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    start(&mut writer, root("c:calendar-query", false))?;

    start(&mut writer, BytesStart::new("d:prop"))?;
    empty(&mut writer, BytesStart::new("d:getetag"))?;
    match time_range("c:expand") {
        Some(expansion) if expand => {
            start(&mut writer, BytesStart::new("c:calendar-data"))?;
            empty(&mut writer, expansion)?;
            end(&mut writer, "c:calendar-data")?;
        }
        _ => empty(&mut writer, BytesStart::new("c:calendar-data"))?,
    }
    end(&mut writer, "d:prop")?;

    start(&mut writer, BytesStart::new("c:filter"))?;
    let mut calendar_filter = BytesStart::new("c:comp-filter");
    calendar_filter.push_attribute(("name", "VCALENDAR"));
    start(&mut writer, calendar_filter)?;

    let mut component_filter = BytesStart::new("c:comp-filter");
    component_filter.push_attribute(("name", component.as_str()));
    match time_range("c:time-range") {
        Some(filter) => {
            start(&mut writer, component_filter)?;
            empty(&mut writer, filter)?;
            end(&mut writer, "c:comp-filter")?;
        }
        None => empty(&mut writer, component_filter)?,
    }

    end(&mut writer, "c:comp-filter")?;
    end(&mut writer, "c:filter")?;
    end(&mut writer, "c:calendar-query")?;
    finish(writer)
}

/// MKCALENDAR body naming the new collection and the components it holds.
pub fn mkcalendar_body(display_name: &str) -> ProviderResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    start(&mut writer, root("c:mkcalendar", false))?;
    start(&mut writer, BytesStart::new("d:set"))?;
    start(&mut writer, BytesStart::new("d:prop"))?;

    start(&mut writer, BytesStart::new("d:displayname"))?;
    writer
        .write_event(Event::Text(BytesText::new(display_name)))
        .map_err(xml_error)?;
    end(&mut writer, "d:displayname")?;

    start(&mut writer, BytesStart::new("c:supported-calendar-component-set"))?;
    for component in [Component::Event, Component::Todo, Component::Journal] {
        let mut comp = BytesStart::new("c:comp");
        comp.push_attribute(("name", component.as_str()));
        empty(&mut writer, comp)?;
    }
    end(&mut writer, "c:supported-calendar-component-set")?;

    end(&mut writer, "d:prop")?;
    end(&mut writer, "d:set")?;
    end(&mut writer, "c:mkcalendar")?;
    finish(writer)
}

fn read_error(e: quick_xml::Error) -> ProviderError {
    ProviderError::invalid_response(format!("malformed multistatus: {e}"))
}

fn element_name(name: quick_xml::name::QName<'_>) -> String {
    local_name(&String::from_utf8_lossy(name.as_ref())).to_string()
}

/// Parses a PROPFIND multistatus, keeping only calendar collections.
pub fn parse_propfind_response(xml: &str) -> ProviderResult<Vec<DiscoveredCalendar>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut calendars = Vec::new();
    let mut current = DiscoveredCalendar {
        href: String::new(),
        display_name: None,
        description: None,
        ctag: None,
    };
    let mut is_calendar = false;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event().map_err(read_error)? {
            Event::Start(e) => {
                let local = element_name(e.name());
                match local.as_str() {
                    "response" => {
                        current.href.clear();
                        current.display_name = None;
                        current.description = None;
                        current.ctag = None;
                        is_calendar = false;
                    }
                    "href" | "displayname" | "calendar-description" | "getctag" => {
                        field = Some(local);
                    }
                    "calendar" => is_calendar = true,
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if element_name(e.name()) == "calendar" {
                    is_calendar = true;
                }
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(read_error)?.into_owned();
                match field.as_deref() {
                    Some("href") if current.href.is_empty() => current.href = text,
                    Some("displayname") => current.display_name = Some(text),
                    Some("calendar-description") => current.description = Some(text),
                    Some("getctag") => current.ctag = Some(text),
                    _ => {}
                }
            }
            Event::End(e) => {
                if element_name(e.name()) == "response" && is_calendar && !current.href.is_empty()
                {
                    calendars.push(current.clone());
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(calendars)
}

/// Returns the first href nested in the `property` element of a PROPFIND
/// multistatus, e.g. `current-user-principal` or `calendar-home-set`.
pub fn parse_href_property(xml: &str, property: &str) -> ProviderResult<Option<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut inside = false;
    let mut in_href = false;

    loop {
        match reader.read_event().map_err(read_error)? {
            Event::Start(e) => {
                let local = element_name(e.name());
                if local == property {
                    inside = true;
                } else if inside && local == "href" {
                    in_href = true;
                }
            }
            Event::Text(e) if in_href => {
                return Ok(Some(e.unescape().map_err(read_error)?.into_owned()));
            }
            Event::End(e) => {
                let local = element_name(e.name());
                if local == property {
                    inside = false;
                }
                in_href = false;
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Parses a REPORT multistatus into its objects. Entries without
/// calendar data (e.g. 404 propstats) are skipped.
pub fn parse_report_response(xml: &str) -> ProviderResult<Vec<ReportItem>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut href = String::new();
    let mut etag: Option<String> = None;
    let mut data = String::new();
    let mut field: Option<String> = None;

    loop {
        let text = match reader.read_event().map_err(read_error)? {
            Event::Start(e) => {
                let local = element_name(e.name());
                match local.as_str() {
                    "response" => {
                        href.clear();
                        etag = None;
                        data.clear();
                    }
                    "href" | "getetag" | "calendar-data" => field = Some(local),
                    _ => {}
                }
                continue;
            }
            Event::End(e) => {
                if element_name(e.name()) == "response" && !href.is_empty() && !data.is_empty() {
                    items.push(ReportItem {
                        href: href.clone(),
                        etag: etag.take(),
                        data: std::mem::take(&mut data),
                    });
                }
                field = None;
                continue;
            }
            Event::Text(e) => e.unescape().map_err(read_error)?.into_owned(),
            Event::CData(e) => String::from_utf8_lossy(&e).into_owned(),
            Event::Eof => break,
            _ => continue,
        };

        match field.as_deref() {
            Some("href") if href.is_empty() => href = text,
            Some("getetag") => etag = Some(text.trim_matches('"').to_string()),
            Some("calendar-data") => data.push_str(&text),
            _ => {}
        }
    }

    Ok(items)
}

/// Strips a namespace prefix: `d:href` becomes `href`.
fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    mod bodies {
        use super::*;

        #[test]
        fn propfind_requests_calendar_properties() {
            let body = propfind_calendars_body().unwrap();
            assert!(body.starts_with("<d:propfind"));
            for prop in ["displayname", "resourcetype", "calendar-description", "getctag"] {
                assert!(body.contains(prop), "missing {prop}");
            }
        }

        #[test]
        fn query_without_window_has_no_time_range() {
            let body = calendar_query_body(Component::Todo, None, false).unwrap();
            assert!(body.contains(r#"<c:comp-filter name="VCALENDAR">"#));
            assert!(body.contains(r#"<c:comp-filter name="VTODO"/>"#));
            assert!(body.contains("<c:calendar-data/>"));
            assert!(!body.contains("time-range"));
            assert!(!body.contains("expand"));
        }

        #[test]
        fn expanded_query_carries_range_twice() {
            let window = TimeWindow::new(
                Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 7, 8, 0, 0, 0).unwrap(),
            )
            .unwrap();
            let body = calendar_query_body(Component::Event, Some(window), true).unwrap();
            assert!(body.contains(r#"<c:expand start="20250701T000000Z" end="20250708T000000Z"/>"#));
            assert!(
                body.contains(r#"<c:time-range start="20250701T000000Z" end="20250708T000000Z"/>"#)
            );
            assert!(body.contains(r#"name="VEVENT""#));
        }

        #[test]
        fn windowed_query_without_expand() {
            let window = TimeWindow::new(
                Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 7, 2, 0, 0, 0).unwrap(),
            )
            .unwrap();
            let body = calendar_query_body(Component::Event, Some(window), false).unwrap();
            assert!(body.contains("<c:calendar-data/>"));
            assert!(body.contains("c:time-range"));
        }

        #[test]
        fn mkcalendar_escapes_display_name() {
            let body = mkcalendar_body("Work & Play").unwrap();
            assert!(body.contains("<d:displayname>Work &amp; Play</d:displayname>"));
            assert!(body.contains(r#"<c:comp name="VTODO"/>"#));
            assert!(body.contains(r#"<c:comp name="VJOURNAL"/>"#));
        }
    }

    mod parsing {
        use super::*;

        const PROPFIND: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav" xmlns:cs="http://calendarserver.org/ns/">
  <d:response>
    <d:href>/dav/calendars/alice/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/></d:resourcetype>
      </d:prop>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/calendars/alice/work/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Work</d:displayname>
        <d:resourcetype><d:collection/><cal:calendar/></d:resourcetype>
        <cal:calendar-description>Office &amp; meetings</cal:calendar-description>
        <cs:getctag>"42"</cs:getctag>
      </d:prop>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/calendars/alice/home/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/><cal:calendar/></d:resourcetype>
      </d:prop>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

        #[test]
        fn propfind_keeps_calendars_only() {
            let calendars = parse_propfind_response(PROPFIND).unwrap();
            assert_eq!(calendars.len(), 2);
            assert_eq!(calendars[0].href, "/dav/calendars/alice/work/");
            assert_eq!(calendars[0].display_name.as_deref(), Some("Work"));
            assert_eq!(calendars[0].description.as_deref(), Some("Office & meetings"));
            assert_eq!(calendars[0].ctag.as_deref(), Some("\"42\""));
            assert_eq!(calendars[1].href, "/dav/calendars/alice/home/");
            assert!(calendars[1].display_name.is_none());
        }

        #[test]
        fn href_property_lookup() {
            let xml = r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav/</d:href>
    <d:propstat><d:prop>
      <d:current-user-principal><d:href>/dav/principals/alice/</d:href></d:current-user-principal>
      <c:calendar-home-set><d:href>/dav/calendars/alice/</d:href></c:calendar-home-set>
    </d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;
            assert_eq!(
                parse_href_property(xml, "calendar-home-set").unwrap().as_deref(),
                Some("/dav/calendars/alice/")
            );
            assert_eq!(
                parse_href_property(xml, "current-user-principal").unwrap().as_deref(),
                Some("/dav/principals/alice/")
            );
            assert_eq!(parse_href_property(xml, "owner").unwrap(), None);
        }

        #[test]
        fn report_items_with_text_and_cdata() {
            let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/cal/work/a.ics</d:href>
    <d:propstat><d:prop>
      <d:getetag>"abc"</d:getetag>
      <c:calendar-data>BEGIN:VCALENDAR
BEGIN:VTODO
SUMMARY:Fish &amp; chips
END:VTODO
END:VCALENDAR</c:calendar-data>
    </d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/cal/work/b.ics</d:href>
    <d:propstat><d:prop>
      <c:calendar-data><![CDATA[BEGIN:VCALENDAR
END:VCALENDAR]]></c:calendar-data>
    </d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/cal/work/gone.ics</d:href>
    <d:status>HTTP/1.1 404 Not Found</d:status>
  </d:response>
</d:multistatus>"#;
            let items = parse_report_response(xml).unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].href, "/cal/work/a.ics");
            assert_eq!(items[0].etag.as_deref(), Some("abc"));
            assert!(items[0].data.contains("SUMMARY:Fish & chips"));
            assert_eq!(items[1].etag, None);
            assert!(items[1].data.starts_with("BEGIN:VCALENDAR"));
        }

        #[test]
        fn malformed_xml_is_an_error() {
            let err = parse_report_response("<d:multistatus><d:response></d:oops>").unwrap_err();
            assert_eq!(err.code(), crate::ProviderErrorCode::InvalidResponse);
        }
    }

    #[test]
    fn local_name_strips_prefix() {
        assert_eq!(local_name("d:href"), "href");
        assert_eq!(local_name("href"), "href");
    }
}
