//! [`CalendarClient`] over CalDAV.

use std::future::Future;

use chrono::Utc;
use secretary_core::Component;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::client::{
    BoxFuture, CalendarClient, CalendarInfo, CalendarObject, NewObject, ObjectQuery,
    is_completed_todo,
};
use crate::error::{ProviderError, ProviderResult};
use crate::ics;

use super::config::CalDavConfig;
use super::http::{DavRequest, Transport};
use super::xml;

const NAME: &str = "caldav";

/// A CalDAV server account.
///
/// The calendar home is discovered on first use from the configured URL
/// (`calendar-home-set`, directly or through `current-user-principal`) and
/// falls back to the URL itself.
pub struct CalDavClient {
    transport: Mutex<Transport>,
    base: Url,
    home: Mutex<Option<Url>>,
}

impl std::fmt::Debug for CalDavClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalDavClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl CalDavClient {
    pub fn new(config: CalDavConfig) -> ProviderResult<Self> {
        let base = config.url.clone();
        let transport = Transport::new(config).map_err(|e| e.with_provider(NAME))?;
        Ok(Self {
            transport: Mutex::new(transport),
            base,
            home: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn send(&self, request: DavRequest) -> ProviderResult<super::http::DavResponse> {
        self.transport.lock().await.send(&request).await
    }

    async fn find_href(&self, url: &Url, property: &str) -> ProviderResult<Option<Url>> {
        let response = self
            .send(DavRequest::propfind(url.clone(), 0, xml::propfind_home_body()?))
            .await?;
        xml::parse_href_property(&response.body, property)?
            .map(|href| resolve(url, &href))
            .transpose()
    }

    async fn calendar_home(&self) -> ProviderResult<Url> {
        let mut home = self.home.lock().await;
        if let Some(url) = home.as_ref() {
            return Ok(url.clone());
        }

        let discovered = match self.find_href(&self.base, "calendar-home-set").await? {
            Some(url) => Some(url),
            None => match self.find_href(&self.base, "current-user-principal").await? {
                Some(principal) => self.find_href(&principal, "calendar-home-set").await?,
                None => None,
            },
        };
        let url = discovered.unwrap_or_else(|| self.base.clone());
        debug!(home = %url, "resolved calendar home");
        *home = Some(url.clone());
        Ok(url)
    }

    async fn fetch_calendars(&self) -> ProviderResult<Vec<CalendarInfo>> {
        let home = self.calendar_home().await?;
        let response = self
            .send(DavRequest::propfind(home.clone(), 1, xml::propfind_calendars_body()?))
            .await?;

        let calendars = xml::parse_propfind_response(&response.body)?
            .into_iter()
            .map(|found| {
                let url = resolve(&home, &found.href)?;
                let name = found
                    .display_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| last_segment(&found.href).to_string());
                let mut info = CalendarInfo::new(url.as_str(), name);
                info.description = found.description;
                Ok(info)
            })
            .collect::<ProviderResult<Vec<_>>>()?;

        debug!(count = calendars.len(), "discovered calendars");
        Ok(calendars)
    }

    async fn make_calendar(&self, name: &str) -> ProviderResult<CalendarInfo> {
        let home = self.calendar_home().await?;
        let url = resolve(&home, &format!("{}/", Uuid::new_v4().simple()))?;
        self.send(DavRequest::mkcalendar(url.clone(), xml::mkcalendar_body(name)?))
            .await?;
        info!(calendar = %name, url = %url, "created calendar collection");
        Ok(CalendarInfo::new(url.as_str(), name))
    }

    async fn query(
        &self,
        calendar: &CalendarInfo,
        query: ObjectQuery,
    ) -> ProviderResult<Vec<CalendarObject>> {
        let url = parse_url(&calendar.id)?;
        let body = xml::calendar_query_body(query.component, query.window, query.expand)?;
        let response = self.send(DavRequest::report(url.clone(), body)).await?;

        let mut objects = Vec::new();
        for item in xml::parse_report_response(&response.body)? {
            if query.component == Component::Todo
                && !query.include_completed
                && is_completed_todo(&item.data)
            {
                continue;
            }
            let href = resolve(&url, &item.href)?;
            let pieces = if query.expand {
                split_components(&item.data, query.component)
            } else {
                vec![item.data]
            };
            for data in pieces {
                let mut object = CalendarObject::new(href.as_str(), data);
                object.etag = item.etag.clone();
                objects.push(object);
            }
        }

        debug!(
            calendar = %calendar.name,
            component = %query.component,
            count = objects.len(),
            "listed objects"
        );
        Ok(objects)
    }

    async fn create(
        &self,
        calendar: &CalendarInfo,
        object: NewObject,
    ) -> ProviderResult<CalendarObject> {
        let uid = Uuid::new_v4().to_string();
        let data = ics::render(&object, &uid, Utc::now());
        let url = resolve(&parse_url(&calendar.id)?, &format!("{uid}.ics"))?;

        let response = self
            .send(DavRequest::put(url.clone(), data.clone(), None))
            .await?;
        debug!(calendar = %calendar.name, href = %url, "stored new object");

        let mut stored = CalendarObject::new(url.as_str(), data);
        stored.etag = response.etag;
        Ok(stored)
    }

    async fn update(&self, object: &CalendarObject) -> ProviderResult<()> {
        let url = parse_url(&object.href)?;
        self.send(DavRequest::put(url, object.data.clone(), object.etag.as_deref()))
            .await?;
        debug!(href = %object.href, "saved object");
        Ok(())
    }

    async fn remove(&self, object: &CalendarObject) -> ProviderResult<()> {
        let url = parse_url(&object.href)?;
        self.send(DavRequest::delete(url, object.etag.as_deref()))
            .await?;
        debug!(href = %object.href, "deleted object");
        Ok(())
    }
}

async fn tagged<T>(future: impl Future<Output = ProviderResult<T>>) -> ProviderResult<T> {
    future.await.map_err(|e| e.with_provider(NAME))
}

impl CalendarClient for CalDavClient {
    fn name(&self) -> &str {
        NAME
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
        Box::pin(tagged(self.fetch_calendars()))
    }

    fn create_calendar<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        Box::pin(tagged(self.make_calendar(name)))
    }

    fn list_objects<'a>(
        &'a self,
        calendar: &'a CalendarInfo,
        query: ObjectQuery,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarObject>>> {
        Box::pin(tagged(self.query(calendar, query)))
    }

    fn save_new<'a>(
        &'a self,
        calendar: &'a CalendarInfo,
        object: NewObject,
    ) -> BoxFuture<'a, ProviderResult<CalendarObject>> {
        Box::pin(tagged(self.create(calendar, object)))
    }

    fn save<'a>(&'a self, object: &'a CalendarObject) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(tagged(self.update(object)))
    }

    fn delete<'a>(&'a self, object: &'a CalendarObject) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(tagged(self.remove(object)))
    }
}

fn parse_url(value: &str) -> ProviderResult<Url> {
    Url::parse(value).map_err(|e| ProviderError::internal(format!("invalid URL {value}: {e}")))
}

fn resolve(base: &Url, href: &str) -> ProviderResult<Url> {
    base.join(href)
        .map_err(|e| ProviderError::invalid_response(format!("invalid href {href}: {e}")))
}

fn last_segment(href: &str) -> &str {
    href.trim_end_matches('/').rsplit('/').next().unwrap_or(href)
}

/// Splits an expanded calendar into one `VCALENDAR` per `component`
/// instance. Text holding a single instance is returned unchanged.
fn split_components(data: &str, component: Component) -> Vec<String> {
    let begin = format!("BEGIN:{component}");
    let end = format!("END:{component}");

    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in data.lines() {
        let trimmed = line.trim_end_matches('\r');
        if trimmed == begin {
            current = Some(vec![trimmed]);
        } else if let Some(block) = current.as_mut() {
            block.push(trimmed);
            if trimmed == end {
                blocks.extend(current.take());
            }
        }
    }

    if blocks.len() <= 1 {
        return vec![data.to_string()];
    }
    blocks
        .into_iter()
        .map(|block| {
            format!(
                "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:{}\r\n{}\r\nEND:VCALENDAR\r\n",
                ics::PRODID,
                block.join("\r\n")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let config = CalDavConfig::new("https://dav.example.com/calendars/alice")
            .unwrap()
            .with_credentials("alice", "pw");
        let client = CalDavClient::new(config).unwrap();
        assert_eq!(client.name(), "caldav");
        assert_eq!(client.base_url().as_str(), "https://dav.example.com/calendars/alice/");
    }

    #[test]
    fn href_resolution() {
        let base = Url::parse("https://dav.example.com/dav/calendars/alice/").unwrap();
        assert_eq!(
            resolve(&base, "/dav/calendars/alice/work/").unwrap().as_str(),
            "https://dav.example.com/dav/calendars/alice/work/"
        );
        assert_eq!(
            resolve(&base, "work/a.ics").unwrap().as_str(),
            "https://dav.example.com/dav/calendars/alice/work/a.ics"
        );
        assert!(parse_url("no scheme").is_err());
    }

    #[test]
    fn calendar_name_falls_back_to_path() {
        assert_eq!(last_segment("/dav/calendars/alice/work/"), "work");
        assert_eq!(last_segment("personal"), "personal");
    }

    mod splitting {
        use super::*;

        const EXPANDED: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\n\
BEGIN:VEVENT\r\nUID:standup\r\nRECURRENCE-ID:20250707T090000Z\r\nDTSTART:20250707T090000Z\r\nSUMMARY:Standup\r\nEND:VEVENT\r\n\
BEGIN:VEVENT\r\nUID:standup\r\nRECURRENCE-ID:20250708T090000Z\r\nDTSTART:20250708T090000Z\r\nSUMMARY:Standup\r\n\
BEGIN:VALARM\r\nTRIGGER:-PT5M\r\nEND:VALARM\r\nEND:VEVENT\r\n\
END:VCALENDAR\r\n";

        #[test]
        fn one_calendar_per_instance() {
            let pieces = split_components(EXPANDED, Component::Event);
            assert_eq!(pieces.len(), 2);
            assert!(pieces[0].contains("DTSTART:20250707T090000Z"));
            assert!(!pieces[0].contains("20250708"));
            assert!(pieces[1].contains("BEGIN:VALARM\r\nTRIGGER:-PT5M\r\nEND:VALARM"));
            for piece in &pieces {
                assert!(piece.starts_with("BEGIN:VCALENDAR\r\n"));
                assert!(piece.ends_with("END:VEVENT\r\nEND:VCALENDAR\r\n"));
            }
        }

        #[test]
        fn single_instance_is_untouched() {
            let data = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:x\nEND:VEVENT\nEND:VCALENDAR\n";
            assert_eq!(split_components(data, Component::Event), [data]);
        }
    }
}
