// smallweb-indexer is a vertical search indexing pipeline for independently
// owned personal and small websites.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use url::Url;

use super::{FeedKind, ParsedFeed};
use crate::dated_url::DatedUrl;

pub fn parse(kind: FeedKind, s: &str) -> ParsedFeed {
    match kind {
        FeedKind::Rss => parse_rss(s),
        FeedKind::Atom => parse_atom(s),
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn parse_rss(s: &str) -> ParsedFeed {
    let mut reader = quick_xml::Reader::from_str(s);

    let mut links = Vec::new();

    let mut in_item = false;
    let mut in_link = false;
    let mut in_pub_date = false;

    let mut current_url: Option<Url> = None;
    let mut current_date: Option<DateTime<Utc>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"item" => in_item = true,
                b"link" if in_item => in_link = true,
                b"pubDate" if in_item => in_pub_date = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"item" => {
                    in_item = false;
                    if let Some(url) = current_url.take() {
                        links.push(DatedUrl {
                            url,
                            last_modified: current_date.take(),
                        });
                    }
                }
                b"link" => in_link = false,
                b"pubDate" => in_pub_date = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if in_link {
                    if let Ok(url) = Url::parse(&text) {
                        current_url = Some(url);
                    }
                } else if in_pub_date {
                    current_date = parse_date(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("failed to parse rss feed: {}", e);
                break;
            }
            _ => (),
        }
    }

    ParsedFeed { links }
}

fn parse_atom(s: &str) -> ParsedFeed {
    let mut reader = quick_xml::Reader::from_str(s);

    let mut links = Vec::new();

    let mut in_entry = false;
    let mut in_updated = false;

    let mut current_url: Option<Url> = None;
    let mut current_date: Option<DateTime<Utc>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.name().as_ref() {
                    b"entry" => in_entry = true,
                    b"link" if in_entry && current_url.is_none() => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"href" {
                                if let Ok(value) = attr.unescape_value() {
                                    if let Ok(url) = Url::parse(&value) {
                                        current_url = Some(url);
                                    }
                                }
                            }
                        }
                    }
                    b"updated" if in_entry => in_updated = true,
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"entry" => {
                    in_entry = false;
                    if let Some(url) = current_url.take() {
                        links.push(DatedUrl {
                            url,
                            last_modified: current_date.take(),
                        });
                    }
                }
                b"updated" => in_updated = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_updated {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    current_date = parse_date(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("failed to parse atom feed: {}", e);
                break;
            }
            _ => (),
        }
    }

    ParsedFeed { links }
}
