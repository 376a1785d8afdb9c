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

//! XML field extraction. A crawled XML page's `page_type` is its root
//! element's local name, and it is treated as a web feed if that root is
//! a recognised feed element (`rss`, `feed`, or RDF's `RDF`).

use quick_xml::events::Event;

pub struct XmlInfo {
    pub page_type: Option<String>,
    pub is_web_feed: bool,
}

fn local_name(tag: &[u8]) -> String {
    let s = String::from_utf8_lossy(tag);
    s.rsplit(':').next().unwrap_or(&s).to_string()
}

/// The text of the first `<title>` element anywhere in the document, if
/// any — covers RSS `channel/title`, Atom `feed/title`, and a bare
/// top-level `<title>`.
pub fn extract_title(s: &str) -> Option<String> {
    let mut reader = quick_xml::Reader::from_str(s);
    let mut in_title = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == "title" => in_title = true,
            Ok(Event::End(ref e)) if local_name(e.name().as_ref()) == "title" => in_title = false,
            Ok(Event::Text(e)) if in_title => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => (),
        }
    }

    None
}

pub fn inspect(s: &str) -> XmlInfo {
    let mut reader = quick_xml::Reader::from_str(s);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = local_name(e.name().as_ref());
                let is_web_feed = matches!(name.as_str(), "rss" | "feed" | "RDF");
                return XmlInfo {
                    page_type: Some(name),
                    is_web_feed,
                };
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => (),
        }
    }

    XmlInfo {
        page_type: None,
        is_web_feed: false,
    }
}
