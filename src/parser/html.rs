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

//! HTML-only field extraction: title, metadata, body text, and links.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static META_AUTHOR: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[name="author"]"#).unwrap());
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static META_OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());
static META_KEYWORDS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="keywords"]"#).unwrap());
static META_ARTICLE_TAG: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="article:tag"]"#).unwrap());
static META_OG_TYPE: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[property="og:type"]"#).unwrap());
static ARTICLE_POST_TYPE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"article[data-post-type]"#).unwrap());
static META_PUBLISHED_TIME: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="article:published_time"]"#).unwrap());
static META_DC_DATE: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[name="dc.date.issued"]"#).unwrap());
static META_DATE_PUBLISHED: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[itemprop="datePublished"]"#).unwrap());
static ADSBYGOOGLE: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"ins[class~="adsbygoogle"]"#).unwrap());
static HTML_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("html").unwrap());
static MAIN: Lazy<Selector> = Lazy::new(|| Selector::parse("main").unwrap());
static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static NAV_HEADER_FOOTER: Lazy<Selector> = Lazy::new(|| Selector::parse("nav, header, footer").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

pub fn title(html: &Html) -> Option<String> {
    html.select(&TITLE)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn meta_content(html: &Html, sel: &Selector) -> Option<String> {
    html.select(sel)
        .next()
        .and_then(|e| e.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn author(html: &Html) -> Option<String> {
    meta_content(html, &META_AUTHOR)
}

pub fn description(html: &Html) -> Option<String> {
    meta_content(html, &META_DESCRIPTION).or_else(|| meta_content(html, &META_OG_DESCRIPTION))
}

/// Splits on commas; falls back to whitespace only when there are no commas
/// and more than one space.
pub fn tags(html: &Html) -> Vec<String> {
    let raw = meta_content(html, &META_KEYWORDS).or_else(|| meta_content(html, &META_ARTICLE_TAG));

    let Some(raw) = raw else {
        return Vec::new();
    };

    let use_whitespace = !raw.contains(',') && raw.matches(' ').count() > 1;

    let parts: Vec<&str> = if use_whitespace {
        raw.split_whitespace().collect()
    } else {
        raw.split(',').collect()
    };

    parts
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn page_type(html: &Html) -> Option<String> {
    meta_content(html, &META_OG_TYPE).or_else(|| {
        html.select(&ARTICLE_POST_TYPE)
            .next()
            .and_then(|e| e.value().attr("data-post-type"))
            .map(str::to_string)
    })
}

/// Extracts plain text from `<main>` if present, else `<article>`, else
/// `<body>`, with `<nav>`, `<header>`, `<footer>` removed and whitespace
/// collapsed.
pub fn content(html: &Html) -> Option<String> {
    let container = html
        .select(&MAIN)
        .next()
        .or_else(|| html.select(&ARTICLE).next())
        .or_else(|| html.select(&BODY).next())?;

    let excluded: std::collections::HashSet<_> = container
        .select(&NAV_HEADER_FOOTER)
        .flat_map(|e| e.descendants().map(|n| n.id()).chain(std::iter::once(e.id())))
        .collect();

    let mut text = String::new();
    for node in container.descendants() {
        if excluded.contains(&node.id()) {
            continue;
        }
        if let Some(t) = node.value().as_text() {
            text.push_str(t);
            text.push(' ');
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

pub fn published_date(html: &Html) -> Option<String> {
    meta_content(html, &META_PUBLISHED_TIME)
        .or_else(|| meta_content(html, &META_DC_DATE))
        .or_else(|| {
            html.select(&META_DATE_PUBLISHED).next().and_then(|e| {
                e.value()
                    .attr("content")
                    .map(str::to_string)
                    .or_else(|| Some(e.text().collect::<String>().trim().to_string()))
            })
        })
}

pub fn contains_adverts(html: &Html) -> bool {
    html.select(&ADSBYGOOGLE).next().is_some()
}

pub fn language(html: &Html) -> Option<String> {
    html.select(&HTML_TAG)
        .next()
        .and_then(|e| e.value().attr("lang"))
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

pub fn language_primary(language: &str) -> Option<String> {
    language.get(0..2).map(str::to_string)
}

/// Every `<a href>` on the page, resolved against `base`. Malformed hrefs
/// are silently skipped.
pub fn extract_links(html: &Html, base: &Url) -> Vec<Url> {
    html.select(&ANCHOR)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| crate::url_ext::UrlExt::parse_with_base_url(base, href).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(s: &str) -> Html {
        Html::parse_document(s)
    }

    #[test]
    fn extracts_title() {
        let doc = html("<html><head><title>Example</title></head><body></body></html>");
        assert_eq!(title(&doc).as_deref(), Some("Example"));
    }

    #[test]
    fn extracts_description_prefers_name_over_og() {
        let doc = html(
            r#"<html><head>
            <meta name="description" content="A">
            <meta property="og:description" content="B">
            </head></html>"#,
        );
        assert_eq!(description(&doc).as_deref(), Some("A"));
    }

    #[test]
    fn tags_split_on_commas() {
        let doc = html(r#"<html><head><meta name="keywords" content="a, b,c"></head></html>"#);
        assert_eq!(tags(&doc), vec!["a", "b", "c"]);
    }

    #[test]
    fn tags_split_on_whitespace_without_commas() {
        let doc = html(r#"<html><head><meta name="keywords" content="a b c"></head></html>"#);
        assert_eq!(tags(&doc), vec!["a", "b", "c"]);
    }

    #[test]
    fn single_word_tag_is_not_split() {
        let doc = html(r#"<html><head><meta name="keywords" content="solo"></head></html>"#);
        assert_eq!(tags(&doc), vec!["solo"]);
    }

    #[test]
    fn content_prefers_main_and_strips_nav() {
        let doc = html(
            "<html><body><nav>Menu</nav><main>Hello <b>world</b></main><footer>F</footer></body></html>",
        );
        assert_eq!(content(&doc).as_deref(), Some("Hello world"));
    }

    #[test]
    fn content_falls_back_to_body() {
        let doc = html("<html><body><header>H</header>Just text</body></html>");
        assert_eq!(content(&doc).as_deref(), Some("Just text"));
    }

    #[test]
    fn detects_adsbygoogle() {
        let doc = html(r#"<html><body><ins class="adsbygoogle foo"></ins></body></html>"#);
        assert!(contains_adverts(&doc));
        let doc = html("<html><body></body></html>");
        assert!(!contains_adverts(&doc));
    }

    #[test]
    fn language_primary_takes_first_two_chars() {
        assert_eq!(language_primary("en-GB").as_deref(), Some("en"));
    }

    #[test]
    fn extracts_links_resolved_against_base() {
        let doc = html(r#"<html><body><a href="/a">A</a><a href="https://other.com/b">B</a></body></html>"#);
        let base = Url::parse("https://example.com/").unwrap();
        let links = extract_links(&doc, &base);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].as_str(), "https://example.com/a");
        assert_eq!(links[1].as_str(), "https://other.com/b");
    }
}
