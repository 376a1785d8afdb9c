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

//! Domain identity: public suffix + label, with a subdomain-allow-list
//! overlay for sites that are registered at a shared root (e.g. hosted
//! blogging platforms) rather than under their own registrable domain.

use std::collections::HashSet;
use std::fmt;

use url::Host;

use crate::url_ext::UrlExt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Domain(String);

impl Domain {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rehydrates a `Domain` from a value already computed by
    /// `extract_domain` and persisted in the registry. Storage is the only
    /// caller that should reach for this instead of `extract_domain`.
    pub fn from_registry_value(s: impl Into<String>) -> Self {
        Domain(s.into())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Domain> for String {
    fn from(d: Domain) -> Self {
        d.0
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes a site's domain identity from a URL, per the registrable-domain
/// + subdomain-allow-list rule.
///
/// `subdomain_allow_suffixes` holds registrable domains (e.g.
/// `blogspot.com`) for which the label directly below the registrable
/// domain is kept as part of the identity, since many independently-run
/// sites share that root.
///
/// `localhost` and bare IP-literal hosts are not public-suffix domains;
/// they are preserved verbatim rather than rejected.
pub fn extract_domain(url: &url::Url, subdomain_allow_suffixes: &HashSet<String>) -> Option<Domain> {
    let host = url.host()?;

    if let Host::Domain(h) = &host {
        if h.eq_ignore_ascii_case("localhost") {
            return Some(Domain(h.to_string()));
        }
    } else {
        // IPv4 / IPv6 literal: no public suffix applies, keep as-is.
        return Some(Domain(host.to_string()));
    }

    let registrable = url.root_domain()?;

    if subdomain_allow_suffixes.contains(registrable) {
        // Only the single label directly below the registrable domain is
        // kept, not the whole subdomain chain (e.g. `a.b.alice.blogspot.com`
        // contributes just `alice`, not `a.b.alice`).
        let next_label = url.subdomain().filter(|s| !s.is_empty()).and_then(|s| s.rsplit('.').next());
        if let Some(label) = next_label {
            return Some(Domain(format!("{label}.{registrable}")));
        }
    }

    Some(Domain(registrable.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn allow(suffixes: &[&str]) -> HashSet<String> {
        suffixes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn plain_domain_has_no_subdomain_kept() {
        let url = Url::parse("https://www.example.com/post").unwrap();
        let domain = extract_domain(&url, &allow(&[])).unwrap();
        assert_eq!(domain.as_str(), "example.com");
    }

    #[test]
    fn allow_listed_suffix_keeps_subdomain() {
        let url = Url::parse("https://alice.blogspot.com/post").unwrap();
        let domain = extract_domain(&url, &allow(&["blogspot.com"])).unwrap();
        assert_eq!(domain.as_str(), "alice.blogspot.com");
    }

    #[test]
    fn allow_listed_suffix_without_subdomain_falls_back_to_registrable() {
        let url = Url::parse("https://blogspot.com/").unwrap();
        let domain = extract_domain(&url, &allow(&["blogspot.com"])).unwrap();
        assert_eq!(domain.as_str(), "blogspot.com");
    }

    #[test]
    fn non_allow_listed_suffix_drops_subdomain() {
        let url = Url::parse("https://alice.blogspot.com/post").unwrap();
        let domain = extract_domain(&url, &allow(&[])).unwrap();
        assert_eq!(domain.as_str(), "blogspot.com");
    }

    #[test]
    fn allow_listed_suffix_with_nested_subdomain_keeps_only_the_next_label() {
        let url = Url::parse("https://a.b.alice.blogspot.com/post").unwrap();
        let domain = extract_domain(&url, &allow(&["blogspot.com"])).unwrap();
        assert_eq!(domain.as_str(), "alice.blogspot.com");
    }

    #[test]
    fn localhost_is_preserved_verbatim() {
        let url = Url::parse("http://localhost:8080/").unwrap();
        let domain = extract_domain(&url, &allow(&[])).unwrap();
        assert_eq!(domain.as_str(), "localhost");
    }

    #[test]
    fn ip_literal_is_preserved_verbatim() {
        let url = Url::parse("http://127.0.0.1/").unwrap();
        let domain = extract_domain(&url, &allow(&[])).unwrap();
        assert_eq!(domain.as_str(), "127.0.0.1");
    }
}
