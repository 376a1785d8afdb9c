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

//! The Content Chunker & Embedder: splits a parent page's content
//! into overlapping character chunks and attaches an embedding vector to
//! each, reusing the prior crawl's chunks verbatim when nothing changed.

pub mod embedder;

pub use embedder::{Embedder, HttpEmbedder};

use crate::config::ChunkerConfig;
use crate::document::{ContentChunk, IndexedDocument};
use crate::site_config::PriorContent;

const SENTENCE_BREAKS: &[char] = &['.', '!', '?'];

/// Splits atoms off `text` at the coarsest separator present: paragraph
/// breaks first, then sentence breaks, then whitespace. Each atom is then
/// merged into chunks by [`split`].
fn atomize(text: &str) -> Vec<&str> {
    if text.contains("\n\n") {
        return text.split("\n\n").collect();
    }

    if text.contains(SENTENCE_BREAKS) {
        let mut atoms = Vec::new();
        let mut start = 0;
        for (i, c) in text.char_indices() {
            if SENTENCE_BREAKS.contains(&c) {
                let end = i + c.len_utf8();
                atoms.push(&text[start..end]);
                start = end;
            }
        }
        if start < text.len() {
            atoms.push(&text[start..]);
        }
        return atoms;
    }

    text.split_whitespace().collect()
}

fn overlap_tail(s: &str, overlap: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= overlap {
        s.to_string()
    } else {
        chars[chars.len() - overlap..].iter().collect()
    }
}

/// Cuts `s` into `chunk_size`-character pieces with no regard for word
/// boundaries — the last-resort separator for an atom too long to merge.
fn hard_cut(s: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    chars.chunks(chunk_size.max(1)).map(|c| c.iter().collect()).collect()
}

/// Recursive character splitter: paragraph breaks, then sentence breaks,
/// then whitespace, then a hard cut, with `overlap` characters of the
/// previous chunk's tail carried into the next.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.chars().count() <= chunk_size {
        return vec![trimmed.to_string()];
    }

    let atoms = atomize(trimmed);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for atom in atoms {
        let atom = atom.trim();
        if atom.is_empty() {
            continue;
        }

        if atom.chars().count() > chunk_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(hard_cut(atom, chunk_size));
            continue;
        }

        if !current.is_empty() && current.chars().count() + 1 + atom.chars().count() > chunk_size {
            chunks.push(current.clone());
            current = overlap_tail(&current, overlap);
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(atom);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Decides whether a page's chunks should be reused verbatim or
/// regenerated, then embeds as needed. Returns the chunks to attach to
/// `document`; an embed failure drops that one chunk, not the whole set.
pub async fn chunk_and_embed(
    document: &IndexedDocument,
    prior: Option<&PriorContent>,
    full_index: bool,
    content_chunks_limit: usize,
    config: &ChunkerConfig,
    embedder: &dyn Embedder,
) -> Vec<ContentChunk> {
    let Some(content) = document.content.as_deref() else {
        return Vec::new();
    };
    if content.trim().is_empty() {
        return Vec::new();
    }

    let content_unchanged = prior.and_then(|p| p.content.as_deref()) == Some(content);

    if full_index && content_unchanged {
        if let Some(prior) = prior {
            if !prior.content_chunks.is_empty() {
                return prior
                    .content_chunks
                    .iter()
                    .take(content_chunks_limit)
                    .cloned()
                    .collect();
            }
        }
    }

    let pieces = split(content, config.chunk_size_chars, config.chunk_overlap_chars);
    let mut chunks = Vec::with_capacity(pieces.len().min(content_chunks_limit));

    for (i, text) in pieces.into_iter().take(content_chunks_limit).enumerate() {
        let chunk_no = (i + 1) as u32;
        match embedder.embed(&text).await {
            Ok(vector) => chunks.push(ContentChunk {
                id: ContentChunk::chunk_id(&document.id, chunk_no),
                url: document.url.clone(),
                domain: document.domain.clone(),
                content_chunk_no: chunk_no,
                content_chunk_text: text,
                content_chunk_vector: vector,
            }),
            Err(e) => {
                tracing::warn!(url = %document.url, chunk_no, error = %e, "dropping chunk: embedding failed");
            }
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split("a short paragraph.", 500, 50);
        assert_eq!(chunks, vec!["a short paragraph.".to_string()]);
    }

    #[test]
    fn splits_on_paragraph_breaks_before_overflowing() {
        let para_a = "a".repeat(300);
        let para_b = "b".repeat(300);
        let text = format!("{para_a}\n\n{para_b}");

        let chunks = split(&text, 400, 20);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with('a'));
        assert!(chunks[1].contains('b'));
    }

    #[test]
    fn chunks_overlap_by_requested_amount() {
        let text = "word ".repeat(200);
        let chunks = split(text.trim(), 50, 10);
        assert!(chunks.len() > 1);
        let tail_of_first: String = chunks[0].chars().rev().take(10).collect::<Vec<_>>().into_iter().rev().collect();
        assert!(chunks[1].starts_with(&tail_of_first) || chunks[1].contains(tail_of_first.trim()));
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        assert!(split("   ", 500, 50).is_empty());
    }

    struct StubEmbedder;

    #[async_trait::async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
            Ok(vec![text.len() as f32])
        }
    }

    struct FailingEmbedder;

    #[async_trait::async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> crate::Result<Vec<f32>> {
            anyhow::bail!("embedding service unavailable")
        }
    }

    fn sample_document(content: Option<&str>) -> IndexedDocument {
        use crate::document::Relationship;
        use crate::domain::Domain;

        IndexedDocument {
            id: "https://example.com/".into(),
            url: "https://example.com/".into(),
            domain: Domain::from_registry_value("example.com"),
            relationship: Relationship::Parent,
            is_home: true,
            title: None,
            author: None,
            description: None,
            tags: vec![],
            content: content.map(str::to_string),
            content_type: None,
            page_type: None,
            page_last_modified: None,
            content_last_modified: None,
            published_date: None,
            indexed_date: chrono::Utc::now(),
            date_domain_added: None,
            site_category: "general".into(),
            owner_verified: false,
            contains_adverts: false,
            api_enabled: None,
            public: true,
            in_web_feed: false,
            web_feed: None,
            language: None,
            language_primary: None,
            indexed_inlinks: vec![],
            indexed_inlinks_count: None,
            indexed_inlink_domains: vec![],
            indexed_inlink_domains_count: None,
            indexed_outlinks: vec![],
            content_chunks: vec![],
        }
    }

    #[tokio::test]
    async fn no_content_drops_all_chunks() {
        let document = sample_document(None);
        let config = ChunkerConfig::default();
        let chunks = chunk_and_embed(&document, None, true, 10, &config, &StubEmbedder).await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn unchanged_content_on_full_reindex_reuses_prior_chunks() {
        let document = sample_document(Some("the same content"));
        let prior = PriorContent {
            content: Some("the same content".to_string()),
            content_last_modified: None,
            content_chunks: vec![ContentChunk {
                id: "https://example.com/!chunk001".into(),
                url: "https://example.com/".into(),
                domain: document.domain.clone(),
                content_chunk_no: 1,
                content_chunk_text: "the same content".into(),
                content_chunk_vector: vec![1.0, 2.0],
            }],
        };
        let config = ChunkerConfig::default();

        let chunks = chunk_and_embed(&document, Some(&prior), true, 10, &config, &FailingEmbedder).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content_chunk_vector, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn changed_content_regenerates_chunks() {
        let document = sample_document(Some("brand new content"));
        let prior = PriorContent {
            content: Some("the old content".to_string()),
            content_last_modified: None,
            content_chunks: vec![ContentChunk {
                id: "https://example.com/!chunk001".into(),
                url: "https://example.com/".into(),
                domain: document.domain.clone(),
                content_chunk_no: 1,
                content_chunk_text: "the old content".into(),
                content_chunk_vector: vec![9.0],
            }],
        };
        let config = ChunkerConfig::default();

        let chunks = chunk_and_embed(&document, Some(&prior), true, 10, &config, &StubEmbedder).await;
        assert_eq!(chunks.len(), 1);
        assert_ne!(chunks[0].content_chunk_vector, vec![9.0]);
    }

    #[tokio::test]
    async fn embed_failure_drops_only_that_chunk() {
        struct FlakyEmbedder;

        #[async_trait::async_trait]
        impl Embedder for FlakyEmbedder {
            async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
                if text.starts_with('b') {
                    anyhow::bail!("transient failure")
                } else {
                    Ok(vec![1.0])
                }
            }
        }

        let content = "a".repeat(10) + "\n\n" + &"b".repeat(10);
        let document = sample_document(Some(&content));
        let config = ChunkerConfig {
            chunk_size_chars: 10,
            chunk_overlap_chars: 2,
        };

        let chunks = chunk_and_embed(&document, None, false, 10, &config, &FlakyEmbedder).await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content_chunk_text.starts_with('a'));
    }
}
