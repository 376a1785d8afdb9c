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

//! The embedding service collaborator: a narrow trait the chunker
//! depends on, backed by an HTTP implementation — the same seam-at-the-
//! boundary shape as `crate::registry::Registry`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::error::Error;
use crate::Result;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Calls a local/remote encoder endpoint accepting `{"input": "..."}` and
/// returning `{"embedding": [...]}.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    vector_dim: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Fetch)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            vector_dim: config.vector_dim,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { input: text })
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Embedding(format!("embedding service returned {}", response.status())).into());
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        if body.embedding.len() != self.vector_dim {
            return Err(Error::Embedding(format!(
                "expected a {}-dim vector, got {}",
                self.vector_dim,
                body.embedding.len()
            ))
            .into());
        }

        Ok(body.embedding)
    }
}
