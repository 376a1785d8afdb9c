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

use url::Url;

use super::robots_txt::RobotsTxtManager;
use super::reqwest_client;
use crate::config::CrawlerConfig;
use crate::error::Error;
use crate::Result;

/// Wraps the outbound HTTP client with robots.txt obedience — every
/// request is checked against the target site's robots.txt before it is
/// issued.
pub struct RobotClient {
    robots_txt_manager: RobotsTxtManager,
    client: reqwest::Client,
}

impl RobotClient {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest_client(config)?,
            robots_txt_manager: RobotsTxtManager::new(config)?,
        })
    }

    pub fn robots_txt_manager(&self) -> &RobotsTxtManager {
        &self.robots_txt_manager
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn get(&self, url: Url) -> Result<reqwest::RequestBuilder> {
        if !self.robots_txt_manager.is_allowed(&url).await {
            return Err(Error::RobotsDisallowed.into());
        }

        Ok(self.client.get(url))
    }
}
