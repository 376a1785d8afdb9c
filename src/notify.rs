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

//! The Notification Service collaborator: tier-3 listing-expiry and
//! repeated-failure alerts, sent over SMTP via `lettre`.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::Error;
use crate::Result;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_admin(&self, subject: &str, body: &str) -> Result<()>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    admin: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| Error::Config(e.to_string()))?
            .port(config.port)
            .credentials(credentials)
            .build();

        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e: lettre::address::AddressError| Error::Config(e.to_string()))?;
        let admin: Mailbox = config
            .admin_address
            .parse()
            .map_err(|e: lettre::address::AddressError| Error::Config(e.to_string()))?;

        Ok(Self { transport, from, admin })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify_admin(&self, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.admin.clone())
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| Error::Config(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(())
    }
}

/// A notifier that drops every message; used where SMTP isn't configured
/// (tests, local `run-once` invocations without an SMTP section).
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_admin(&self, subject: &str, _body: &str) -> Result<()> {
        tracing::debug!(subject, "null notifier: dropping admin notification");
        Ok(())
    }
}
