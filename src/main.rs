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

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing_subscriber::util::SubscriberInitExt;

use smallweb_indexer::chunker::HttpEmbedder;
use smallweb_indexer::config::AppConfig;
use smallweb_indexer::index::SolrIndex;
use smallweb_indexer::notify::{NullNotifier, SmtpNotifier};
use smallweb_indexer::registry::PgRegistry;
use smallweb_indexer::scheduler::Scheduler;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scheduling pass (maintenance + one round of crawls) and exit.
    RunOnce { config_path: String },

    /// Run scheduling passes on a fixed interval until the process is killed.
    Serve { config_path: String },
}

fn load_toml_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let raw_config = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: '{}'", path.display()))?;
    toml::from_str(&raw_config).with_context(|| format!("failed to parse config: '{}'", path.display()))
}

async fn build_scheduler(config: &AppConfig) -> Result<Scheduler> {
    let registry = Arc::new(PgRegistry::connect(&config.registry).await?);
    let index = Arc::new(SolrIndex::new(&config.index)?);
    let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
    let notifier: Arc<dyn smallweb_indexer::notify::Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp)?),
        None => Arc::new(NullNotifier),
    };

    Ok(Scheduler::new(
        registry,
        index,
        embedder,
        notifier,
        config.crawler.clone(),
        config.chunker.clone(),
        config.scheduler.clone(),
    ))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive("smallweb_indexer=info".parse().unwrap())
                .from_env_lossy(),
        )
        .without_time()
        .with_target(false)
        .finish()
        .init();

    let args = Args::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            match args.command {
                Commands::RunOnce { config_path } => {
                    let config: AppConfig = load_toml_config(config_path)?;
                    let scheduler = build_scheduler(&config).await?;
                    scheduler.run_once().await?;
                }
                Commands::Serve { config_path } => {
                    let config: AppConfig = load_toml_config(config_path)?;
                    let scheduler = build_scheduler(&config).await?;
                    let interval = std::time::Duration::from_secs(config.scheduler.pass_interval_secs);

                    loop {
                        if let Err(e) = scheduler.run_once().await {
                            tracing::error!(error = %e, "scheduling pass failed");
                        }
                        tokio::time::sleep(interval).await;
                    }
                }
            }

            Ok(())
        })
}
