pub mod base;
pub mod conference_api;
pub mod legacy_api;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AppConfig;
use crate::http::{ApiClient, HttpError};
use crate::models::EventRecord;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("{origin} answered with status {status}")]
    Status { origin: String, status: u16 },
    #[error("{origin} reported failure: {message}")]
    Unsuccessful { origin: String, message: String },
    #[error("{origin} payload is missing {field}")]
    Missing { origin: String, field: &'static str },
}

/// One upstream API able to describe an event by slug.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn source_id(&self) -> &'static str;
    async fn fetch(&self, slug: &str) -> Result<EventRecord, SourceError>;
}

/// Tries each source in order and keeps the first usable record.
pub struct EventResolver {
    sources: Vec<Box<dyn EventSource>>,
}

impl EventResolver {
    pub fn new(sources: Vec<Box<dyn EventSource>>) -> Self {
        Self { sources }
    }

    /// The conference API first, then the legacy event-management API.
    pub fn standard(client: &ApiClient, config: &AppConfig) -> Self {
        let upload_base = config.upload_base();
        Self::new(vec![
            Box::new(conference_api::ConferenceApi::new(
                client.clone(),
                upload_base.clone(),
            )),
            Box::new(legacy_api::LegacyEventApi::new(client.clone(), upload_base)),
        ])
    }

    pub fn source_ids(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.source_id()).collect()
    }

    pub async fn resolve(&self, slug: &str) -> Option<EventRecord> {
        for source in &self.sources {
            match source.fetch(slug).await {
                Ok(event) => {
                    log::info!(
                        "resolved event {slug} (id {}) via {}",
                        event.id,
                        source.source_id()
                    );
                    return Some(event);
                }
                Err(err) => {
                    log::debug!("{} could not resolve {slug}: {err}", source.source_id());
                }
            }
        }
        log::warn!("event {slug} not found in any source");
        None
    }
}
