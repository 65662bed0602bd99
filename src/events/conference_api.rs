use async_trait::async_trait;
use serde_json::Value;

use super::base;
use super::{EventSource, SourceError};
use crate::http::ApiClient;
use crate::models::EventRecord;

const PATH: &str = "EducationAndInternship/Website/event/event-details";
const SOURCE_ID: &str = "conference_api";

const TITLE_FIELDS: &[&str] = &["title", "name", "event_title"];
const START_FIELDS: &[&str] = &["start_date", "event_date", "date"];
const END_FIELDS: &[&str] = &["end_date"];
const VENUE_FIELDS: &[&str] = &["venue", "location", "city"];
const MODE_FIELDS: &[&str] = &["mode", "event_mode"];
const PRICE_FIELDS: &[&str] = &["price", "event_price", "fees", "registration_fee", "amount"];
const IMAGE_FIELDS: &[&str] = &["image", "banner_image", "event_image", "thumbnail"];

/// The current conference/event API.
pub struct ConferenceApi {
    client: ApiClient,
    upload_base: String,
}

impl ConferenceApi {
    pub fn new(client: ApiClient, upload_base: String) -> Self {
        Self {
            client,
            upload_base,
        }
    }

    pub(crate) fn parse_payload(
        &self,
        slug: &str,
        body: &Value,
    ) -> Result<EventRecord, SourceError> {
        let record = base::object_at(body, "data").ok_or(SourceError::Missing {
            origin: SOURCE_ID.to_string(),
            field: "data",
        })?;
        let id = base::numeric_id(record, &["id", "event_id"]).ok_or(SourceError::Missing {
            origin: SOURCE_ID.to_string(),
            field: "id",
        })?;

        let start = base::first_text(record, START_FIELDS);
        let end = base::first_text(record, END_FIELDS);
        let location = base::first_text(record, VENUE_FIELDS)
            .or_else(|| base::first_text(record, MODE_FIELDS))
            .map(|value| base::clean_text(&value))
            .unwrap_or_default();

        Ok(EventRecord {
            id,
            slug: slug.to_string(),
            title: base::first_text(record, TITLE_FIELDS)
                .map(|value| base::clean_title(&value))
                .unwrap_or_default(),
            date: base::display_date(start.as_deref(), end.as_deref()),
            location,
            price: base::normalize_price(record, PRICE_FIELDS),
            image: base::rebase_image(&self.upload_base, base::first_text(record, IMAGE_FIELDS)),
        })
    }
}

#[async_trait]
impl EventSource for ConferenceApi {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    async fn fetch(&self, slug: &str) -> Result<EventRecord, SourceError> {
        let url = self.client.endpoint_with(PATH, &[slug]);
        let response = self.client.get_json(&url).await?;
        base::ensure_usable(SOURCE_ID, &response)?;
        self.parse_payload(slug, &response.body)
    }
}
