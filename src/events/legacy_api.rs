use async_trait::async_trait;
use serde_json::Value;

use super::base;
use super::{EventSource, SourceError};
use crate::http::ApiClient;
use crate::models::EventRecord;

const PATH: &str = "EventManagement/Website/events";
const SOURCE_ID: &str = "legacy_event_api";

const TITLE_FIELDS: &[&str] = &["event_name", "title", "name"];
const START_FIELDS: &[&str] = &["event_date", "date", "start_date"];
const END_FIELDS: &[&str] = &["end_date", "event_end_date"];
const LOCATION_FIELDS: &[&str] = &["location", "venue", "mode", "event_mode"];
const PRICE_FIELDS: &[&str] = &["fees", "price", "amount", "registration_fee"];
const IMAGE_FIELDS: &[&str] = &["event_image", "image", "banner"];

/// The older event-management API, consulted when the conference API has
/// nothing usable.
pub struct LegacyEventApi {
    client: ApiClient,
    upload_base: String,
}

impl LegacyEventApi {
    pub fn new(client: ApiClient, upload_base: String) -> Self {
        Self {
            client,
            upload_base,
        }
    }

    /// The record may sit at `data.event`, `data` or the root.
    fn locate_record(body: &Value) -> &Value {
        match base::object_at(body, "data") {
            Some(data) => base::object_at(data, "event").unwrap_or(data),
            None => base::object_at(body, "event").unwrap_or(body),
        }
    }

    pub(crate) fn parse_payload(
        &self,
        slug: &str,
        body: &Value,
    ) -> Result<EventRecord, SourceError> {
        let record = Self::locate_record(body);
        let id = base::numeric_id(record, &["id", "event_id"]).ok_or(SourceError::Missing {
            origin: SOURCE_ID.to_string(),
            field: "id",
        })?;

        let start = base::first_text(record, START_FIELDS);
        let end = base::first_text(record, END_FIELDS);

        Ok(EventRecord {
            id,
            slug: slug.to_string(),
            title: base::first_text(record, TITLE_FIELDS)
                .map(|value| base::clean_title(&value))
                .unwrap_or_default(),
            date: base::display_date(start.as_deref(), end.as_deref()),
            location: base::first_text(record, LOCATION_FIELDS)
                .map(|value| base::clean_text(&value))
                .unwrap_or_default(),
            price: base::normalize_price(record, PRICE_FIELDS),
            image: base::rebase_image(&self.upload_base, base::first_text(record, IMAGE_FIELDS)),
        })
    }
}

#[async_trait]
impl EventSource for LegacyEventApi {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api() -> LegacyEventApi {
        LegacyEventApi::new(
            ApiClient::new("https://api.test/api"),
            "https://api.test/api/uploads".to_string(),
        )
    }

    #[test]
    fn parses_nested_event_record() {
        let body = json!({
            "success": true,
            "data": {
                "event": {
                    "id": 5,
                    "event_name": "\"Crime Scene Workshop\"",
                    "event_date": "2024-11-02 10:00:00",
                    "location": "Pune",
                    "fees": "₹ 1,200",
                    "event_image": "https://cdn.test/workshop.png"
                }
            }
        });
        let event = api().parse_payload("crime-scene-workshop", &body).expect("parse");
        assert_eq!(event.id, 5);
        assert_eq!(event.title, "Crime Scene Workshop");
        assert_eq!(event.date, "02 November 2024");
        assert_eq!(event.price, "1200");
        assert_eq!(event.image, "https://cdn.test/workshop.png");
    }

    #[test]
    fn reads_flat_data_record() {
        let body = json!({
            "data": {"id": 6, "title": "Open Day", "fees": "0", "image": "/media/open.jpg"}
        });
        let event = api().parse_payload("open-day", &body).expect("parse");
        assert_eq!(event.price, "FREE");
        assert_eq!(event.image, "https://api.test/api/uploads/media/open.jpg");
    }

    #[test]
    fn reads_root_record() {
        let body = json!({"id": 9, "name": "Root Event"});
        let event = api().parse_payload("root-event", &body).expect("parse");
        assert_eq!(event.id, 9);
        assert_eq!(event.title, "Root Event");
    }
}
