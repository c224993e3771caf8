//! Best-effort anonymized telemetry upload.
//!
//! A redacted copy of the imported listing batch is posted after a run.
//! Transport failures are swallowed; this never affects the run outcome.

use crate::models::record::{Fields, RecordDraft};

/// Fields stripped before upload: identifiers, asset references, and
/// free-text content.
const STRIP_KEYS: &[&str] = &[
    "alias",
    "provider",
    "contactPerson",
    "anbieternr",
    "qrImageSRC",
    "logoImageSRC",
    "epassSkalaImageSRC",
    "panoramaImageSRC",
    "mapViewImageSRC",
    "exteriorViewImageSRC",
    "interiorViewImageSRC",
    "planImageSRC",
    "imageSRC",
    "titleImageSRC",
    "objekttitel",
    "objektbeschreibung",
    "ausstattBeschr",
    "lage",
    "sonstigeAngaben",
    "objektText",
    "dreizeiler",
];

/// Fire-and-forget telemetry sink.
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    endpoint: String,
    version: String,
    client: reqwest::Client,
}

impl TelemetryClient {
    pub fn new(endpoint: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            version: version.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Post the redacted batch; any transport error is logged and dropped.
    pub async fn publish(&self, records: &[RecordDraft]) {
        let redacted: Vec<Fields> = records.iter().map(redact).collect();
        let body = serde_json::json!({
            "version": self.version,
            "records": redacted,
        });

        match self.client.post(&self.endpoint).json(&body).send().await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "telemetry uploaded");
            }
            Err(error) => {
                tracing::debug!(%error, "telemetry upload failed");
            }
        }
    }
}

/// Copy a record without identifying or free-text fields.
fn redact(record: &RecordDraft) -> Fields {
    record
        .iter()
        .filter(|(key, _)| !STRIP_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_strips_identifying_fields() {
        let mut record = RecordDraft::new();
        record.set("anbieternr", "AB123");
        record.set("objekttitel", "Altbau mit Garten");
        record.set("imageSRC", "3f2a...");
        record.set("plz", "50667");
        record.set("zimmer", "3");

        let redacted = redact(&record);
        assert!(!redacted.contains_key("anbieternr"));
        assert!(!redacted.contains_key("objekttitel"));
        assert!(!redacted.contains_key("imageSRC"));
        assert_eq!(redacted.get("plz").map(String::as_str), Some("50667"));
        assert_eq!(redacted.len(), 2);
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        // Nothing listens on this port; the upload must not panic or error.
        let client = TelemetryClient::new("http://127.0.0.1:9/em/data", "0.1.0");
        let mut record = RecordDraft::new();
        record.set("plz", "50667");
        client.publish(&[record]).await;
    }
}
