use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use crate::{config::SinkConfig, modules::record_parser::TeamRecord};

// Result of a single submission attempt.
// Accepted only means the request left without a local transport error.
// The sink's reply is never read, so nothing is known about whether the
// record was actually stored on the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Failed(String),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

// Write-only destination for team records. One attempt per call, no retries
pub trait SubmissionSink: Send + Sync {
    fn submit<'a>(&'a self, record: &'a TeamRecord) -> BoxFuture<'a, SubmitOutcome>;
}

// POSTs records as JSON to a fixed endpoint
#[derive(Clone)]
pub struct HttpSinkClient {
    client: reqwest::Client,
    endpoint_url: String,
}

impl HttpSinkClient {
    pub fn new(config: &SinkConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            endpoint_url: config.endpoint_url.clone(),
        })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    async fn post(&self, record: &TeamRecord) -> SubmitOutcome {
        log::info!("Submitting record for team {:?} to {}", record.team_name, self.endpoint_url);

        // Serialize the record to a JSON string
        let body = match serde_json::to_string(record) {
            Ok(body) => body,
            Err(e) => {
                log::error!("Error serializing record: {}", e);
                return SubmitOutcome::Failed(e.to_string());
            }
        };

        let result = self.client
            .post(&self.endpoint_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match result {
            // Status and body are ignored on purpose, only the transport counts
            Ok(response) => {
                log::debug!("Sink answered with status {}", response.status());
                SubmitOutcome::Accepted
            }
            Err(e) => {
                log::error!("Error sending record to sink: {}", e);
                SubmitOutcome::Failed(e.to_string())
            }
        }
    }
}

impl SubmissionSink for HttpSinkClient {
    fn submit<'a>(&'a self, record: &'a TeamRecord) -> BoxFuture<'a, SubmitOutcome> {
        Box::pin(self.post(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::record_parser::parse_payload;
    use chrono::Utc;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(url: String) -> HttpSinkClient {
        HttpSinkClient::new(&SinkConfig {
            endpoint_url: url,
            request_timeout_secs: Some(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn posts_record_as_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/exec")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "TeamName": "Alpha",
                "BotName": "Striker",
                "University": "Tech U",
                "TeamLeader": "",
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(format!("{}/exec", server.url()));
        let record = parse_payload("Team Name: Alpha\nBot Name: Striker\nUniversity: Tech U", Utc::now());

        assert_eq!(client.submit(&record).await, SubmitOutcome::Accepted);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_still_counts_as_dispatched() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/exec")
            .with_status(500)
            .with_body("sheet is full")
            .create_async()
            .await;

        let client = client_for(format!("{}/exec", server.url()));
        let record = parse_payload("Team Name: Alpha", Utc::now());

        // Dispatched is all we can claim; the remote side may have dropped it
        assert!(client.submit(&record).await.is_accepted());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn transport_error_is_failed() {
        // Nothing listens on port 1
        let client = client_for("http://127.0.0.1:1/exec".to_string());
        let record = parse_payload("Team Name: Alpha", Utc::now());

        assert!(matches!(client.submit(&record).await, SubmitOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn invalid_url_is_failed() {
        let client = client_for("not a url".to_string());
        let record = parse_payload("", Utc::now());

        assert!(!client.submit(&record).await.is_accepted());
        assert_eq!(client.endpoint_url(), "not a url");
    }
}
